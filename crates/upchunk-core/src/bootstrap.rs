//! # Bigram Chunker
//!
//! Count-based first pass used to seed EM. Two adjacent tokens are joined
//! when the bigram evidence for them, summed over a small pyramid of
//! overlapping spans, outweighs the evidence that each sits next to a
//! segment boundary.

use std::collections::HashMap;

use tracing::debug;

use crate::corpus::{ChunkedCorpus, Segment, StopSegmentCorpus};
use crate::vocab::{Term, Vocabulary};

/// Bigram counts over stop-padded segments.
#[derive(Debug, Clone)]
pub struct BigramChunker {
    counts: HashMap<(Term, Term), f64>,
    factor: Vec<f64>,
}

impl BigramChunker {
    /// Count bigrams in `corpus`, padding each segment with `__stop__` on
    /// both sides.
    pub fn train(corpus: &StopSegmentCorpus, factor: Vec<f64>) -> Self {
        let mut counts = HashMap::new();
        let stop = Vocabulary::STOP;
        for segment in corpus.sentences().iter().flatten() {
            let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
                continue;
            };
            *counts.entry((stop, first)).or_insert(0.0) += 1.0;
            *counts.entry((last, stop)).or_insert(0.0) += 1.0;
            for pair in segment.windows(2) {
                *counts.entry((pair[0], pair[1])).or_insert(0.0) += 1.0;
            }
        }
        debug!(bigrams = counts.len(), "bigram chunker trained");
        Self { counts, factor }
    }

    pub fn count(&self, a: Term, b: Term) -> f64 {
        self.counts.get(&(a, b)).copied().unwrap_or(0.0)
    }

    pub fn factor(&self) -> &[f64] {
        &self.factor
    }

    /// Chunk every segment of `corpus`. Empty segments are dropped.
    pub fn chunk(&self, corpus: &StopSegmentCorpus) -> ChunkedCorpus {
        let sentences = corpus
            .sentences()
            .iter()
            .map(|sentence| {
                sentence
                    .iter()
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| self.chunk_segment(segment))
                    .collect()
            })
            .collect();
        ChunkedCorpus::new(sentences)
    }

    fn chunk_segment(&self, terms: &[Term]) -> Segment {
        let joins = self.joins(terms);
        let mut chunks = Vec::new();
        let mut start = 0;
        for (k, &join) in joins.iter().enumerate() {
            if !join {
                chunks.push(terms[start..=k].to_vec());
                start = k + 1;
            }
        }
        chunks.push(terms[start..].to_vec());
        chunks
    }

    /// Whether each adjacent pair `terms[k] terms[k + 1]` is joined.
    fn joins(&self, terms: &[Term]) -> Vec<bool> {
        let n = terms.len();
        if n < 2 {
            return Vec::new();
        }
        let height = self.factor.len().min(n - 1);
        if height == 0 {
            return vec![false; n - 1];
        }

        // pyr[i][j] scores the span terms[j..=j + i + 1]
        let mut pyr: Vec<Vec<f64>> = (0..height).map(|i| vec![0.0; n - i - 1]).collect();
        for i in (0..height).rev() {
            for j in 0..n - i - 1 {
                let parents = if i + 1 == height {
                    0.0
                } else {
                    let above = &pyr[i + 1];
                    let left = j.checked_sub(1).map_or(0.0, |l| above[l]);
                    let right = above.get(j).copied().unwrap_or(0.0);
                    left + right
                };
                pyr[i][j] = self.factor[i] * self.count(terms[j], terms[j + i + 1]) + parents;
            }
        }

        let stop = Vocabulary::STOP;
        (0..n - 1)
            .map(|k| {
                let against = self.count(stop, terms[k + 1]) + self.count(terms[k], stop);
                pyr[0][k] >= against
            })
            .collect()
    }
}
