//! # Corpus Structures
//!
//! Nested token structures handed to the core by corpus readers, and their
//! flattening to the single token stream the sequence models run over.
//!
//! The flat stream starts with `__eos__`. Each segment is followed by
//! `__stop__`, except that the last one of a sentence is followed by
//! `__eos__` instead. An empty sentence contributes a lone `__eos__`.

use crate::error::{Result, UpchunkError};
use crate::vocab::{Term, Vocabulary};

/// A non-empty run of tokens grouped as one unit.
pub type Chunk = Vec<Term>;
/// Chunks between two stopping punctuation marks.
pub type Segment = Vec<Chunk>;
/// Segments of one sentence.
pub type Sentence = Vec<Segment>;

/// Sentences split into segments and chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkedCorpus {
    sentences: Vec<Sentence>,
}

impl ChunkedCorpus {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn num_sentences(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Check the structure can survive an encode/decode round trip: no
    /// empty chunks, no empty segments and no sentinel ids among the tokens.
    pub fn validate(&self) -> Result<()> {
        for (s, sentence) in self.sentences.iter().enumerate() {
            for segment in sentence {
                if segment.is_empty() {
                    return Err(UpchunkError::InvalidConfig(format!(
                        "sentence {s} contains an empty segment"
                    )));
                }
                for chunk in segment {
                    if chunk.is_empty() {
                        return Err(UpchunkError::InvalidConfig(format!(
                            "sentence {s} contains an empty chunk"
                        )));
                    }
                    if chunk.iter().any(|&w| Vocabulary::is_boundary(w)) {
                        return Err(UpchunkError::InvalidConfig(format!(
                            "sentence {s} contains a sentinel token"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Tokens of sentence `i`, without structure.
    pub fn sentence_tokens(&self, i: usize) -> Vec<Term> {
        self.sentences[i]
            .iter()
            .flat_map(|segment| segment.iter().flatten().copied())
            .collect()
    }

    /// Half-open token spans of the multi-token chunks of sentence `i`.
    pub fn chunk_spans(&self, i: usize) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for chunk in self.sentences[i].iter().flatten() {
            if chunk.len() > 1 {
                spans.push((offset, offset + chunk.len()));
            }
            offset += chunk.len();
        }
        spans
    }

    /// Flatten to the sentinel-delimited token stream.
    pub fn flatten(&self) -> Vec<Term> {
        flatten_sentences(self.sentences.iter().map(|sentence| {
            sentence
                .iter()
                .map(|segment| segment.iter().flatten().copied().collect::<Vec<_>>())
                .collect::<Vec<_>>()
        }))
    }

    /// Keep only sentences of at most `max_len` tokens.
    pub fn filter_len(&self, max_len: usize) -> Self {
        let sentences = self
            .sentences
            .iter()
            .enumerate()
            .filter(|(i, _)| self.sentence_tokens(*i).len() <= max_len)
            .map(|(_, sentence)| sentence.clone())
            .collect();
        Self { sentences }
    }

    /// Fail unless `other` has the same sentence count and the same number
    /// of segments in every sentence.
    pub fn check_aligned(&self, other: &ChunkedCorpus) -> Result<()> {
        if self.num_sentences() != other.num_sentences() {
            return Err(UpchunkError::shape(
                "sentence count",
                self.num_sentences(),
                other.num_sentences(),
            ));
        }
        for (i, (a, b)) in self.sentences.iter().zip(&other.sentences).enumerate() {
            if a.len() != b.len() {
                return Err(UpchunkError::shape(
                    format!("segment count of sentence {i}"),
                    a.len(),
                    b.len(),
                ));
            }
        }
        Ok(())
    }

    /// Render every sentence as one line with multi-token chunks in
    /// parentheses, e.g. `(the quick brown fox) jumped over (the lazy dog)`.
    pub fn render(&self, vocab: &Vocabulary) -> Vec<String> {
        self.sentences
            .iter()
            .map(|sentence| render_sentence(sentence, vocab))
            .collect()
    }
}

fn render_sentence(sentence: &Sentence, vocab: &Vocabulary) -> String {
    let word = |w: &Term| vocab.string(*w).unwrap_or("<unk>");
    sentence
        .iter()
        .flatten()
        .map(|chunk| {
            if chunk.len() == 1 {
                word(&chunk[0]).to_string()
            } else {
                let inner: Vec<&str> = chunk.iter().map(word).collect();
                format!("({})", inner.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sentences split at stopping punctuation, with no chunk structure yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StopSegmentCorpus {
    sentences: Vec<Vec<Vec<Term>>>,
}

impl StopSegmentCorpus {
    pub fn new(sentences: Vec<Vec<Vec<Term>>>) -> Self {
        Self { sentences }
    }

    pub fn sentences(&self) -> &[Vec<Vec<Term>>] {
        &self.sentences
    }

    pub fn num_sentences(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Total number of (non-sentinel) tokens.
    pub fn num_tokens(&self) -> usize {
        self.sentences.iter().flatten().map(Vec::len).sum()
    }

    /// Flatten to the sentinel-delimited token stream.
    pub fn flatten(&self) -> Vec<Term> {
        flatten_sentences(self.sentences.iter().cloned())
    }

    /// Keep only sentences of at most `max_len` tokens.
    pub fn filter_len(&self, max_len: usize) -> Self {
        let sentences = self
            .sentences
            .iter()
            .filter(|sentence| sentence.iter().map(Vec::len).sum::<usize>() <= max_len)
            .cloned()
            .collect();
        Self { sentences }
    }

    /// Every token becomes its own chunk.
    pub fn to_unchunked(&self) -> ChunkedCorpus {
        let sentences = self
            .sentences
            .iter()
            .map(|sentence| {
                sentence
                    .iter()
                    .map(|segment| segment.iter().map(|&w| vec![w]).collect())
                    .collect()
            })
            .collect();
        ChunkedCorpus::new(sentences)
    }
}

fn flatten_sentences<I>(sentences: I) -> Vec<Term>
where
    I: IntoIterator<Item = Vec<Vec<Term>>>,
{
    let mut tokens = vec![Vocabulary::EOS];
    for sentence in sentences {
        if sentence.is_empty() {
            tokens.push(Vocabulary::EOS);
            continue;
        }
        for segment in sentence {
            tokens.extend(segment);
            tokens.push(Vocabulary::STOP);
        }
        if let Some(last) = tokens.last_mut() {
            *last = Vocabulary::EOS;
        }
    }
    tokens
}
