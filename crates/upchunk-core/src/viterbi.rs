//! # Viterbi Decoding
//!
//! Finds the most probable tag path for a flat token stream under a trained
//! sequence model, using the same arc scores and tag-dictionary pruning as
//! the EM trainer.

use crate::error::{Result, UpchunkError};
use crate::model::ProbabilityModel;
use crate::vocab::Term;

/// Viterbi decoder over any [`ProbabilityModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ViterbiDecoder;

/// Path score and backpointer for Viterbi decoding.
#[derive(Debug, Clone, Copy)]
struct PathState {
    score: f64,
    prev_tag: Option<usize>,
}

impl PathState {
    const UNREACHABLE: PathState = PathState {
        score: f64::NEG_INFINITY,
        prev_tag: None,
    };
}

impl ViterbiDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode the optimal tag sequence for `tokens`.
    ///
    /// Ties go to the lowest tag id, so output is reproducible.
    pub fn decode<M: ProbabilityModel>(&self, model: &M, tokens: &[Term]) -> Result<Vec<usize>> {
        let seq_len = tokens.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }
        let num_tags = model.num_tags();
        let dict = model.tag_dict();

        let mut dp = vec![vec![PathState::UNREACHABLE; num_tags]; seq_len];
        for &tag in dict.tags(tokens[0]) {
            dp[0][tag].score = model.init_tag_prob(tag);
        }

        for pos in 1..seq_len {
            let prev_w = tokens[pos - 1];
            for &curr_tag in dict.tags(tokens[pos]) {
                let mut best = PathState::UNREACHABLE;
                for &prev_tag in dict.tags(prev_w) {
                    let score = dp[pos - 1][prev_tag].score + model.arcprob(prev_tag, prev_w, curr_tag);
                    if score > best.score {
                        best = PathState {
                            score,
                            prev_tag: Some(prev_tag),
                        };
                    }
                }
                dp[pos][curr_tag] = best;
            }
        }

        let last = seq_len - 1;
        let mut best_final = None;
        let mut best_score = f64::NEG_INFINITY;
        for &tag in dict.tags(tokens[last]) {
            let score = dp[last][tag].score + model.term_prob(tag, tokens[last]);
            if score > best_score {
                best_score = score;
                best_final = Some(tag);
            }
        }
        let mut curr_tag = best_final.ok_or_else(|| {
            UpchunkError::NumericDegeneracy("no tag path has finite probability".into())
        })?;

        let mut path = Vec::with_capacity(seq_len);
        path.push(curr_tag);
        for pos in (1..seq_len).rev() {
            curr_tag = dp[pos][curr_tag].prev_tag.ok_or_else(|| {
                UpchunkError::NumericDegeneracy(format!("broken backpointer at position {pos}"))
            })?;
            path.push(curr_tag);
        }

        path.reverse();
        Ok(path)
    }
}
