//! # Expectation-Maximization
//!
//! One EM iteration is a log-space forward-backward pass over the flat
//! token stream, collecting expected `(tag, term, next tag)` counts, then
//! a call to the model's `update`.
//!
//! `forward[t][k]` scores every path that reaches tag `k` at position `t`,
//! with the emissions of positions `0..t` folded in. The last position has
//! no outgoing arc, so its emission enters through `term_prob`. Both passes
//! visit only the tags in each token's tag dictionary.

use std::time::Instant;

use tracing::debug;

use crate::error::{Result, UpchunkError};
use crate::logspace::{log_add, log_sum_exp};
use crate::model::{CountTensor, ProbabilityModel};
use crate::vocab::{self, Term};

/// Outcome of one EM iteration.
#[derive(Debug, Clone)]
pub struct EmStep<M> {
    /// The re-estimated model.
    pub model: M,
    /// Perplexity of the stream under the model the iteration started from.
    pub perplexity: f64,
    /// Total log-probability of the stream under that same model.
    pub log_prob: f64,
}

/// `exp(-log_prob / len)`.
pub fn perplexity(log_prob: f64, len: usize) -> f64 {
    (-log_prob / len as f64).exp()
}

/// Run forward-backward and return the expected counts together with the
/// total log-probability of `tokens`.
pub fn expected_counts<M: ProbabilityModel>(model: &M, tokens: &[Term]) -> Result<(CountTensor, f64)> {
    if tokens.is_empty() {
        return Err(UpchunkError::InvalidConfig(
            "cannot run forward-backward on an empty stream".into(),
        ));
    }
    vocab::check_terms(tokens, model.num_terms())?;

    let n = model.num_tags();
    let len = tokens.len();
    let last = len - 1;
    let dict = model.tag_dict();

    let mut forward = vec![vec![f64::NEG_INFINITY; n]; len];
    for &k in dict.tags(tokens[0]) {
        forward[0][k] = model.init_tag_prob(k);
    }
    for t in 1..len {
        let prev_w = tokens[t - 1];
        for &k in dict.tags(tokens[t]) {
            let score = log_sum_exp(
                dict.tags(prev_w)
                    .iter()
                    .map(|&j| forward[t - 1][j] + model.arcprob(j, prev_w, k)),
            );
            forward[t][k] = score;
        }
    }

    let final_w = tokens[last];
    let total = log_sum_exp(
        dict.tags(final_w)
            .iter()
            .map(|&k| forward[last][k] + model.term_prob(k, final_w)),
    );
    if !total.is_finite() {
        return Err(UpchunkError::NumericDegeneracy(format!(
            "stream log-probability is {total}"
        )));
    }

    let mut backward = vec![vec![f64::NEG_INFINITY; n]; len];
    for &k in dict.tags(final_w) {
        backward[last][k] = model.term_prob(k, final_w);
    }

    let mut counts = CountTensor::zeros(n, model.num_terms());
    for t in (1..len).rev() {
        let prev_w = tokens[t - 1];
        for &k in dict.tags(tokens[t]) {
            let beta = backward[t][k];
            if beta == f64::NEG_INFINITY {
                continue;
            }
            for &j in dict.tags(prev_w) {
                let arc = model.arcprob(j, prev_w, k);
                if arc == f64::NEG_INFINITY {
                    continue;
                }
                backward[t - 1][j] = log_add(backward[t - 1][j], arc + beta);
                let alpha = forward[t - 1][j];
                if alpha > f64::NEG_INFINITY {
                    counts.add(j, prev_w, k, (alpha + arc + beta - total).exp());
                }
            }
        }
    }

    Ok((counts, total))
}

/// One full EM iteration: expected counts, then a fresh model.
pub fn em_iteration<M: ProbabilityModel>(model: &M, tokens: &[Term]) -> Result<EmStep<M>> {
    let started = Instant::now();
    let (counts, log_prob) = expected_counts(model, tokens)?;
    let next = model.update(&counts)?;
    let perplexity = perplexity(log_prob, tokens.len());
    if !(perplexity.is_finite() && perplexity >= 0.0) {
        return Err(UpchunkError::NumericDegeneracy(format!(
            "perplexity is {perplexity}"
        )));
    }
    debug!(
        perplexity,
        log_prob,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "EM iteration"
    );
    Ok(EmStep {
        model: next,
        perplexity,
        log_prob,
    })
}
