//! # Right-Regular Grammar Model
//!
//! Factored variant that conditions each term on both the tag that emits it
//! and the tag that follows:
//!
//! ```text
//! arcprob(t1, w, t2) = ln(prob[t1][t2][w] · P_hmm(t2 | t1))
//! prob[t1][t2][w]    = (c(t1, w, t2) + α) / (c(t1, ·, t2) + α·V)
//! ```
//!
//! The embedded HMM backs off the initial tag, the final emission and the
//! transition factor. Both factors carry tag-to-tag information, so the
//! transition signal is counted twice; this is a known property of the
//! model and is kept as is.

use crate::encoder::TagEncoder;
use crate::error::{Result, UpchunkError};
use crate::vocab::Term;

use super::ProbabilityModel;
use super::counts::CountTensor;
use super::emission::SANITY_TOLERANCE;
use super::hmm::Hmm;
use super::tagdict::TagDict;

#[derive(Debug, Clone)]
pub struct Rrg {
    /// `[t1][t2][w]`, probability space, flattened.
    prob: Vec<f64>,
    /// `[t1][t2]` mass for unseen terms.
    oov: Vec<f64>,
    backoff: Hmm,
    num_tags: usize,
    num_terms: usize,
}

impl Rrg {
    pub fn from_counts(counts: &CountTensor, encoder: &TagEncoder, smoothing: f64) -> Result<Self> {
        let backoff = Hmm::from_counts(counts, encoder, smoothing)?;
        Self::with_backoff(backoff, counts)
    }

    /// Build the combined table from `counts` read as `tag × tag × term`.
    fn with_backoff(backoff: Hmm, counts: &CountTensor) -> Result<Self> {
        let num_tags = counts.num_tags();
        let num_terms = counts.num_terms();
        let alpha = backoff.smoothing();
        let spread = alpha * num_terms as f64;

        let mut prob = vec![0.0; num_tags * num_tags * num_terms];
        let mut oov = vec![0.0; num_tags * num_tags];
        for t1 in 0..num_tags {
            for t2 in 0..num_tags {
                let sum: f64 = (0..num_terms as Term).map(|w| counts.get(t1, w, t2)).sum();
                oov[t1 * num_tags + t2] = if sum > 0.0 {
                    alpha / sum
                } else {
                    1.0 / num_terms.max(1) as f64
                };
                let base = (t1 * num_tags + t2) * num_terms;
                for w in 0..num_terms {
                    prob[base + w] = (counts.get(t1, w as Term, t2) + alpha) / (sum + spread);
                }
            }
        }

        let rrg = Self {
            prob,
            oov,
            backoff,
            num_tags,
            num_terms,
        };
        rrg.check_sanity()?;
        Ok(rrg)
    }

    pub fn backoff(&self) -> &Hmm {
        &self.backoff
    }

    /// `prob[t1][t2][w]`, or the unseen-term mass for ids past the table.
    #[inline]
    pub fn combined_prob(&self, t1: usize, t2: usize, term: Term) -> f64 {
        let pair = t1 * self.num_tags + t2;
        if (term as usize) < self.num_terms {
            self.prob[pair * self.num_terms + term as usize]
        } else {
            self.oov[pair]
        }
    }
}

impl ProbabilityModel for Rrg {
    fn num_tags(&self) -> usize {
        self.num_tags
    }

    fn num_terms(&self) -> usize {
        self.num_terms
    }

    fn init_tag_prob(&self, tag: usize) -> f64 {
        self.backoff.init_tag_prob(tag)
    }

    #[inline]
    fn arcprob(&self, t1: usize, term: Term, t2: usize) -> f64 {
        let trans = self.backoff.log_trans(t1, t2);
        if trans == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        (self.combined_prob(t1, t2, term) * trans.exp()).ln()
    }

    fn term_prob(&self, tag: usize, term: Term) -> f64 {
        self.backoff.term_prob(tag, term)
    }

    fn tag_dict(&self) -> &TagDict {
        self.backoff.tag_dict()
    }

    fn update(&self, counts: &CountTensor) -> Result<Self> {
        let backoff = self.backoff.update(counts)?;
        Self::with_backoff(backoff, counts)
    }

    fn check_sanity(&self) -> Result<()> {
        self.backoff.check_sanity()?;
        for (pair, row) in self.prob.chunks(self.num_terms.max(1)).enumerate() {
            let sum: f64 = row.iter().sum();
            if sum.is_nan() || (sum - 1.0).abs() >= SANITY_TOLERANCE {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "combined row ({}, {}) sums to {sum}",
                    pair / self.num_tags,
                    pair % self.num_tags
                )));
            }
        }
        for t1 in 0..self.num_tags {
            let mut sum = 0.0;
            for w in 0..self.num_terms as Term {
                for t2 in 0..self.num_tags {
                    sum += self.arcprob(t1, w, t2).exp();
                }
            }
            if sum.is_nan() || (sum - 1.0).abs() >= SANITY_TOLERANCE {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "arcs out of tag {t1} sum to {sum}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ChunkedCorpus;
    use crate::encoder::EncoderType;

    fn corpus() -> ChunkedCorpus {
        ChunkedCorpus::new(vec![
            vec![vec![vec![2, 3], vec![4]], vec![vec![5]]],
            vec![vec![vec![2, 3, 3]]],
        ])
    }

    #[test]
    fn test_combined_rows() {
        let enc = TagEncoder::Bio;
        let counts = enc.hard_counts(&corpus(), 6).unwrap();
        let rrg = Rrg::from_counts(&counts, &enc, 0.1).unwrap();
        // B -> I seen twice, both times emitting term 2
        let expected = (2.0 + 0.1) / (2.0 + 0.1 * 6.0);
        assert!((rrg.combined_prob(1, 2, 2) - expected).abs() < 1e-12);
        assert!((rrg.combined_prob(1, 2, 40) - 0.1 / 2.0).abs() < 1e-12);
        // never-seen pair falls back to 1/V for unseen terms
        assert!((rrg.combined_prob(3, 3, 40) - 1.0 / 6.0).abs() < 1e-12);
        assert!(rrg.check_sanity().is_ok());
    }

    #[test]
    fn test_arcprob_combines_table_and_transition() {
        let enc = TagEncoder::Bio;
        let counts = enc.hard_counts(&corpus(), 6).unwrap();
        let rrg = Rrg::from_counts(&counts, &enc, 0.1).unwrap();
        let backoff = rrg.backoff();
        // terms 6.. are past the table and take the unseen-term mass
        for t1 in 0..4 {
            for t2 in 0..4 {
                for w in 0..10 {
                    let expected = if backoff.log_trans(t1, t2) == f64::NEG_INFINITY {
                        f64::NEG_INFINITY
                    } else {
                        (rrg.combined_prob(t1, t2, w) * backoff.trans_prob(t1, t2)).ln()
                    };
                    assert_eq!(rrg.arcprob(t1, w, t2), expected, "{t1} {w} {t2}");
                }
            }
        }
        // the transition factor is applied on top of the combined table
        assert!(backoff.trans_prob(2, 2) < 1.0);
        assert_ne!(rrg.arcprob(2, 3, 2), rrg.combined_prob(2, 2, 3).ln());
    }

    #[test]
    fn test_forbidden_arcs_are_impossible() {
        let enc = TagEncoder::new(EncoderType::BioGpNostop).unwrap();
        let counts = enc.uniform_counts(6);
        let rrg = Rrg::from_counts(&counts, &enc, 0.1).unwrap();
        let constraints = enc.constraints();
        for t1 in 0..enc.num_tags() {
            for t2 in 0..enc.num_tags() {
                if constraints.is_forbidden(t1, t2) {
                    assert_eq!(rrg.arcprob(t1, 3, t2), f64::NEG_INFINITY);
                }
            }
        }
    }

    #[test]
    fn test_backoff_drives_boundaries() {
        let enc = TagEncoder::Bio;
        let counts = enc.hard_counts(&corpus(), 6).unwrap();
        let rrg = Rrg::from_counts(&counts, &enc, 0.1).unwrap();
        assert_eq!(rrg.init_tag_prob(0), 0.0);
        assert_eq!(rrg.term_prob(0, 4), f64::NEG_INFINITY);
        assert_eq!(rrg.tag_dict().tags(4), &[1, 2, 3]);
        let next = rrg.update(&counts).unwrap();
        assert!((next.combined_prob(1, 2, 2) - rrg.combined_prob(1, 2, 2)).abs() < 1e-12);
    }
}
