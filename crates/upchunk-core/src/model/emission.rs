//! # Emission Table
//!
//! Log-space `P(term | tag)` with a hard stop/non-stop partition. Stop
//! tags emit only stop-class terms: the EOS and STOP sentinels plus any
//! term that currently carries mass under some stop tag. Every other tag
//! emits only the remaining, "active" terms, with additive smoothing spread
//! over them. A sentinel never seen under a stop tag gets smoothing mass in
//! the stop rows, so a STOP that only occurs at decode time stays a stop.

use crate::encoder::TagEncoder;
use crate::error::{Result, UpchunkError};
use crate::logspace::ln_or_neg_inf;
use crate::vocab::{Term, Vocabulary};

/// Row sums must be within this distance of one.
pub const SANITY_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionTable {
    log_prob: Vec<Vec<f64>>,
    oov: Vec<f64>,
    stop_terms: Vec<bool>,
    active_terms: usize,
}

impl EmissionTable {
    /// Estimate from per-tag emission counts shaped `[tag][term]`.
    pub fn from_counts(counts: &[Vec<f64>], encoder: &TagEncoder, smoothing: f64) -> Result<Self> {
        let num_tags = encoder.num_tags();
        if counts.len() != num_tags {
            return Err(UpchunkError::shape("emission rows", num_tags, counts.len()));
        }
        let num_terms = counts.first().map_or(0, Vec::len);
        let stop_tags = encoder.stop_tags();

        let stop_mass: Vec<f64> = (0..num_terms)
            .map(|w| stop_tags.iter().map(|&s| counts[s][w]).sum::<f64>())
            .collect();
        let stop_terms: Vec<bool> = stop_mass
            .iter()
            .enumerate()
            .map(|(w, &mass)| mass > 0.0 || Vocabulary::is_boundary(w as Term))
            .collect();
        // sentinels in the stop class with no observed stop mass
        let unseen: Vec<bool> = stop_mass
            .iter()
            .zip(&stop_terms)
            .map(|(&mass, &stop)| stop && mass <= 0.0)
            .collect();
        let num_unseen = unseen.iter().filter(|&&u| u).count() as f64;
        let num_stop_terms = stop_terms.iter().filter(|&&s| s).count();
        let active_terms = num_terms - num_stop_terms;

        let mut log_prob = Vec::with_capacity(num_tags);
        let mut oov = Vec::with_capacity(num_tags);
        for (tag, row) in counts.iter().enumerate() {
            if encoder.is_stop_tag(tag) {
                let sum: f64 = row
                    .iter()
                    .zip(&stop_terms)
                    .filter(|(_, s)| **s)
                    .map(|(c, _)| c)
                    .sum();
                let denom = sum + smoothing * num_unseen;
                log_prob.push(
                    row.iter()
                        .zip(stop_terms.iter().zip(&unseen))
                        .map(|(&c, (&stop, &fresh))| match (stop, sum > 0.0) {
                            (false, _) => f64::NEG_INFINITY,
                            (true, true) if fresh => ln_or_neg_inf(smoothing / denom),
                            (true, true) => ln_or_neg_inf(c / denom),
                            (true, false) => -(num_stop_terms as f64).ln(),
                        })
                        .collect(),
                );
                oov.push(f64::NEG_INFINITY);
            } else {
                let sum: f64 = row
                    .iter()
                    .zip(&stop_terms)
                    .filter(|(_, s)| !**s)
                    .map(|(c, _)| c)
                    .sum();
                let log_denom = (sum + smoothing * active_terms as f64).ln();
                log_prob.push(
                    row.iter()
                        .zip(&stop_terms)
                        .map(|(&c, &stop)| {
                            if stop {
                                f64::NEG_INFINITY
                            } else {
                                ln_or_neg_inf(c + smoothing) - log_denom
                            }
                        })
                        .collect(),
                );
                oov.push(ln_or_neg_inf(smoothing) - log_denom);
            }
        }

        Ok(Self {
            log_prob,
            oov,
            stop_terms,
            active_terms,
        })
    }

    pub fn num_tags(&self) -> usize {
        self.log_prob.len()
    }

    pub fn num_terms(&self) -> usize {
        self.stop_terms.len()
    }

    /// Number of terms outside the stop class.
    pub fn active_terms(&self) -> usize {
        self.active_terms
    }

    pub fn is_stop_term(&self, term: Term) -> bool {
        self.stop_terms.get(term as usize).copied().unwrap_or(false)
    }

    /// `ln P(term | tag)`; ids past the table are out-of-vocabulary.
    #[inline]
    pub fn log_prob(&self, tag: usize, term: Term) -> f64 {
        match self.log_prob[tag].get(term as usize) {
            Some(&p) => p,
            None => self.oov[tag],
        }
    }

    /// Every row is a distribution over the known terms.
    pub fn check_sanity(&self) -> Result<()> {
        for (tag, row) in self.log_prob.iter().enumerate() {
            if row.iter().any(|p| p.is_nan()) {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "NaN in emission row {tag}"
                )));
            }
            let sum: f64 = row.iter().map(|p| p.exp()).sum();
            if (sum - 1.0).abs() >= SANITY_TOLERANCE {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "emission row {tag} sums to {sum}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> Vec<Vec<f64>> {
        // BIO tags over terms {eos, stop, a, b}
        vec![
            vec![3.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 2.0, 0.0],
            vec![0.0, 0.0, 0.0, 2.0],
            vec![0.0, 0.0, 1.0, 1.0],
        ]
    }

    #[test]
    fn test_stop_partition() {
        let table = EmissionTable::from_counts(&counts(), &TagEncoder::Bio, 0.1).unwrap();
        assert!(table.is_stop_term(Vocabulary::EOS));
        assert!(table.is_stop_term(Vocabulary::STOP));
        assert!(!table.is_stop_term(2));
        assert_eq!(table.active_terms(), 2);

        assert!((table.log_prob(0, Vocabulary::EOS) - 0.75f64.ln()).abs() < 1e-12);
        assert_eq!(table.log_prob(0, 2), f64::NEG_INFINITY);
        assert_eq!(table.log_prob(1, Vocabulary::EOS), f64::NEG_INFINITY);
        assert!(table.check_sanity().is_ok());
    }

    #[test]
    fn test_smoothing_and_oov() {
        let table = EmissionTable::from_counts(&counts(), &TagEncoder::Bio, 0.5).unwrap();
        // tag B: (2 + .5) / (2 + .5 * 2) and (0 + .5) / 3
        assert!((table.log_prob(1, 2) - (2.5f64 / 3.0).ln()).abs() < 1e-12);
        assert!((table.log_prob(1, 3) - (0.5f64 / 3.0).ln()).abs() < 1e-12);
        assert!((table.log_prob(1, 99) - (0.5f64 / 3.0).ln()).abs() < 1e-12);
        assert_eq!(table.log_prob(0, 99), f64::NEG_INFINITY);
    }

    #[test]
    fn test_empty_stop_row_falls_back_to_uniform() {
        let mut c = counts();
        c[0] = vec![0.0; 4];
        let table = EmissionTable::from_counts(&c, &TagEncoder::Bio, 0.1).unwrap();
        assert!(table.is_stop_term(Vocabulary::EOS));
        assert!(table.is_stop_term(Vocabulary::STOP));
        assert!((table.log_prob(0, Vocabulary::EOS) - 0.5f64.ln()).abs() < 1e-12);
        assert!((table.log_prob(0, Vocabulary::STOP) - 0.5f64.ln()).abs() < 1e-12);
        assert!(table.check_sanity().is_ok());
    }

    #[test]
    fn test_unseen_stop_sentinel_stays_in_stop_class() {
        // training text without stopping punctuation: STOP never observed
        let mut c = counts();
        c[0] = vec![4.0, 0.0, 0.0, 0.0];
        let table = EmissionTable::from_counts(&c, &TagEncoder::Bio, 0.5).unwrap();
        assert!(table.is_stop_term(Vocabulary::STOP));
        assert_eq!(table.active_terms(), 2);

        // (4) / (4 + .5) and (.5) / (4 + .5)
        assert!((table.log_prob(0, Vocabulary::EOS) - (4.0f64 / 4.5).ln()).abs() < 1e-12);
        assert!((table.log_prob(0, Vocabulary::STOP) - (0.5f64 / 4.5).ln()).abs() < 1e-12);
        for tag in 1..4 {
            assert_eq!(table.log_prob(tag, Vocabulary::STOP), f64::NEG_INFINITY);
        }
        assert!(table.check_sanity().is_ok());
    }
}
