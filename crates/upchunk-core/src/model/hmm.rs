//! # Hidden Markov Model
//!
//! First-order HMM over encoder tags. The arc from `prev` to `cur` carries
//! `prev`'s emission of the token at `prev`'s position, so
//! `arcprob(prev, term, cur) = trans[prev][cur] + emiss[prev][term]`.

use crate::encoder::{Constraints, TagEncoder};
use crate::error::{Result, UpchunkError};
use crate::logspace::ln_or_neg_inf;
use crate::vocab::Term;

use super::ProbabilityModel;
use super::counts::CountTensor;
use super::emission::{EmissionTable, SANITY_TOLERANCE};
use super::tagdict::TagDict;

#[derive(Debug, Clone)]
pub struct Hmm {
    emission: EmissionTable,
    trans: Vec<Vec<f64>>,
    init_tag: Vec<f64>,
    encoder: TagEncoder,
    constraints: Constraints,
    smoothing: f64,
    tag_dict: TagDict,
}

impl Hmm {
    /// Maximum-likelihood estimate from `tag × term × tag` counts.
    pub fn from_counts(counts: &CountTensor, encoder: &TagEncoder, smoothing: f64) -> Result<Self> {
        if !(smoothing.is_finite() && smoothing > 0.0) {
            return Err(UpchunkError::InvalidConfig(format!(
                "smoothing must be positive, got {smoothing}"
            )));
        }
        counts.check_shape(encoder.num_tags(), counts.num_terms())?;

        let constraints = encoder.constraints();
        let emission = EmissionTable::from_counts(&counts.emission_totals(), encoder, smoothing)?;
        let trans = estimate_transitions(&counts.transition_totals(), &constraints);
        let init_tag = encoder
            .init_tag_distribution()
            .into_iter()
            .map(ln_or_neg_inf)
            .collect();
        let tag_dict = TagDict::build(encoder.num_tags(), counts.num_terms(), |t, w| {
            emission.log_prob(t, w)
        });

        let hmm = Self {
            emission,
            trans,
            init_tag,
            encoder: encoder.clone(),
            constraints,
            smoothing,
            tag_dict,
        };
        hmm.check_sanity()?;
        Ok(hmm)
    }

    pub fn encoder(&self) -> &TagEncoder {
        &self.encoder
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn emission(&self) -> &EmissionTable {
        &self.emission
    }

    /// `ln P(cur | prev)`.
    #[inline]
    pub fn log_trans(&self, prev: usize, cur: usize) -> f64 {
        self.trans[prev][cur]
    }

    /// `P(cur | prev)` in probability space.
    #[inline]
    pub fn trans_prob(&self, prev: usize, cur: usize) -> f64 {
        self.trans[prev][cur].exp()
    }
}

/// Normalise transition counts row by row, with forbidden cells zeroed.
/// A row without mass is spread over its allowed successors.
fn estimate_transitions(totals: &[Vec<f64>], constraints: &Constraints) -> Vec<Vec<f64>> {
    totals
        .iter()
        .enumerate()
        .map(|(j, row)| {
            let masked: Vec<f64> = row
                .iter()
                .enumerate()
                .map(|(k, &c)| if constraints.is_allowed(j, k) { c } else { 0.0 })
                .collect();
            let sum: f64 = masked.iter().sum();
            if sum > 0.0 {
                masked.iter().map(|&c| ln_or_neg_inf(c / sum)).collect()
            } else {
                let allowed = constraints.successors(j).count() as f64;
                (0..masked.len())
                    .map(|k| {
                        if constraints.is_allowed(j, k) {
                            -allowed.ln()
                        } else {
                            f64::NEG_INFINITY
                        }
                    })
                    .collect()
            }
        })
        .collect()
}

impl ProbabilityModel for Hmm {
    fn num_tags(&self) -> usize {
        self.trans.len()
    }

    fn num_terms(&self) -> usize {
        self.emission.num_terms()
    }

    fn init_tag_prob(&self, tag: usize) -> f64 {
        self.init_tag[tag]
    }

    #[inline]
    fn arcprob(&self, prev: usize, term: Term, cur: usize) -> f64 {
        self.trans[prev][cur] + self.emission.log_prob(prev, term)
    }

    #[inline]
    fn term_prob(&self, tag: usize, term: Term) -> f64 {
        self.emission.log_prob(tag, term)
    }

    fn tag_dict(&self) -> &TagDict {
        &self.tag_dict
    }

    fn update(&self, counts: &CountTensor) -> Result<Self> {
        counts.check_shape(self.num_tags(), self.num_terms())?;
        Self::from_counts(counts, &self.encoder, self.smoothing)
    }

    fn check_sanity(&self) -> Result<()> {
        self.emission.check_sanity()?;
        for (j, row) in self.trans.iter().enumerate() {
            if row.iter().any(|p| p.is_nan()) {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "NaN in transition row {j}"
                )));
            }
            let sum: f64 = row.iter().map(|p| p.exp()).sum();
            if (sum - 1.0).abs() >= SANITY_TOLERANCE {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "transition row {j} sums to {sum}"
                )));
            }
            if let Some(k) = (0..row.len())
                .find(|&k| self.constraints.is_forbidden(j, k) && row[k] > f64::NEG_INFINITY)
            {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "forbidden transition {j} -> {k} has mass"
                )));
            }
        }
        let init: f64 = self.init_tag.iter().map(|p| p.exp()).sum();
        if (init - 1.0).abs() >= SANITY_TOLERANCE {
            return Err(UpchunkError::NumericDegeneracy(format!(
                "initial tag distribution sums to {init}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ChunkedCorpus;
    use crate::vocab::Vocabulary;

    fn corpus() -> ChunkedCorpus {
        ChunkedCorpus::new(vec![
            vec![vec![vec![2, 3], vec![4]], vec![vec![5]]],
            vec![vec![vec![2, 3, 3]]],
        ])
    }

    fn trained() -> Hmm {
        let enc = TagEncoder::Bio;
        let counts = enc.hard_counts(&corpus(), 6).unwrap();
        Hmm::from_counts(&counts, &enc, 0.1).unwrap()
    }

    #[test]
    fn test_mle_transitions() {
        let hmm = trained();
        // B is always followed by I
        assert!((hmm.trans_prob(1, 2) - 1.0).abs() < 1e-12);
        // I -> I once, I -> O once, I -> STOP once
        assert!((hmm.trans_prob(2, 2) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(hmm.log_trans(3, 2), f64::NEG_INFINITY);
    }

    #[test]
    fn test_forbidden_arcs_are_impossible() {
        let hmm = trained();
        let constraints = TagEncoder::Bio.constraints();
        for j in 0..4 {
            for k in 0..4 {
                if constraints.is_forbidden(j, k) {
                    for w in 0..7 {
                        assert_eq!(hmm.arcprob(j, w, k), f64::NEG_INFINITY);
                    }
                }
            }
        }
    }

    #[test]
    fn test_arcprob_charges_emission_to_previous_tag() {
        let hmm = trained();
        for j in 0..4 {
            for k in 0..4 {
                for w in 0..8 {
                    assert_eq!(
                        hmm.arcprob(j, w, k),
                        hmm.log_trans(j, k) + hmm.emission().log_prob(j, w)
                    );
                }
            }
        }
        // B emits term 2, I does not
        assert!(hmm.arcprob(1, 2, 2).is_finite());
        assert_ne!(
            hmm.arcprob(1, 2, 2),
            hmm.log_trans(1, 2) + hmm.emission().log_prob(2, 2)
        );
    }

    #[test]
    fn test_sanity_rejects_mass_on_forbidden_transition() {
        let mut hmm = trained();
        assert!(hmm.check_sanity().is_ok());
        // O -> I is forbidden under BIO
        hmm.trans[3] = vec![f64::NEG_INFINITY, 0.5f64.ln(), 0.5f64.ln(), f64::NEG_INFINITY];
        assert!(matches!(
            hmm.check_sanity(),
            Err(UpchunkError::NumericDegeneracy(_))
        ));
    }

    #[test]
    fn test_init_tag_one_hot() {
        let hmm = trained();
        assert_eq!(hmm.init_tag_prob(0), 0.0);
        assert_eq!(hmm.init_tag_prob(1), f64::NEG_INFINITY);
    }

    #[test]
    fn test_tag_dict_follows_partition() {
        let hmm = trained();
        assert_eq!(hmm.tag_dict().tags(Vocabulary::EOS), &[0]);
        assert_eq!(hmm.tag_dict().tags(4), &[1, 2, 3]);
    }

    #[test]
    fn test_update_is_pure() {
        let hmm = trained();
        let counts = TagEncoder::Bio.uniform_counts(6);
        let next = hmm.update(&counts).unwrap();
        assert!((hmm.trans_prob(1, 2) - 1.0).abs() < 1e-12);
        assert!(next.check_sanity().is_ok());
        assert!((next.trans_prob(0, 1) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_row_falls_back_to_uniform() {
        let enc = TagEncoder::Bio;
        let counts = CountTensor::zeros(4, 6);
        let hmm = Hmm::from_counts(&counts, &enc, 0.1).unwrap();
        assert!((hmm.trans_prob(3, 1) - 1.0 / 3.0).abs() < 1e-12);
        assert!(hmm.check_sanity().is_ok());
    }

    #[test]
    fn test_rejects_bad_smoothing() {
        let counts = CountTensor::zeros(4, 6);
        assert!(matches!(
            Hmm::from_counts(&counts, &TagEncoder::Bio, 0.0),
            Err(UpchunkError::InvalidConfig(_))
        ));
    }
}
