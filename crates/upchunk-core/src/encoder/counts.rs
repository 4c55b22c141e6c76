//! Initial `tag × term × tag` counts produced straight from an encoder.

use oorandom::Rand64;

use super::TagEncoder;
use crate::corpus::ChunkedCorpus;
use crate::error::{Result, UpchunkError};
use crate::model::CountTensor;
use crate::vocab::{self, Term, Vocabulary};

impl TagEncoder {
    /// Counts of `(tag_t, token_t, tag_t+1)` over the gold encoding.
    pub fn hard_counts(&self, corpus: &ChunkedCorpus, num_terms: usize) -> Result<CountTensor> {
        let encoded = self.encode(corpus)?;
        vocab::check_terms(&encoded.tokens, num_terms)?;
        let mut counts = CountTensor::zeros(self.num_tags(), num_terms);
        for (t, pair) in encoded.tags.windows(2).enumerate() {
            counts.add(pair[0], encoded.tokens[t], pair[1], 1.0);
        }
        Ok(counts)
    }

    /// Expected counts under the soft tag weights of an unchunked stream.
    ///
    /// Mass that would fall on forbidden pairs is redistributed over the
    /// allowed ones by scaling with `candidates / allowed`.
    pub fn soft_counts(&self, tokens: &[Term], num_terms: usize) -> Result<CountTensor> {
        vocab::check_terms(tokens, num_terms)?;
        let n = self.num_tags();
        let constraints = self.constraints();
        let weights = self.soft_train(tokens);
        let mut counts = CountTensor::zeros(n, num_terms);

        for (i, pair) in weights.windows(2).enumerate() {
            let (here, next) = (&pair[0], &pair[1]);
            let mut total = 0.0;
            let mut allowed = 0.0;
            for t in (0..n).filter(|&t| here[t] > 0.0) {
                for u in (0..n).filter(|&u| next[u] > 0.0) {
                    total += 1.0;
                    if constraints.is_allowed(t, u) {
                        allowed += 1.0;
                    }
                }
            }
            if allowed == 0.0 {
                return Err(UpchunkError::NumericDegeneracy(format!(
                    "no allowed tag pair between positions {i} and {}",
                    i + 1
                )));
            }
            let ratio = total / allowed;
            for t in 0..n {
                for u in constraints.successors(t) {
                    let mass = ratio * here[t] * next[u];
                    if mass > 0.0 {
                        counts.add(t, tokens[i], u, mass);
                    }
                }
            }
        }
        Ok(counts)
    }

    /// One pseudo-count for every allowed transition and every term the
    /// tag may emit: sentinels for stop tags, ordinary terms otherwise.
    pub fn uniform_counts(&self, num_terms: usize) -> CountTensor {
        self.pseudo_counts(num_terms, |_, _| 1.0, |_, _| 1.0)
    }

    /// Like [`uniform_counts`](Self::uniform_counts), with seeded random
    /// weights in `(0, 1]` for each emission and each transition.
    pub fn random_counts(&self, num_terms: usize, seed: u64) -> CountTensor {
        let n = self.num_tags();
        let mut rng = Rand64::new(u128::from(seed));
        let mut draw = || 1.0 - rng.rand_float();
        let emission: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..num_terms).map(|_| draw()).collect())
            .collect();
        let transition: Vec<Vec<f64>> = (0..n).map(|_| (0..n).map(|_| draw()).collect()).collect();
        self.pseudo_counts(
            num_terms,
            |t, w| emission[t][w as usize],
            |t, u| transition[t][u],
        )
    }

    fn pseudo_counts(
        &self,
        num_terms: usize,
        emission: impl Fn(usize, Term) -> f64,
        transition: impl Fn(usize, usize) -> f64,
    ) -> CountTensor {
        let constraints = self.constraints();
        let mut counts = CountTensor::zeros(self.num_tags(), num_terms);
        for t in 0..self.num_tags() {
            let stop = self.is_stop_tag(t);
            for w in (0..num_terms as Term).filter(|&w| Vocabulary::is_boundary(w) == stop) {
                let e = emission(t, w);
                for u in constraints.successors(t) {
                    counts.add(t, w, u, e * transition(t, u));
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use crate::encoder::EncoderType;

    use super::*;

    #[test]
    fn test_hard_counts() {
        let corpus = ChunkedCorpus::new(vec![vec![vec![vec![2, 3], vec![4]]]]);
        let counts = TagEncoder::Bio.hard_counts(&corpus, 5).unwrap();
        // STOP:eos -> B:2 -> I:3 -> O:4 -> STOP:eos
        assert_eq!(counts.get(0, Vocabulary::EOS, 1), 1.0);
        assert_eq!(counts.get(1, 2, 2), 1.0);
        assert_eq!(counts.get(2, 3, 3), 1.0);
        assert_eq!(counts.get(3, 4, 0), 1.0);
        assert_eq!(counts.total(), 4.0);
    }

    #[test]
    fn test_hard_counts_term_bound() {
        let corpus = ChunkedCorpus::new(vec![vec![vec![vec![7]]]]);
        assert!(TagEncoder::Bio.hard_counts(&corpus, 5).is_err());
    }

    #[test]
    fn test_soft_counts_mass() {
        let tokens = [Vocabulary::EOS, 2, 3, 4, Vocabulary::EOS];
        for kind in [EncoderType::Bio, EncoderType::Bilo, EncoderType::BioGp] {
            let enc = TagEncoder::new(kind).unwrap();
            let counts = enc.soft_counts(&tokens, 5).unwrap();
            let constraints = enc.constraints();
            for t in 0..enc.num_tags() {
                for u in 0..enc.num_tags() {
                    if constraints.is_forbidden(t, u) {
                        for w in 0..5 {
                            assert_eq!(counts.get(t, w, u), 0.0);
                        }
                    }
                }
            }
            assert!(counts.total() > 0.0);
        }
    }

    #[test]
    fn test_uniform_counts_partition() {
        let enc = TagEncoder::Bio;
        let counts = enc.uniform_counts(6);
        let emission = counts.emission_totals();
        assert_eq!(emission[0][2], 0.0);
        assert!(emission[0][Vocabulary::EOS as usize] > 0.0);
        assert_eq!(emission[1][Vocabulary::STOP as usize], 0.0);
        assert!(emission[1][5] > 0.0);
    }

    #[test]
    fn test_random_counts_seeded() {
        let enc = TagEncoder::Bilo;
        assert_eq!(enc.random_counts(8, 7), enc.random_counts(8, 7));
        assert_ne!(enc.random_counts(8, 7), enc.random_counts(8, 8));
    }
}
