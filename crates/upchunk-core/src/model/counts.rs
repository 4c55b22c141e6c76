//! Dense `tag × term × tag` count tensor.

use crate::error::{Result, UpchunkError};
use crate::vocab::Term;

/// Fractional counts of `(tag, term, next tag)` triples.
///
/// `get(t, w, u)` is the (expected) number of times tag `t` emitted `w` and
/// was followed by tag `u`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTensor {
    num_tags: usize,
    num_terms: usize,
    data: Vec<f64>,
}

impl CountTensor {
    pub fn zeros(num_tags: usize, num_terms: usize) -> Self {
        Self {
            num_tags,
            num_terms,
            data: vec![0.0; num_tags * num_terms * num_tags],
        }
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    #[inline]
    fn index(&self, tag: usize, term: Term, next: usize) -> usize {
        (tag * self.num_terms + term as usize) * self.num_tags + next
    }

    #[inline]
    pub fn get(&self, tag: usize, term: Term, next: usize) -> f64 {
        self.data[self.index(tag, term, next)]
    }

    #[inline]
    pub fn add(&mut self, tag: usize, term: Term, next: usize, value: f64) {
        let idx = self.index(tag, term, next);
        self.data[idx] += value;
    }

    /// Per-tag emission totals, `Σ_u counts[t][w][u]`, shaped `[tag][term]`.
    pub fn emission_totals(&self) -> Vec<Vec<f64>> {
        (0..self.num_tags)
            .map(|t| {
                (0..self.num_terms)
                    .map(|w| {
                        let start = self.index(t, w as Term, 0);
                        self.data[start..start + self.num_tags].iter().sum()
                    })
                    .collect()
            })
            .collect()
    }

    /// Per-tag transition totals, `Σ_w counts[t][w][u]`, shaped `[tag][tag]`.
    pub fn transition_totals(&self) -> Vec<Vec<f64>> {
        let mut totals = vec![vec![0.0; self.num_tags]; self.num_tags];
        for (t, row) in totals.iter_mut().enumerate() {
            for w in 0..self.num_terms {
                let start = self.index(t, w as Term, 0);
                for (u, c) in self.data[start..start + self.num_tags].iter().enumerate() {
                    row[u] += c;
                }
            }
        }
        totals
    }

    /// Total mass of the tensor.
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Fail unless the tensor has the given shape.
    pub fn check_shape(&self, num_tags: usize, num_terms: usize) -> Result<()> {
        if self.num_tags != num_tags {
            return Err(UpchunkError::shape("count tensor tags", num_tags, self.num_tags));
        }
        if self.num_terms != num_terms {
            return Err(UpchunkError::shape(
                "count tensor terms",
                num_terms,
                self.num_terms,
            ));
        }
        if let Some(bad) = self.data.iter().find(|c| !c.is_finite() || **c < 0.0) {
            return Err(UpchunkError::NumericDegeneracy(format!(
                "count tensor holds {bad}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marginals() {
        let mut counts = CountTensor::zeros(2, 3);
        counts.add(0, 2, 1, 1.5);
        counts.add(0, 1, 1, 0.5);
        counts.add(1, 2, 0, 2.0);
        assert_eq!(counts.get(0, 2, 1), 1.5);

        let emission = counts.emission_totals();
        assert_eq!(emission[0], vec![0.0, 0.5, 1.5]);
        assert_eq!(emission[1], vec![0.0, 0.0, 2.0]);

        let transition = counts.transition_totals();
        assert_eq!(transition[0], vec![0.0, 2.0]);
        assert_eq!(transition[1], vec![2.0, 0.0]);
        assert_eq!(counts.total(), 4.0);
    }

    #[test]
    fn test_check_shape() {
        let counts = CountTensor::zeros(4, 10);
        assert!(counts.check_shape(4, 10).is_ok());
        assert!(counts.check_shape(5, 10).is_err());
        let mut bad = CountTensor::zeros(1, 1);
        bad.add(0, 0, 0, f64::NAN);
        assert!(matches!(
            bad.check_shape(1, 1),
            Err(UpchunkError::NumericDegeneracy(_))
        ));
    }
}
