//! Per-term tag dictionary used to prune the dynamic programs.

use crate::vocab::Term;

/// Tags with finite emission for each term, ascending.
///
/// Derived from a model's `term_prob` and rebuilt with every model; never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagDict {
    by_term: Vec<Vec<usize>>,
    oov: Vec<usize>,
}

impl TagDict {
    /// Collect, for every term below `num_terms` and for an unseen term,
    /// the tags whose `term_prob` is finite.
    pub fn build(num_tags: usize, num_terms: usize, term_prob: impl Fn(usize, Term) -> f64) -> Self {
        let finite = |w: Term| -> Vec<usize> {
            (0..num_tags)
                .filter(|&t| term_prob(t, w) > f64::NEG_INFINITY)
                .collect()
        };
        let by_term = (0..num_terms as Term).map(&finite).collect();
        let oov = finite(num_terms as Term);
        Self { by_term, oov }
    }

    /// Candidate tags for `term`.
    #[inline]
    pub fn tags(&self, term: Term) -> &[usize] {
        self.by_term
            .get(term as usize)
            .map_or(self.oov.as_slice(), Vec::as_slice)
    }

    /// Largest candidate list, the factor bounding each DP step.
    pub fn max_width(&self) -> usize {
        self.by_term
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.oov.len()))
            .max()
            .unwrap_or(0)
    }
}
