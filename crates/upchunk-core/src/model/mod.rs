//! # Probability Models
//!
//! Sequence models trained by EM and searched by Viterbi. Both variants
//! expose one arc score, `arcprob(prev, term, cur)`, so the dynamic
//! programs never need to know which model they run.

mod counts;
mod emission;
mod hmm;
mod rrg;
mod tagdict;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoder::TagEncoder;
use crate::error::{Result, UpchunkError};
use crate::vocab::Term;

pub use counts::CountTensor;
pub use emission::{EmissionTable, SANITY_TOLERANCE};
pub use hmm::Hmm;
pub use rrg::Rrg;
pub use tagdict::TagDict;

/// What the EM trainer and the Viterbi decoder need from a model.
///
/// All scores are natural logs.
pub trait ProbabilityModel: Sized {
    fn num_tags(&self) -> usize;

    fn num_terms(&self) -> usize;

    /// Score of starting in `tag`.
    fn init_tag_prob(&self, tag: usize) -> f64;

    /// Score of `prev` emitting `term` and moving to `cur`.
    fn arcprob(&self, prev: usize, term: Term, cur: usize) -> f64;

    /// Score of `tag` emitting `term` at the end of the stream.
    fn term_prob(&self, tag: usize, term: Term) -> f64;

    fn tag_dict(&self) -> &TagDict;

    /// Re-estimate from expected counts, returning a new model.
    fn update(&self, counts: &CountTensor) -> Result<Self>;

    /// Fail unless every conditional distribution sums to one.
    fn check_sanity(&self) -> Result<()>;
}

/// Which model family to train.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Hmm,
    #[serde(alias = "prlg")]
    Rrg,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hmm => write!(f, "hmm"),
            Self::Rrg => write!(f, "rrg"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = UpchunkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hmm" => Ok(Self::Hmm),
            "rrg" | "prlg" => Ok(Self::Rrg),
            other => Err(UpchunkError::InvalidConfig(format!(
                "unknown model kind: {other}"
            ))),
        }
    }
}

/// The closed set of trainable models.
#[derive(Debug, Clone)]
pub enum SequenceModel {
    Hmm(Hmm),
    Rrg(Rrg),
}

impl SequenceModel {
    /// Estimate a model of the given kind from counts.
    pub fn from_counts(
        kind: ModelKind,
        counts: &CountTensor,
        encoder: &TagEncoder,
        smoothing: f64,
    ) -> Result<Self> {
        Ok(match kind {
            ModelKind::Hmm => Self::Hmm(Hmm::from_counts(counts, encoder, smoothing)?),
            ModelKind::Rrg => Self::Rrg(Rrg::from_counts(counts, encoder, smoothing)?),
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Hmm(_) => ModelKind::Hmm,
            Self::Rrg(_) => ModelKind::Rrg,
        }
    }

    pub fn encoder(&self) -> &TagEncoder {
        match self {
            Self::Hmm(m) => m.encoder(),
            Self::Rrg(m) => m.backoff().encoder(),
        }
    }
}

impl ProbabilityModel for SequenceModel {
    fn num_tags(&self) -> usize {
        match self {
            Self::Hmm(m) => m.num_tags(),
            Self::Rrg(m) => m.num_tags(),
        }
    }

    fn num_terms(&self) -> usize {
        match self {
            Self::Hmm(m) => m.num_terms(),
            Self::Rrg(m) => m.num_terms(),
        }
    }

    fn init_tag_prob(&self, tag: usize) -> f64 {
        match self {
            Self::Hmm(m) => m.init_tag_prob(tag),
            Self::Rrg(m) => m.init_tag_prob(tag),
        }
    }

    #[inline]
    fn arcprob(&self, prev: usize, term: Term, cur: usize) -> f64 {
        match self {
            Self::Hmm(m) => m.arcprob(prev, term, cur),
            Self::Rrg(m) => m.arcprob(prev, term, cur),
        }
    }

    fn term_prob(&self, tag: usize, term: Term) -> f64 {
        match self {
            Self::Hmm(m) => m.term_prob(tag, term),
            Self::Rrg(m) => m.term_prob(tag, term),
        }
    }

    fn tag_dict(&self) -> &TagDict {
        match self {
            Self::Hmm(m) => m.tag_dict(),
            Self::Rrg(m) => m.tag_dict(),
        }
    }

    fn update(&self, counts: &CountTensor) -> Result<Self> {
        Ok(match self {
            Self::Hmm(m) => Self::Hmm(m.update(counts)?),
            Self::Rrg(m) => Self::Rrg(m.update(counts)?),
        })
    }

    fn check_sanity(&self) -> Result<()> {
        match self {
            Self::Hmm(m) => m.check_sanity(),
            Self::Rrg(m) => m.check_sanity(),
        }
    }
}
