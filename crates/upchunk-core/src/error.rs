use thiserror::Error;

/// Errors that can occur during encoding, training or decoding.
#[derive(Debug, Error)]
pub enum UpchunkError {
    /// A flat tag sequence breaks the adjacency rules of its encoder.
    #[error("encoding error at position {position}: {message}")]
    Encoding {
        /// Index into the flat token/tag stream.
        position: usize,
        /// What was wrong at that position.
        message: String,
    },

    /// A probability row does not sum to one, or a value that must be
    /// finite is NaN or negative infinity.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// Two arrays or structures that must line up do not.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The quantity being compared.
        what: String,
        /// The size the caller required.
        expected: usize,
        /// The size that was supplied.
        actual: usize,
    },

    /// A training parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl UpchunkError {
    pub(crate) fn encoding(position: usize, message: impl Into<String>) -> Self {
        Self::Encoding {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type alias for upchunk operations.
pub type Result<T> = std::result::Result<T, UpchunkError>;
