//! # Training Configuration
//!
//! Every knob of a training run in one serde-friendly struct, so runs can be
//! described in JSON and overridden from the command line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoder::EncoderType;
use crate::error::{Result, UpchunkError};
use crate::model::ModelKind;

/// How the first model is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// Hard counts from the bigram chunker's output.
    #[default]
    TwoStage,
    /// Soft counts read off the stop context.
    Soft,
    /// Uniform pseudo-counts.
    Uniform,
    /// Seeded random pseudo-counts.
    Random { seed: u64 },
}

impl fmt::Display for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoStage => write!(f, "two_stage"),
            Self::Soft => write!(f, "soft"),
            Self::Uniform => write!(f, "uniform"),
            Self::Random { seed } => write!(f, "random:{seed}"),
        }
    }
}

impl FromStr for Initialization {
    type Err = UpchunkError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "two_stage" | "two-stage" => Ok(Self::TwoStage),
            "soft" => Ok(Self::Soft),
            "uniform" => Ok(Self::Uniform),
            "random" => Ok(Self::Random { seed: 0 }),
            other => match other.strip_prefix("random:") {
                Some(seed) => seed
                    .parse()
                    .map(|seed| Self::Random { seed })
                    .map_err(|_| UpchunkError::InvalidConfig(format!("bad seed: {seed}"))),
                None => Err(UpchunkError::InvalidConfig(format!(
                    "unknown initialization: {s}"
                ))),
            },
        }
    }
}

/// Configuration for an EM chunking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Tagset the chunk structure is spelled in
    pub encoder: EncoderType,
    /// Model family
    pub model: ModelKind,
    /// How the first model is estimated
    pub initialization: Initialization,
    /// Additive emission smoothing constant
    pub smoothing: f64,
    /// Stop once successive perplexities differ by less than this
    pub emdelta: f64,
    /// Iteration cap; 0 runs no iterations
    pub max_iterations: usize,
    /// Decode after every iteration instead of only the last
    pub output_all: bool,
    /// Pyramid weights of the bigram chunker
    pub stage_one_factor: Vec<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderType::Bio,
            model: ModelKind::Hmm,
            initialization: Initialization::TwoStage,
            smoothing: 0.1,
            emdelta: 0.001,
            max_iterations: 200,
            output_all: false,
            stage_one_factor: vec![2.0, 1.0, 1.0],
        }
    }
}

impl TrainingConfig {
    /// Create a new training configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoder(mut self, encoder: EncoderType) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_emdelta(mut self, emdelta: f64) -> Self {
        self.emdelta = emdelta;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_output_all(mut self, output_all: bool) -> Self {
        self.output_all = output_all;
        self
    }

    pub fn with_stage_one_factor(mut self, factor: Vec<f64>) -> Self {
        self.stage_one_factor = factor;
        self
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> Result<()> {
        if !(self.smoothing.is_finite() && self.smoothing > 0.0) {
            return Err(UpchunkError::InvalidConfig(format!(
                "smoothing must be positive, got {}",
                self.smoothing
            )));
        }
        if !(self.emdelta.is_finite() && self.emdelta >= 0.0) {
            return Err(UpchunkError::InvalidConfig(format!(
                "emdelta must be non-negative, got {}",
                self.emdelta
            )));
        }
        if let EncoderType::Grouped { groups: 0 } = self.encoder {
            return Err(UpchunkError::InvalidConfig(
                "grouped encoder needs at least one group".into(),
            ));
        }
        if self.stage_one_factor.is_empty()
            || self.stage_one_factor.iter().any(|f| !f.is_finite() || *f < 0.0)
        {
            return Err(UpchunkError::InvalidConfig(
                "stage one factor needs non-negative finite weights".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.emdelta, 0.001);
        assert_eq!(config.stage_one_factor, vec![2.0, 1.0, 1.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::new()
            .with_encoder(EncoderType::BioGpNostop)
            .with_model(ModelKind::Rrg)
            .with_initialization(Initialization::Random { seed: 3 })
            .with_max_iterations(5)
            .with_output_all(true);
        assert_eq!(config.encoder, EncoderType::BioGpNostop);
        assert_eq!(config.model, ModelKind::Rrg);
        assert!(config.output_all);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(TrainingConfig::new().with_smoothing(0.0).validate().is_err());
        assert!(TrainingConfig::new().with_emdelta(-1.0).validate().is_err());
        assert!(TrainingConfig::new()
            .with_stage_one_factor(vec![])
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_partial_override() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{"encoder": "BIO_GP", "model": "prlg", "initialization": {"random": {"seed": 9}}}"#,
        )
        .unwrap();
        assert_eq!(config.encoder, EncoderType::BioGp);
        assert_eq!(config.model, ModelKind::Rrg);
        assert_eq!(config.initialization, Initialization::Random { seed: 9 });
        assert_eq!(config.smoothing, 0.1);

        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("\"BIO_GP\""));
    }

    #[test]
    fn test_initialization_parse() {
        assert_eq!(
            "random:42".parse::<Initialization>().unwrap(),
            Initialization::Random { seed: 42 }
        );
        assert_eq!("soft".parse::<Initialization>().unwrap(), Initialization::Soft);
        assert!("magic".parse::<Initialization>().is_err());
    }
}
