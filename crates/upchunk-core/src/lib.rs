//! # upchunk Core
//!
//! Unsupervised chunking of plain token sequences. A first-order sequence
//! model (an HMM, or the factored right-regular grammar variant) is trained
//! with log-space EM and decoded with Viterbi; tag encoders translate
//! between nested chunk structures and flat tag streams.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::ops::ControlFlow;
//! use upchunk_core::{EmChunker, StopSegmentCorpus, TrainingConfig, Vocabulary};
//!
//! let mut vocab = Vocabulary::new();
//! let mut sentence = |s: &str| vec![s.split_whitespace().map(|w| vocab.code(w)).collect::<Vec<_>>()];
//! let corpus = StopSegmentCorpus::new(vec![
//!     sentence("the dog barks"),
//!     sentence("the cat sleeps"),
//! ]);
//!
//! let config = TrainingConfig::new().with_max_iterations(5);
//! let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
//! let summary = chunker
//!     .run(&corpus.flatten(), |_, chunked| {
//!         assert_eq!(chunked.num_sentences(), 2);
//!         ControlFlow::Continue(())
//!     })
//!     .unwrap();
//! assert!(summary.iterations <= 5);
//! ```
pub mod bootstrap;
pub mod chunker;
pub mod config;
pub mod corpus;
pub mod em;
pub mod encoder;
pub mod error;
pub mod logspace;
pub mod model;
pub mod viterbi;
pub mod vocab;

// Re-export primary API
pub use bootstrap::BigramChunker;
pub use chunker::{EmChunker, IterationReport, TrainingSummary};
pub use config::{Initialization, TrainingConfig};
pub use corpus::{Chunk, ChunkedCorpus, Segment, Sentence, StopSegmentCorpus};
pub use em::{EmStep, em_iteration, expected_counts, perplexity};
pub use encoder::{Constraints, Encoded, EncoderType, TagEncoder};
pub use error::{Result, UpchunkError};
pub use model::{CountTensor, Hmm, ModelKind, ProbabilityModel, Rrg, SequenceModel};
pub use viterbi::ViterbiDecoder;
pub use vocab::{Term, Vocabulary};
