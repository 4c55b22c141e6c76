//! # upchunk Trainer
//!
//! Outer surface around `upchunk-core`: a sentence-per-line corpus reader
//! and the driver behind the `train` binary, which runs EM and writes
//! bracketed chunker output.

pub mod data;
pub mod trainer;

pub use data::{ReaderOptions, load_stop_segment_corpus, read_stop_segment_corpus};
pub use trainer::{TrainerOptions, run_training, train_on_corpus};
