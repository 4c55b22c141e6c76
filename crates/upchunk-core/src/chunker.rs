//! # EM Chunker
//!
//! Convergence controller: owns the current model and the training stream,
//! runs EM until the perplexity settles or the iteration cap is hit, and
//! decodes with the current model on request.

use std::ops::ControlFlow;

use serde::Serialize;
use tracing::{debug, info};

use crate::bootstrap::BigramChunker;
use crate::config::{Initialization, TrainingConfig};
use crate::corpus::{ChunkedCorpus, StopSegmentCorpus};
use crate::em;
use crate::encoder::TagEncoder;
use crate::error::Result;
use crate::model::{CountTensor, ProbabilityModel, SequenceModel};
use crate::viterbi::ViterbiDecoder;
use crate::vocab::{self, Term, Vocabulary};

/// What the output hook is told about the model it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationReport {
    /// Completed EM iterations; 0 is the initial model.
    pub iteration: usize,
    /// Perplexity measured by the last iteration, if any ran.
    pub perplexity: Option<f64>,
    /// Absolute change from the previous perplexity, once two exist.
    pub delta: Option<f64>,
}

/// How a call to [`EmChunker::run`] ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub perplexities: Vec<f64>,
    /// The perplexity change fell below `emdelta`.
    pub converged: bool,
    /// The hook asked to stop.
    pub interrupted: bool,
}

/// Trains a sequence model with EM and chunks with it.
#[derive(Debug, Clone)]
pub struct EmChunker {
    model: SequenceModel,
    train_tokens: Vec<Term>,
    config: TrainingConfig,
    decoder: ViterbiDecoder,
    perplexities: Vec<f64>,
}

impl EmChunker {
    /// Wrap an already estimated model.
    pub fn new(model: SequenceModel, train_tokens: Vec<Term>, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        vocab::check_terms(&train_tokens, model.num_terms())?;
        Ok(Self {
            model,
            train_tokens,
            config,
            decoder: ViterbiDecoder::new(),
            perplexities: Vec::new(),
        })
    }

    /// Initialise from raw segmented text, as chosen by
    /// `config.initialization`.
    pub fn from_stop_segment_corpus(
        corpus: &StopSegmentCorpus,
        vocab: &Vocabulary,
        config: TrainingConfig,
    ) -> Result<Self> {
        config.validate()?;
        let encoder = TagEncoder::new(config.encoder)?;
        let num_terms = vocab.len();
        let tokens = corpus.flatten();

        let counts = match config.initialization {
            Initialization::TwoStage => {
                let bigrams = BigramChunker::train(corpus, config.stage_one_factor.clone());
                encoder.hard_counts(&bigrams.chunk(corpus), num_terms)?
            }
            Initialization::Soft => encoder.soft_counts(&tokens, num_terms)?,
            Initialization::Uniform => encoder.uniform_counts(num_terms),
            Initialization::Random { seed } => encoder.random_counts(num_terms, seed),
        };
        info!(
            encoder = %config.encoder,
            model = %config.model,
            initialization = %config.initialization,
            num_terms,
            num_tokens = tokens.len(),
            "initialising model"
        );
        Self::with_counts(&counts, &encoder, tokens, config)
    }

    /// Initialise from hard counts of an already chunked corpus, which is
    /// also the training stream.
    pub fn from_chunked_corpus(
        corpus: &ChunkedCorpus,
        vocab: &Vocabulary,
        config: TrainingConfig,
    ) -> Result<Self> {
        config.validate()?;
        let encoder = TagEncoder::new(config.encoder)?;
        let counts = encoder.hard_counts(corpus, vocab.len())?;
        Self::with_counts(&counts, &encoder, corpus.flatten(), config)
    }

    fn with_counts(
        counts: &CountTensor,
        encoder: &TagEncoder,
        tokens: Vec<Term>,
        config: TrainingConfig,
    ) -> Result<Self> {
        let model = SequenceModel::from_counts(config.model, counts, encoder, config.smoothing)?;
        Self::new(model, tokens, config)
    }

    pub fn model(&self) -> &SequenceModel {
        &self.model
    }

    pub fn encoder(&self) -> &TagEncoder {
        self.model.encoder()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Completed EM iterations.
    pub fn iteration(&self) -> usize {
        self.perplexities.len()
    }

    pub fn perplexities(&self) -> &[f64] {
        &self.perplexities
    }

    /// Absolute change between the last two perplexities.
    pub fn delta(&self) -> Option<f64> {
        match self.perplexities.as_slice() {
            [.., prev, last] => Some((last - prev).abs()),
            _ => None,
        }
    }

    /// Whether the cap and the convergence test both allow one more
    /// iteration.
    pub fn another_iteration(&self) -> bool {
        if self.iteration() >= self.config.max_iterations {
            return false;
        }
        self.delta().is_none_or(|delta| delta >= self.config.emdelta)
    }

    /// Run one EM iteration over the training stream and return the
    /// perplexity it measured.
    pub fn update_with_em(&mut self) -> Result<f64> {
        let step = em::em_iteration(&self.model, &self.train_tokens)?;
        self.model = step.model;
        self.perplexities.push(step.perplexity);
        info!(
            iteration = self.iteration(),
            perplexity = step.perplexity,
            delta = self.delta(),
            "EM update"
        );
        Ok(step.perplexity)
    }

    /// Most probable tag sequence for `tokens` under the current model.
    pub fn tag(&self, tokens: &[Term]) -> Result<Vec<usize>> {
        self.decoder.decode(&self.model, tokens)
    }

    /// Tag a flat stream and decode it into chunks.
    pub fn chunk_tokens(&self, tokens: &[Term]) -> Result<ChunkedCorpus> {
        let tags = self.tag(tokens)?;
        self.encoder().decode(tokens, &tags)
    }

    /// Chunk every sentence of `corpus`.
    pub fn chunk(&self, corpus: &StopSegmentCorpus) -> Result<ChunkedCorpus> {
        self.chunk_tokens(&corpus.flatten())
    }

    fn report(&self) -> IterationReport {
        IterationReport {
            iteration: self.iteration(),
            perplexity: self.perplexities.last().copied(),
            delta: self.delta(),
        }
    }

    fn emit<F>(&self, eval_tokens: &[Term], hook: &mut F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&IterationReport, &ChunkedCorpus) -> ControlFlow<()>,
    {
        let report = self.report();
        let chunked = self.chunk_tokens(eval_tokens)?;
        debug!(iteration = report.iteration, sentences = chunked.num_sentences(), "decoded");
        Ok(hook(&report, &chunked))
    }

    /// Train until convergence or the cap, decoding `eval_tokens` for the
    /// hook after every iteration (with `output_all`, starting from the
    /// initial model) or once at the end. A `Break` from the hook stops
    /// training before the next iteration.
    pub fn run<F>(&mut self, eval_tokens: &[Term], mut hook: F) -> Result<TrainingSummary>
    where
        F: FnMut(&IterationReport, &ChunkedCorpus) -> ControlFlow<()>,
    {
        let output_all = self.config.output_all;
        let mut interrupted = false;

        if output_all {
            interrupted = self.emit(eval_tokens, &mut hook)?.is_break();
        }
        while !interrupted && self.another_iteration() {
            self.update_with_em()?;
            if output_all {
                interrupted = self.emit(eval_tokens, &mut hook)?.is_break();
            }
        }
        if !output_all {
            interrupted = self.emit(eval_tokens, &mut hook)?.is_break();
        }

        let converged = self
            .delta()
            .is_some_and(|delta| delta < self.config.emdelta);
        info!(
            iterations = self.iteration(),
            converged,
            interrupted,
            "training finished"
        );
        Ok(TrainingSummary {
            iterations: self.iteration(),
            perplexities: self.perplexities.clone(),
            converged,
            interrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderType;
    use crate::model::ModelKind;

    fn sample() -> (Vocabulary, StopSegmentCorpus) {
        let mut vocab = Vocabulary::new();
        let lines = [
            "the dog barks , the cat sleeps",
            "the dog sleeps",
            "a cat barks , the dog runs",
            "the cat runs",
        ];
        let sentences = lines
            .iter()
            .map(|line| {
                line.split(" , ")
                    .map(|seg| seg.split_whitespace().map(|w| vocab.code(w)).collect())
                    .collect()
            })
            .collect();
        (vocab, StopSegmentCorpus::new(sentences))
    }

    #[test]
    fn test_runs_to_cap_with_zero_delta() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new().with_emdelta(0.0).with_max_iterations(4);
        let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
        let mut calls = 0;
        let summary = chunker
            .run(&corpus.flatten(), |_, _| {
                calls += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(summary.iterations, 4);
        assert_eq!(summary.perplexities.len(), 4);
        assert!(!summary.interrupted);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_cap_runs_nothing() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new().with_max_iterations(0);
        let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
        assert!(!chunker.another_iteration());
        let summary = chunker.run(&corpus.flatten(), |_, _| ControlFlow::Continue(())).unwrap();
        assert_eq!(summary.iterations, 0);
        assert!(summary.perplexities.is_empty());
    }

    #[test]
    fn test_output_all_reports_every_iteration() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new()
            .with_emdelta(0.0)
            .with_max_iterations(3)
            .with_output_all(true);
        let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
        let mut seen = Vec::new();
        chunker
            .run(&corpus.flatten(), |report, chunked| {
                assert_eq!(chunked.num_sentences(), 4);
                seen.push(report.iteration);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_hook_break_stops_training() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new()
            .with_emdelta(0.0)
            .with_max_iterations(10)
            .with_output_all(true);
        let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
        let summary = chunker
            .run(&corpus.flatten(), |report, _| {
                if report.iteration == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.iterations, 2);
    }

    #[test]
    fn test_every_initialization_trains() {
        let (vocab, corpus) = sample();
        for init in [
            Initialization::TwoStage,
            Initialization::Soft,
            Initialization::Uniform,
            Initialization::Random { seed: 7 },
        ] {
            for model in [ModelKind::Hmm, ModelKind::Rrg] {
                let config = TrainingConfig::new()
                    .with_initialization(init)
                    .with_model(model)
                    .with_encoder(EncoderType::BioGp)
                    .with_max_iterations(2);
                let mut chunker =
                    EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
                let p = chunker.update_with_em().unwrap();
                assert!(p.is_finite() && p >= 0.0);
                assert!(chunker.model().check_sanity().is_ok());
                let chunked = chunker.chunk(&corpus).unwrap();
                assert_eq!(chunked.num_sentences(), corpus.num_sentences());
            }
        }
    }

    #[test]
    fn test_unseen_stop_token_splits_segments() {
        // no stopping punctuation anywhere in the training text
        let mut vocab = Vocabulary::new();
        let mut read = |line: &str| -> Vec<Vec<Term>> {
            line.split(" , ")
                .map(|seg| seg.split_whitespace().map(|w| vocab.code(w)).collect())
                .collect()
        };
        let train = StopSegmentCorpus::new(vec![
            read("the dog barked at a cat"),
            read("a cat sat"),
            read("the dog sat on the cat"),
        ]);
        let test = StopSegmentCorpus::new(vec![read("the dog barked , a cat sat")]);
        assert!(!train.flatten().contains(&Vocabulary::STOP));

        for init in [
            Initialization::TwoStage,
            Initialization::Soft,
            Initialization::Uniform,
            Initialization::Random { seed: 5 },
        ] {
            for model in [ModelKind::Hmm, ModelKind::Rrg] {
                let config = TrainingConfig::new()
                    .with_initialization(init)
                    .with_model(model)
                    .with_encoder(EncoderType::Bio);
                let mut chunker =
                    EmChunker::from_stop_segment_corpus(&train, &vocab, config).unwrap();
                chunker.update_with_em().unwrap();
                let chunked = chunker.chunk(&test).unwrap();
                assert_eq!(chunked.num_sentences(), 1, "{init:?} {model}");
                assert_eq!(chunked.sentences()[0].len(), 2, "{init:?} {model}");
                assert_eq!(chunked.flatten(), test.flatten());
            }
        }
    }

    #[test]
    fn test_convergence_stops_early() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new().with_emdelta(1e9).with_max_iterations(50);
        let mut chunker = EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).unwrap();
        let summary = chunker.run(&corpus.flatten(), |_, _| ControlFlow::Continue(())).unwrap();
        assert_eq!(summary.iterations, 2);
        assert!(summary.converged);
    }

    #[test]
    fn test_rejects_bad_config() {
        let (vocab, corpus) = sample();
        let config = TrainingConfig::new().with_smoothing(-1.0);
        assert!(EmChunker::from_stop_segment_corpus(&corpus, &vocab, config).is_err());
    }
}
