//! Training driver: load corpora, run EM, write chunker output.

use std::fs;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use upchunk_core::{
    EmChunker, IterationReport, StopSegmentCorpus, TrainingConfig, TrainingSummary, Vocabulary,
};

use crate::data::{ReaderOptions, load_stop_segment_corpus};

/// Everything a training run needs besides the model configuration.
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    /// Training corpus, one sentence per line.
    pub train: PathBuf,
    /// Corpus to chunk; defaults to the training corpus.
    pub test: Option<PathBuf>,
    /// Directory for `iter-N.txt` files; stdout when unset.
    pub output_dir: Option<PathBuf>,
    /// Drop training sentences longer than this.
    pub max_len: Option<usize>,
    pub reader: ReaderOptions,
    pub config: TrainingConfig,
}

impl TrainerOptions {
    pub fn new(train: impl Into<PathBuf>) -> Self {
        Self {
            train: train.into(),
            test: None,
            output_dir: None,
            max_len: None,
            reader: ReaderOptions::default(),
            config: TrainingConfig::default(),
        }
    }
}

/// Train on `train` and hand the bracketed rendering of `eval` to `sink`
/// for every output iteration. A sink error stops training and is
/// returned.
pub fn train_on_corpus<F>(
    train: &StopSegmentCorpus,
    eval: &StopSegmentCorpus,
    vocab: &Vocabulary,
    config: TrainingConfig,
    mut sink: F,
) -> Result<TrainingSummary>
where
    F: FnMut(&IterationReport, &[String]) -> Result<()>,
{
    let mut chunker = EmChunker::from_stop_segment_corpus(train, vocab, config)
        .context("Failed to initialise model")?;

    let mut sink_error = None;
    let summary = chunker
        .run(&eval.flatten(), |report, chunked| {
            match sink(report, &chunked.render(vocab)) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    sink_error = Some(e);
                    ControlFlow::Break(())
                }
            }
        })
        .context("EM training failed")?;

    if let Some(e) = sink_error {
        return Err(e);
    }
    Ok(summary)
}

fn write_lines(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

fn write_iteration(dir: &Path, report: &IterationReport, lines: &[String]) -> Result<()> {
    let path = dir.join(format!("iter-{}.txt", report.iteration));
    let mut file = io::BufWriter::new(
        fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
    );
    write_lines(&mut file, lines).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote chunker output");
    Ok(())
}

/// Run a full training job as described by `options`.
pub fn run_training(options: &TrainerOptions) -> Result<TrainingSummary> {
    if !options.train.exists() {
        anyhow::bail!("Training data not found: {}", options.train.display());
    }

    let mut vocab = Vocabulary::new();
    let mut train = load_stop_segment_corpus(&options.train, &mut vocab, &options.reader)
        .with_context(|| format!("Failed to read {}", options.train.display()))?;
    if let Some(max_len) = options.max_len {
        train = train.filter_len(max_len);
    }
    let eval = match &options.test {
        Some(path) => load_stop_segment_corpus(path, &mut vocab, &options.reader)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => train.clone(),
    };
    info!(
        train_sentences = train.num_sentences(),
        train_tokens = train.num_tokens(),
        eval_sentences = eval.num_sentences(),
        vocabulary = vocab.len(),
        "loaded corpora"
    );
    if train.is_empty() {
        warn!("training corpus is empty");
    }

    if let Some(dir) = &options.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let output_all = options.config.output_all;
    let summary = train_on_corpus(&train, &eval, &vocab, options.config.clone(), |report, lines| {
        match &options.output_dir {
            Some(dir) => write_iteration(dir, report, lines),
            None => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                if output_all {
                    writeln!(out, "# iteration {}", report.iteration)?;
                }
                write_lines(&mut out, lines)?;
                Ok(())
            }
        }
    })?;

    if let Some(dir) = &options.output_dir {
        let path = dir.join("summary.json");
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!(
        iterations = summary.iterations,
        converged = summary.converged,
        final_perplexity = summary.perplexities.last().copied(),
        "training complete"
    );
    Ok(summary)
}
