//! Train an unsupervised chunker on plain text and write its bracketed
//! output.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, error};
use upchunk_core::{EncoderType, Initialization, ModelKind, TrainingConfig};
use upchunk_trainer::{ReaderOptions, TrainerOptions, run_training};

/// CLI arguments
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train an unsupervised chunker with EM")]
#[command(version)]
struct Cli {
    /// Training corpus, one sentence per line
    train: PathBuf,

    /// Corpus to chunk (defaults to the training corpus)
    #[arg(short, long)]
    test: Option<PathBuf>,

    /// Write iter-N.txt files here instead of stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JSON training configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tag encoder: BIO, BILO, BIO_GP, BIO_GP_NOSTOP or GROUPED:n
    #[arg(short, long)]
    encoder: Option<EncoderType>,

    /// Sequence model: hmm or rrg
    #[arg(short, long)]
    model: Option<ModelKind>,

    /// Initialisation: two_stage, soft, uniform or random:SEED
    #[arg(long)]
    init: Option<Initialization>,

    /// Emission smoothing constant
    #[arg(long)]
    smoothing: Option<f64>,

    /// Convergence threshold on perplexity change
    #[arg(long)]
    emdelta: Option<f64>,

    /// Maximum EM iterations
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Write output after every iteration
    #[arg(long)]
    output_all: bool,

    /// Bigram chunker pyramid weights
    #[arg(long, value_delimiter = ',')]
    factor: Option<Vec<f64>>,

    /// Ignore stopping punctuation when segmenting
    #[arg(long)]
    no_seg: bool,

    /// Read at most this many sentences per corpus
    #[arg(long)]
    max_sentences: Option<usize>,

    /// Drop training sentences longer than this
    #[arg(long)]
    max_len: Option<usize>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            None => TrainingConfig::default(),
        };

        if let Some(encoder) = self.encoder {
            config = config.with_encoder(encoder);
        }
        if let Some(model) = self.model {
            config = config.with_model(model);
        }
        if let Some(init) = self.init {
            config = config.with_initialization(init);
        }
        if let Some(smoothing) = self.smoothing {
            config = config.with_smoothing(smoothing);
        }
        if let Some(emdelta) = self.emdelta {
            config = config.with_emdelta(emdelta);
        }
        if let Some(iterations) = self.iterations {
            config = config.with_max_iterations(iterations);
        }
        if self.output_all {
            config = config.with_output_all(true);
        }
        if let Some(factor) = &self.factor {
            config = config.with_stage_one_factor(factor.clone());
        }
        config.validate()?;
        Ok(config)
    }

    fn trainer_options(&self) -> Result<TrainerOptions> {
        Ok(TrainerOptions {
            train: self.train.clone(),
            test: self.test.clone(),
            output_dir: self.output_dir.clone(),
            max_len: self.max_len,
            reader: ReaderOptions {
                no_seg: self.no_seg,
                max_sentences: self.max_sentences,
            },
            config: self.training_config()?,
        })
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = cli.trainer_options().and_then(|options| run_training(&options));
    if let Err(e) = result {
        error!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
