// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `generate` and `encode`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::domain::sample::DatasetKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a VAE and checkpoint it after every epoch
    Train(TrainArgs),

    /// Decode samples from a trained checkpoint
    Generate(GenerateArgs),

    /// Write latent codes for every image in a file
    Encode(EncodeArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// mnist-bw, mnist-color or synthetic
    #[arg(long, default_value = "mnist-bw")]
    pub dataset: DatasetKind,

    /// IDX image file (required for the mnist datasets)
    #[arg(long)]
    pub data_file: Option<String>,

    /// Directory for checkpoints, configs and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Hidden layer width of the MLP networks
    #[arg(long, default_value_t = 400)]
    pub hidden_width: usize,

    /// Latent width; defaults to 20 (MLP) or 50 (conv)
    #[arg(long)]
    pub latent_dim: Option<usize>,

    /// Filters in the first conv layer (doubled per layer)
    #[arg(long, default_value_t = 32)]
    pub filters: usize,

    /// Fixed observation noise of the decoder
    #[arg(long, default_value_t = 0.75)]
    pub sigma_x: f64,

    /// Seed for weights, shuffling and sampling noise
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 100)]
    pub synthetic_count: usize,

    #[arg(long, default_value_t = 0.5)]
    pub synthetic_value: f32,

    #[arg(long, default_value_t = 784)]
    pub synthetic_width: usize,

    /// Do not print per-epoch progress
    #[arg(long, short)]
    pub quiet: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:         a.dataset,
            data_file:       a.data_file,
            checkpoint_dir:  a.checkpoint_dir,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            lr:              a.lr,
            hidden_width:    a.hidden_width,
            latent_dim:      a.latent_dim,
            filters:         a.filters,
            sigma_x:         a.sigma_x,
            seed:            a.seed,
            synthetic_count: a.synthetic_count,
            synthetic_value: a.synthetic_value,
            synthetic_width: a.synthetic_width,
            quiet:           a.quiet,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// z drawn from N(0, I)
    Prior,
    /// z drawn from q(z|x) for images in --data-file
    Posterior,
}

/// All arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long, value_enum, default_value = "prior")]
    pub source: Source,

    /// Number of prior samples
    #[arg(long, default_value_t = 16)]
    pub count: usize,

    /// IDX image file (for --source posterior)
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Output noisy samples instead of decoder means
    #[arg(long)]
    pub noisy: bool,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, default_value = "generated.csv")]
    pub output: PathBuf,

    /// Fix the sampling noise; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,
}

/// All arguments for the `encode` command
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// IDX image file to encode
    #[arg(long)]
    pub data_file: PathBuf,

    /// IDX label file; adds a `label` column to the output
    #[arg(long)]
    pub labels_file: Option<PathBuf>,

    /// Write sampled z instead of posterior means
    #[arg(long)]
    pub noisy: bool,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, default_value = "latent.csv")]
    pub output: PathBuf,

    #[arg(long)]
    pub seed: Option<u64>,
}
