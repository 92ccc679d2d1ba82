// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration      (Layer 2)
//   Step 2: Load raw samples                (Layer 4 - data)
//   Step 3: Check widths and scale pixels   (Layer 4 - data)
//   Step 4: Build the Burn dataset          (Layer 4 - data)
//   Step 5: Save config and open metrics    (Layer 6 - infra)
//   Step 6: Run the training loop           (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ImageDataset,
    loader::IdxLoader,
    preprocessor::Preprocessor,
    synthetic::SyntheticSource,
};
use crate::domain::{
    error::VaeError,
    sample::DatasetKind,
    traits::DataSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    decoder::DEFAULT_SIGMA_X,
    networks::Architecture,
    trainer::{run_training, EpochSummary},
    vae::VaeConfig,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints as train_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset:         DatasetKind,
    /// IDX file for the mnist datasets; unused for synthetic data
    pub data_file:       Option<String>,
    pub checkpoint_dir:  String,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr:              f64,
    pub hidden_width:    usize,
    /// None picks the dataset default (20 for MLP, 50 for conv)
    pub latent_dim:      Option<usize>,
    pub filters:         usize,
    pub sigma_x:         f64,
    pub seed:            u64,
    pub synthetic_count: usize,
    pub synthetic_value: f32,
    pub synthetic_width: usize,
    pub quiet:           bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:         DatasetKind::MnistBw,
            data_file:       None,
            checkpoint_dir:  "checkpoints".to_string(),
            epochs:          50,
            batch_size:      256,
            lr:              1e-3,
            hidden_width:    400,
            latent_dim:      None,
            filters:         32,
            sigma_x:         DEFAULT_SIGMA_X,
            seed:            42,
            synthetic_count: 100,
            synthetic_value: 0.5,
            synthetic_width: 784,
            quiet:           false,
        }
    }
}

impl TrainConfig {
    /// Reject settings that would fail later in the run.
    pub fn validate(&self) -> Result<(), VaeError> {
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(VaeError::config(format!("lr must be positive and finite, got {}", self.lr)));
        }
        if self.epochs == 0 {
            return Err(VaeError::config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(VaeError::config("batch_size must be at least 1"));
        }
        if !self.sigma_x.is_finite() || self.sigma_x <= 0.0 {
            return Err(VaeError::config(format!(
                "sigma_x must be positive and finite, got {}",
                self.sigma_x
            )));
        }
        if self.latent_dim == Some(0) {
            return Err(VaeError::config("latent_dim must be at least 1"));
        }
        if self.dataset.reads_file() && self.data_file.is_none() {
            return Err(VaeError::config(format!("dataset '{}' needs --data-file", self.dataset)));
        }
        if self.dataset == DatasetKind::Synthetic && (self.synthetic_count == 0 || self.synthetic_width == 0) {
            return Err(VaeError::config("synthetic data needs a non-zero count and width"));
        }
        Ok(())
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim.unwrap_or_else(|| self.dataset.default_latent_dim())
    }

    /// Width every sample must have.
    pub fn expected_width(&self) -> usize {
        match self.dataset {
            DatasetKind::Synthetic => self.synthetic_width,
            kind                   => kind.image_width(),
        }
    }

    /// Architecture for samples of `input_width` features.
    pub fn vae_config(&self, input_width: usize) -> Result<VaeConfig, VaeError> {
        let cfg = match Architecture::for_dataset(self.dataset) {
            Architecture::Mlp => VaeConfig::mlp(input_width, self.hidden_width, self.latent_dim()),
            Architecture::Conv => {
                let expected = self.dataset.image_width();
                if input_width != expected {
                    return Err(VaeError::InputWidthMismatch { expected, found: input_width });
                }
                VaeConfig::conv(
                    self.dataset.image_size(),
                    self.dataset.channels(),
                    self.filters,
                    self.latent_dim(),
                )
            }
        }
        .with_sigma_x(self.sigma_x);

        cfg.validate()?;
        Ok(cfg)
    }

    /// The data source this configuration reads from.
    pub fn data_source(&self) -> Result<Box<dyn DataSource>, VaeError> {
        match (self.dataset, &self.data_file) {
            (DatasetKind::Synthetic, _) => Ok(Box::new(SyntheticSource::new(
                self.synthetic_count,
                self.synthetic_width,
                self.synthetic_value,
            ))),
            (_, Some(path)) => Ok(Box::new(IdxLoader::new(path))),
            (kind, None)    => Err(VaeError::config(format!("dataset '{kind}' needs --data-file"))),
        }
    }

    /// Synthetic values are used as given; IDX bytes are scaled into [0, 1].
    pub fn preprocessor(&self) -> Preprocessor {
        let base = if self.dataset.reads_file() {
            Preprocessor::pixels()
        } else {
            Preprocessor::identity()
        };
        base.with_expected_width(self.expected_width())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end and return
    /// the per-epoch summaries.
    pub fn execute(&self) -> Result<Vec<EpochSummary>> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Load raw samples ──────────────────────────────────────────
        let source = cfg.data_source()?;
        tracing::info!("Loading {}", source.describe());
        let raw = source.load_all()?;

        // ── Step 3: Validate widths / scale ───────────────────────────────────
        let samples = cfg
            .preprocessor()
            .transform(raw)
            .with_context(|| format!("Unusable samples from {}", source.describe()))?;

        // ── Step 4: Build the Burn dataset ────────────────────────────────────
        let dataset = ImageDataset::new(samples);
        tracing::info!(
            "Dataset '{}': {} samples of width {}",
            cfg.dataset,
            dataset.sample_count(),
            dataset.width()
        );

        // ── Step 5: Save config, open metrics log ─────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        let history = run_training(cfg, dataset, &ckpt_manager, &metrics)?;
        if let (Some(first), Some(last)) = (history.first(), history.last()) {
            tracing::info!(
                "Loss went from {:.4} (epoch {}) to {:.4} (epoch {})",
                first.loss, first.epoch, last.loss, last.epoch
            );
        }
        Ok(history)
    }
}
