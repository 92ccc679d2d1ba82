// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) — once per epoch
//   2. latest_epoch.json            — which epoch was last saved
//   3. train_config.json            — the run's TrainConfig
//   4. vae_config.json              — the architecture (VaeConfig)
//
// The generate/encode commands rebuild the model from
// vae_config.json and then load the latest weights into it.
// CompactRecorder refuses a record whose shapes do not match.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json
//     train_config.json
//     vae_config.json
//     metrics.csv            ← written by MetricsLogger
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::vae::{Vae, VaeConfig};

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const TRAIN_CONFIG_FILE: &str = "train_config.json";
const VAE_CONFIG_FILE:   &str = "vae_config.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory (like `mkdir -p`) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!(
                "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save model weights for a given epoch and point latest_epoch.json at it.
    /// Writes {dir}/model_epoch_{epoch}.mpk.gz (the recorder adds the extension).
    pub fn save_model<B: Backend>(&self, model: &Vae<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_json(LATEST_EPOCH_FILE, &epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`, which must have
    /// been built from the same VaeConfig.
    pub fn load_model<B: Backend>(&self, model: Vae<B>, device: &B::Device) -> Result<Vae<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(TRAIN_CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(TRAIN_CONFIG_FILE)
    }

    pub fn save_vae_config(&self, cfg: &VaeConfig) -> Result<()> {
        self.write_json(VAE_CONFIG_FILE, cfg)
    }

    /// Architecture of the trained model, needed to rebuild it before loading weights.
    pub fn load_vae_config(&self) -> Result<VaeConfig> {
        self.read_json(VAE_CONFIG_FILE)
    }

    /// Epoch number recorded in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json(LATEST_EPOCH_FILE)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Have you run 'train' first?", path.display())
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not valid JSON for this version", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::noise::SeededNoise;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_model_round_trip_through_disk() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let device  = Default::default();
        let config  = VaeConfig::mlp(6, 8, 2);

        let trained = config.init::<TestBackend>(&device).unwrap();
        manager.save_model(&trained, 3).unwrap();
        manager.save_vae_config(&config).unwrap();
        assert_eq!(manager.latest_epoch().unwrap(), 3);

        let rebuilt    = manager.load_vae_config().unwrap().init::<TestBackend>(&device).unwrap();
        let mut loaded = manager.load_model(rebuilt, &device).unwrap();
        assert_eq!(loaded.latent_dim(), Some(2));

        let x = Tensor::<TestBackend, 2>::ones([1, 6], &device);
        let a = trained.clone().posterior_mean(x.clone()).unwrap().into_data().to_vec::<f32>().unwrap();
        let b = loaded.posterior_mean(x).unwrap().into_data().to_vec::<f32>().unwrap();

        // CompactRecorder stores half precision
        for (u, v) in a.iter().zip(&b) {
            assert!((u - v).abs() < 1e-2 * (1.0 + u.abs()), "{u} vs {v}");
        }

        // Loaded model still decodes
        let out = loaded.sample_from_prior(2, &device, &mut SeededNoise::new(0)).unwrap();
        assert_eq!(out.xhat.dims(), [2, 6]);
    }

    #[test]
    fn test_train_config_round_trip() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let cfg     = TrainConfig { epochs: 7, ..TrainConfig::default() };

        manager.save_config(&cfg).unwrap();
        assert_eq!(manager.load_config().unwrap().epochs, 7);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.latest_epoch().is_err());
        assert!(manager.load_vae_config().is_err());
        assert!(CheckpointManager::open(dir.path().join("nope")).is_err());
    }
}
