// ============================================================
// Layer 2 — Generate / Encode Use Case
// ============================================================
// Loads a trained model and runs it without gradients:
//
//   generate --source prior      z ~ N(0, I)      → decode
//   generate --source posterior  z ~ q(z|x), x ∈ F → decode
//   encode                       x ∈ F            → z or mu_z
//                                  (+ labels from a matching IDX label file)
//
// Decoded rows are either noisy samples (xhat) or means (mu_x).
// Results come back as flat row-major Vec<f32> so the CLI can
// hand them to the CSV exporter.
//
//   Step 1: Read vae_config.json          (Layer 6 - infra)
//   Step 2: Rebuild the model             (Layer 5 - ml)
//   Step 3: Load the latest weights       (Layer 6 - infra)

use anyhow::{bail, Context, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::data::{batcher::stack_samples, loader::{load_labels, IdxLoader}, preprocessor::Preprocessor};
use crate::domain::{error::VaeError, sample::ImageSample, traits::DataSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    noise::Noise,
    trainer::MyInnerBackend,
    vae::{Vae, VaeConfig},
};

/// Examples pushed through the model at once.
const CHUNK_SIZE: usize = 1024;

/// Where the latent codes for generation come from.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateSource {
    Prior { count: usize },
    Posterior { data_file: PathBuf },
}

/// Output of `encode`: flat latent rows plus optional per-row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentCodes {
    pub values: Vec<f32>,
    pub labels: Option<Vec<u8>>,
}

pub struct GenerateUseCase {
    model:  Vae<MyInnerBackend>,
    config: VaeConfig,
    device: <MyInnerBackend as Backend>::Device,
    noise:  Noise,
}

impl GenerateUseCase {
    /// Rebuild the trained model from `checkpoint_dir`. Without a
    /// seed the noise comes from the backend RNG.
    pub fn from_checkpoint(checkpoint_dir: impl Into<PathBuf>, seed: Option<u64>) -> Result<Self> {
        let ckpt   = CheckpointManager::open(checkpoint_dir)?;
        let config = ckpt.load_vae_config()?;
        let device = <MyInnerBackend as Backend>::Device::default();

        let model = config
            .init::<MyInnerBackend>(&device)
            .with_context(|| format!("Bad vae_config.json in '{}'", ckpt.dir().display()))?;
        let model = ckpt.load_model(model, &device)?;

        let noise = Noise::from_seed(seed);

        tracing::info!(
            "Loaded {:?} VAE: input width {}, latent_dim {}",
            config.architecture, config.input_width, config.latent_dim
        );
        Ok(Self { model, config, device, noise })
    }

    /// Features per generated row.
    pub fn output_width(&self) -> usize {
        self.config.input_width
    }

    pub fn latent_dim(&self) -> Result<usize> {
        Ok(self.model.latent_dim().ok_or(VaeError::LatentDimUnset)?)
    }

    /// Decoded rows, `output_width()` values each.
    pub fn generate(&mut self, source: &GenerateSource, noisy: bool) -> Result<Vec<f32>> {
        match source {
            GenerateSource::Prior { count } => {
                if *count == 0 {
                    return Err(VaeError::EmptyBatch.into());
                }
                let mut out       = Vec::with_capacity(count * self.output_width());
                let mut remaining = *count;
                while remaining > 0 {
                    let n       = remaining.min(CHUNK_SIZE);
                    let decoded = self.model.sample_from_prior(n, &self.device, &mut self.noise)?;
                    out.extend(to_vec(decoded.select(noisy))?);
                    remaining -= n;
                }
                Ok(out)
            }
            GenerateSource::Posterior { data_file } => {
                let samples = self.load_samples(data_file)?;
                let mut out = Vec::with_capacity(samples.len() * self.output_width());
                for chunk in samples.chunks(CHUNK_SIZE) {
                    let x = stack_samples::<MyInnerBackend>(chunk, &self.device);
                    let z = self.model.sample_posterior(x, &mut self.noise)?;
                    out.extend(to_vec(self.model.reconstruct(z, noisy, &mut self.noise)?)?);
                }
                Ok(out)
            }
        }
    }

    /// Latent rows, `latent_dim()` values each: sampled z when
    /// `noisy`, posterior means otherwise. A label file must hold
    /// exactly one label per image.
    pub fn encode(
        &mut self,
        data_file: &Path,
        labels_file: Option<&Path>,
        noisy: bool,
    ) -> Result<LatentCodes> {
        let samples = self.load_samples(data_file)?;
        let labels  = labels_file.map(load_labels).transpose()?;
        if let Some(labels) = &labels {
            if labels.len() != samples.len() {
                bail!(
                    "{} labels for {} images; label and data files must match",
                    labels.len(),
                    samples.len()
                );
            }
        }

        let mut out = Vec::new();
        for chunk in samples.chunks(CHUNK_SIZE) {
            let x = stack_samples::<MyInnerBackend>(chunk, &self.device);
            let z = if noisy {
                self.model.sample_posterior(x, &mut self.noise)?
            } else {
                self.model.posterior_mean(x)?
            };
            out.extend(to_vec(z)?);
        }
        Ok(LatentCodes { values: out, labels })
    }

    fn load_samples(&self, data_file: &Path) -> Result<Vec<ImageSample>> {
        let loader = IdxLoader::new(data_file);
        let raw    = loader.load_all()?;
        let samples = Preprocessor::pixels()
            .with_expected_width(self.output_width())
            .transform(raw)
            .with_context(|| format!("{} does not fit this model", loader.describe()))?;
        Ok(samples)
    }
}

fn to_vec(t: Tensor<MyInnerBackend, 2>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor values: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};
    use crate::domain::sample::DatasetKind;
    use std::io::Write;

    fn trained_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            dataset:         DatasetKind::Synthetic,
            checkpoint_dir:  dir.path().display().to_string(),
            epochs:          1,
            batch_size:      4,
            hidden_width:    8,
            latent_dim:      Some(2),
            synthetic_count: 8,
            synthetic_width: 6,
            quiet:           true,
            ..TrainConfig::default()
        };
        TrainUseCase::new(cfg).execute().unwrap();
        dir
    }

    fn label_file(labels: &[u8]) -> tempfile::NamedTempFile {
        let mut bytes = vec![0u8, 0, 0x08, 1];
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file
    }

    fn idx_file(count: u32) -> tempfile::NamedTempFile {
        let mut bytes = vec![0u8, 0, 0x08, 3];
        for d in [count, 2, 3] {
            bytes.extend_from_slice(&d.to_be_bytes());
        }
        bytes.extend(std::iter::repeat(128u8).take(count as usize * 6));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file
    }

    #[test]
    fn test_prior_generation_row_count() {
        let dir     = trained_dir();
        let mut app = GenerateUseCase::from_checkpoint(dir.path(), Some(1)).unwrap();

        let rows = app.generate(&GenerateSource::Prior { count: 3 }, false).unwrap();
        assert_eq!(rows.len(), 3 * 6);
        assert!(app.generate(&GenerateSource::Prior { count: 0 }, false).is_err());
    }

    #[test]
    fn test_posterior_generation_and_encoding() {
        let dir     = trained_dir();
        let file    = idx_file(5);
        let mut app = GenerateUseCase::from_checkpoint(dir.path(), Some(1)).unwrap();

        let source = GenerateSource::Posterior { data_file: file.path().to_path_buf() };
        assert_eq!(app.generate(&source, true).unwrap().len(), 5 * 6);

        let means = app.encode(file.path(), None, false).unwrap();
        assert_eq!(means.values.len(), 5 * app.latent_dim().unwrap());
        assert!(means.labels.is_none());

        // Means are deterministic
        assert_eq!(app.encode(file.path(), None, false).unwrap(), means);
    }

    #[test]
    fn test_encode_carries_labels() {
        let dir     = trained_dir();
        let file    = idx_file(3);
        let labels  = label_file(&[4, 0, 9]);
        let mut app = GenerateUseCase::from_checkpoint(dir.path(), Some(1)).unwrap();

        let codes = app.encode(file.path(), Some(labels.path()), true).unwrap();
        assert_eq!(codes.labels, Some(vec![4, 0, 9]));
        assert_eq!(codes.values.len(), 3 * app.latent_dim().unwrap());
    }

    #[test]
    fn test_label_count_must_match_sample_count() {
        let dir     = trained_dir();
        let file    = idx_file(5);
        let labels  = label_file(&[1, 2, 3, 4]);
        let mut app = GenerateUseCase::from_checkpoint(dir.path(), Some(1)).unwrap();

        let err = app.encode(file.path(), Some(labels.path()), false).unwrap_err();
        assert!(err.to_string().contains("4 labels for 5 images"), "{err}");
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GenerateUseCase::from_checkpoint(dir.path(), None).is_err());
    }
}
