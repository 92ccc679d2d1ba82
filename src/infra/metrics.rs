// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch (means over all batches):
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - loss:           −ELBO
//   - log_likelihood: reconstruction term log p(x|z)
//   - kl:             KL(q(z|x) || N(0, I))
//
// Output file: checkpoints/metrics.csv
//
//   epoch,loss,log_likelihood,kl
//   1,812.402100,-801.220300,11.181800
//   2,640.117400,-627.904000,12.213400
//   ...
//
// Reading the curve: loss should fall. A KL that collapses to
// zero means the decoder is ignoring the latent code.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::ml::trainer::EpochSummary;

const HEADER: &str = "epoch,loss,log_likelihood,kl";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub loss:           f64,
    pub log_likelihood: f64,
    pub kl:             f64,
}

impl From<&EpochSummary> for EpochMetrics {
    fn from(s: &EpochSummary) -> Self {
        Self {
            epoch:          s.epoch,
            loss:           s.loss,
            log_likelihood: s.log_likelihood,
            kl:             s.kl,
        }
    }
}

/// Appends epoch metrics to `metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet,
    /// so repeated runs append to one log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6},{:.6}", m.epoch, m.loss, m.log_likelihood, m.kl)?;

        tracing::debug!("Logged epoch {} metrics: loss={:.4}, kl={:.4}", m.epoch, m.loss, m.kl);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(epoch: usize, loss: f64) -> EpochMetrics {
        EpochMetrics { epoch, loss, log_likelihood: -loss + 1.0, kl: 1.0 }
    }

    #[test]
    fn test_rows_are_appended_after_header() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&metrics(1, 5.0)).unwrap();
        logger.log(&metrics(2, 4.5)).unwrap();

        // A second logger on the same directory keeps the old rows
        MetricsLogger::new(dir.path()).unwrap().log(&metrics(3, 4.0)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "1,5.000000,-4.000000,1.000000");
        assert!(lines[3].starts_with("3,4.000000"));
    }

    #[test]
    fn test_from_epoch_summary() {
        let summary = EpochSummary { epoch: 4, loss: 1.5, log_likelihood: -1.0, kl: 0.5, batches: 3 };
        let m = EpochMetrics::from(&summary);
        assert_eq!(m, EpochMetrics { epoch: 4, loss: 1.5, log_likelihood: -1.0, kl: 0.5 });
    }
}
