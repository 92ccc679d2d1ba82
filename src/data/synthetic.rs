// ============================================================
// Layer 4 — Synthetic Data Source
// ============================================================
// Produces `count` identical samples whose every feature is
// `value`. A VAE trained on this learns to reproduce one point,
// which makes it a quick smoke test for the whole pipeline and
// gives a predictable curve in the training loss.

use anyhow::Result;

use crate::domain::sample::ImageSample;
use crate::domain::traits::DataSource;

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    count: usize,
    width: usize,
    value: f32,
}

impl SyntheticSource {
    pub fn new(count: usize, width: usize, value: f32) -> Self {
        Self { count, width, value }
    }
}

impl DataSource for SyntheticSource {
    fn load_all(&self) -> Result<Vec<ImageSample>> {
        let samples = (0..self.count)
            .map(|_| ImageSample::new(vec![self.value; self.width]))
            .collect();
        Ok(samples)
    }

    fn describe(&self) -> String {
        format!(
            "{} synthetic samples of width {} filled with {}",
            self.count, self.width, self.value
        )
    }
}
