// ============================================================
// Layer 4 — Sample Preprocessor
// ============================================================
// Normalises raw samples before they become tensors.
//
// Steps (applied in order):
//   1. Reject an empty dataset
//   2. Check every sample has the same width (and the width the
//      chosen network expects, when one is given)
//   3. Multiply every feature by `scale`
//
// IDX files hold bytes 0..255, so they use `Preprocessor::pixels()`
// which scales into [0, 1]. Synthetic data is already in range
// and uses `Preprocessor::identity()`.

use crate::domain::error::VaeError;
use crate::domain::sample::ImageSample;

/// Scale factor mapping byte intensities into [0, 1]
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

#[derive(Debug, Clone)]
pub struct Preprocessor {
    scale:          f32,
    expected_width: Option<usize>,
}

impl Preprocessor {
    pub fn new(scale: f32) -> Self {
        Self { scale, expected_width: None }
    }

    /// For raw 0..255 pixel data
    pub fn pixels() -> Self {
        Self::new(PIXEL_SCALE)
    }

    /// Leaves values unchanged, still validates widths
    pub fn identity() -> Self {
        Self::new(1.0)
    }

    /// Require every sample to have exactly `width` features.
    pub fn with_expected_width(mut self, width: usize) -> Self {
        self.expected_width = Some(width);
        self
    }

    /// Validate and rescale samples. Consumes the input Vec and
    /// returns it modified in place.
    pub fn transform(&self, mut samples: Vec<ImageSample>) -> Result<Vec<ImageSample>, VaeError> {
        let first = samples
            .first()
            .ok_or_else(|| VaeError::config("dataset contains no samples"))?;

        let width = self.expected_width.unwrap_or(first.width());
        if let Some(bad) = samples.iter().find(|s| s.width() != width) {
            return Err(VaeError::InputWidthMismatch { expected: width, found: bad.width() });
        }

        if self.scale != 1.0 {
            for sample in samples.iter_mut() {
                sample.pixels.iter_mut().for_each(|p| *p *= self.scale);
            }
        }

        tracing::debug!("Preprocessed {} samples of width {}", samples.len(), width);
        Ok(samples)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::identity()
    }
}
