// ============================================================
// Layer 4 — Image Dataset
// ============================================================
// Burn's DataLoader only needs get(index) and len(). The whole
// preprocessed dataset is held in memory; the loader clones one
// sample at a time into the batcher.
//
// Reference: Burn Book §4 (Dataset trait)

use burn::data::dataset::Dataset;

use crate::domain::sample::ImageSample;

/// In-memory collection of preprocessed samples.
pub struct ImageDataset {
    samples: Vec<ImageSample>,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Feature width shared by every sample (0 when empty)
    pub fn width(&self) -> usize {
        self.samples.first().map(ImageSample::width).unwrap_or(0)
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
