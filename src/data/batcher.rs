// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ImageSample>
// into one [batch_size, width] float tensor.
//
// How batching works here:
//   Input:  Vec of N ImageSamples, each with W features
//   Output: ImageBatch with a tensor of shape [N, W]
//
//   All pixels are flattened into one long Vec, then reshaped:
//   [s1_p1, s1_p2, ..., s1_pW, s2_p1, ..., sN_pW] → [N, W]
//
// The Preprocessor already guarantees every sample has the
// same width, so no padding is needed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::ImageSample;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
/// A batch of flattened images ready for the encoder.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Pixel values — shape: [batch_size, width]
    pub images: Tensor<B, 2>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ImageSample, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> ImageBatch<B> {
        ImageBatch { images: stack_samples(&items, &self.device) }
    }
}

/// Stack samples row by row into a [N, W] tensor.
/// An empty slice gives a [0, 0] tensor.
pub fn stack_samples<B: Backend>(items: &[ImageSample], device: &B::Device) -> Tensor<B, 2> {
    let batch_size = items.len();
    let width      = items.first().map(ImageSample::width).unwrap_or(0);

    let flat: Vec<f32> = items
        .iter()
        .flat_map(|s| s.pixels.iter().copied())
        .collect();

    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([batch_size, width])
}
