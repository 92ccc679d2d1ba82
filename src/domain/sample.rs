// ============================================================
// Layer 3 — Image Sample Domain Type
// ============================================================
// One training example: a flat vector of pixel intensities.
// Images are always flattened row-major with channels last,
// so a 28×28 grey image is 784 values and a 28×28 RGB image
// is 2352 values. Networks that need spatial structure
// (the convolutional encoder) reshape it back themselves.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A single flattened image (or any fixed-width vector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
}

impl ImageSample {
    pub fn new(pixels: Vec<f32>) -> Self {
        Self { pixels }
    }

    /// Number of features in this sample
    pub fn width(&self) -> usize {
        self.pixels.len()
    }
}

// ─── DatasetKind ──────────────────────────────────────────────────────────────
/// The datasets the trainer knows how to build networks for.
///
///   MnistBw    → 28×28 grey images, MLP encoder/decoder
///   MnistColor → 28×28×3 colour images, convolutional encoder/decoder
///   Synthetic  → constant-valued vectors, MLP encoder/decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    MnistBw,
    MnistColor,
    Synthetic,
}

impl DatasetKind {
    /// Height/width of the square images in this dataset.
    pub fn image_size(&self) -> usize {
        28
    }

    /// Colour channels per pixel.
    pub fn channels(&self) -> usize {
        match self {
            DatasetKind::MnistColor => 3,
            DatasetKind::MnistBw | DatasetKind::Synthetic => 1,
        }
    }

    /// Flattened width of one image.
    pub fn image_width(&self) -> usize {
        self.image_size() * self.image_size() * self.channels()
    }

    /// Default latent width used when none is configured
    pub fn default_latent_dim(&self) -> usize {
        match self {
            DatasetKind::MnistColor => 50,
            DatasetKind::MnistBw | DatasetKind::Synthetic => 20,
        }
    }

    /// Whether samples come from a file on disk.
    pub fn reads_file(&self) -> bool {
        !matches!(self, DatasetKind::Synthetic)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::MnistBw    => "mnist-bw",
            DatasetKind::MnistColor => "mnist-color",
            DatasetKind::Synthetic  => "synthetic",
        };
        f.write_str(name)
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "mnist-bw"    => Ok(DatasetKind::MnistBw),
            "mnist-color" => Ok(DatasetKind::MnistColor),
            "synthetic"   => Ok(DatasetKind::Synthetic),
            other => Err(format!(
                "unknown dataset '{other}' (expected mnist-bw, mnist-color or synthetic)"
            )),
        }
    }
}
