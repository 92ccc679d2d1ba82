// ============================================================
// Layer 4 — IDX File Loader
// ============================================================
// Reads MNIST-style IDX files from local disk. Downloading and
// caching are left to the user: point --data-file at a file
// that already exists.
//
// IDX layout (all integers big-endian):
//
//   byte 0..2   0x00 0x00
//   byte 2      element type   (0x08 = unsigned byte)
//   byte 3      number of dimensions N
//   N × u32     size of each dimension
//   payload     prod(sizes) elements, row-major
//
// The first dimension indexes samples; everything after it is
// flattened into one ImageSample. So a [60000, 28, 28] file
// gives 60000 samples of width 784, and a [N, 28, 28, 3]
// colour file gives samples of width 2352 with channels last.
//
// Label files are the 1-dimensional case: one byte per sample,
// read by load_labels for the encode command's label column.
//
// Pixels are returned as raw 0..255 floats. The Preprocessor
// is responsible for scaling.
//
// Reference: http://yann.lecun.com/exdb/mnist/ (file format)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::ImageSample;
use crate::domain::traits::DataSource;

/// Type code for unsigned byte payloads
const IDX_UNSIGNED_BYTE: u8 = 0x08;

/// Loads samples from a single IDX file.
/// Implements the DataSource trait from Layer 3.
pub struct IdxLoader {
    path: PathBuf,
}

impl IdxLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for IdxLoader {
    fn load_all(&self) -> Result<Vec<ImageSample>> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Cannot read IDX file '{}'", self.path.display()))?;

        let samples = parse_idx(&bytes)
            .with_context(|| format!("Malformed IDX file '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} samples of width {} from '{}'",
            samples.len(),
            samples.first().map(|s| s.width()).unwrap_or(0),
            self.path.display()
        );
        Ok(samples)
    }

    fn describe(&self) -> String {
        format!("IDX file '{}'", self.path.display())
    }
}

/// Check magic and element type, then return the dimension
/// sizes and the payload that follows the header.
fn split_header(bytes: &[u8]) -> Result<(Vec<usize>, &[u8])> {
    if bytes.len() < 4 {
        bail!("file is {} bytes, too short for an IDX header", bytes.len());
    }
    if bytes[0] != 0 || bytes[1] != 0 {
        bail!("bad magic number {:02x}{:02x}", bytes[0], bytes[1]);
    }
    if bytes[2] != IDX_UNSIGNED_BYTE {
        bail!("unsupported element type 0x{:02x} (only unsigned bytes)", bytes[2]);
    }

    let ndims      = bytes[3] as usize;
    let header_len = 4 + 4 * ndims;
    if bytes.len() < header_len {
        bail!("header declares {ndims} dimensions but the file ends early");
    }
    let dims: Vec<usize> = bytes[4..header_len]
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();

    Ok((dims, &bytes[header_len..]))
}

/// Parse an in-memory IDX buffer into flattened samples.
pub fn parse_idx(bytes: &[u8]) -> Result<Vec<ImageSample>> {
    let (dims, payload) = split_header(bytes)?;
    if dims.len() < 2 {
        bail!("expected at least 2 dimensions, found {}", dims.len());
    }

    let count: usize = dims[0];
    let width = match dims[1..].iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) {
        Some(width) => width,
        None        => bail!("dimension sizes {:?} overflow", dims),
    };

    let expected = count
        .checked_mul(width)
        .context("dimension sizes overflow")?;
    if payload.len() != expected {
        bail!(
            "payload has {} bytes but dimensions {:?} need {}",
            payload.len(),
            dims,
            expected
        );
    }
    if width == 0 {
        bail!("samples have zero width (dimensions {:?})", dims);
    }

    // ── Split payload into one sample per leading index ───────────────────────
    let samples = payload
        .chunks_exact(width)
        .map(|chunk| ImageSample::new(chunk.iter().map(|&b| b as f32).collect()))
        .collect();

    Ok(samples)
}

/// Parse a 1-dimensional IDX label file (one byte per example).
pub fn parse_idx_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    let (dims, payload) = split_header(bytes)?;
    if dims.len() != 1 {
        bail!("label files have 1 dimension, found {}", dims.len());
    }
    if payload.len() != dims[0] {
        bail!("payload has {} labels but the header declares {}", payload.len(), dims[0]);
    }
    Ok(payload.to_vec())
}

/// Read the labels that go with an image file, e.g. `t10k-labels-idx1-ubyte`.
pub fn load_labels(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read label file '{}'", path.display()))?;
    let labels = parse_idx_labels(&bytes)
        .with_context(|| format!("Malformed label file '{}'", path.display()))?;

    tracing::info!("Loaded {} labels from '{}'", labels.len(), path.display());
    Ok(labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn idx_bytes(dims: &[u32], payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, IDX_UNSIGNED_BYTE, dims.len() as u8];
        for d in dims {
            out.extend_from_slice(&d.to_be_bytes());
        }
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_parses_grey_images() {
        // 2 images of 2×2 pixels
        let bytes   = idx_bytes(&[2, 2, 2], &[0, 1, 2, 3, 252, 253, 254, 255]);
        let samples = parse_idx(&bytes).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].pixels, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(samples[1].pixels, vec![252.0, 253.0, 254.0, 255.0]);
    }

    #[test]
    fn test_flattens_colour_channels_last() {
        // 1 image, 1×2 pixels, 3 channels
        let bytes   = idx_bytes(&[1, 1, 2, 3], &[10, 20, 30, 40, 50, 60]);
        let samples = parse_idx(&bytes).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].width(), 6);
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let bytes = idx_bytes(&[2, 2, 2], &[0, 1, 2]);
        assert!(parse_idx(&bytes).is_err());
    }

    #[test]
    fn test_rejects_label_files() {
        // Label files are 1-dimensional and cannot be images
        let bytes = idx_bytes(&[3], &[1, 2, 3]);
        assert!(parse_idx(&bytes).is_err());
    }

    #[test]
    fn test_huge_dimensions_are_an_error_not_a_panic() {
        let bytes = idx_bytes(&[1, u32::MAX, u32::MAX, u32::MAX, 2], &[]);
        let err   = parse_idx(&bytes).unwrap_err();
        assert!(err.to_string().contains("overflow"), "{err}");
    }

    #[test]
    fn test_rejects_float_payloads() {
        let mut bytes = idx_bytes(&[1, 1, 1], &[0, 0, 0, 0]);
        bytes[2] = 0x0D;
        assert!(parse_idx(&bytes).is_err());
    }

    #[test]
    fn test_loader_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&idx_bytes(&[3, 2, 2], &[7u8; 12])).unwrap();

        let loader  = IdxLoader::new(file.path());
        let samples = loader.load_all().unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.pixels == vec![7.0; 4]));
    }

    #[test]
    fn test_parses_label_file() {
        let labels = parse_idx_labels(&idx_bytes(&[4], &[7, 2, 1, 0])).unwrap();
        assert_eq!(labels, vec![7, 2, 1, 0]);
    }

    #[test]
    fn test_label_parser_rejects_images_and_short_files() {
        assert!(parse_idx_labels(&idx_bytes(&[2, 2, 2], &[0; 8])).is_err());
        assert!(parse_idx_labels(&idx_bytes(&[5], &[1, 2, 3])).is_err());
    }

    #[test]
    fn test_load_labels_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&idx_bytes(&[3], &[9, 8, 7])).unwrap();
        assert_eq!(load_labels(file.path()).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = IdxLoader::new("/definitely/not/here.idx");
        assert!(loader.load_all().is_err());
    }
}
