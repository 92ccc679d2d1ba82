// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a file on disk (or a generator) to tensor
// batches the trainer can consume.
//
//   IDX file / synthetic generator
//       │
//       ▼
//   IdxLoader / SyntheticSource  → raw ImageSamples
//       │
//       ▼
//   Preprocessor                 → validated, scaled samples
//       │
//       ▼
//   ImageDataset                 → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher                 → stacks samples into [N, W] tensors
//       │
//       ▼
//   DataLoader                   → shuffled batches for each epoch
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads MNIST-style IDX files from disk
pub mod loader;

/// Constant-valued samples for smoke tests and demos
pub mod synthetic;

/// Validates sample widths and rescales pixel values
pub mod preprocessor;

/// Implements Burn's Dataset trait for image samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
