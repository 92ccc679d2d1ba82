// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file I/O used by the ML and application layers:
//
//   checkpoint.rs — Saving and loading model weights with
//                   Burn's CompactRecorder, plus TrainConfig
//                   and VaeConfig as JSON so a trained model
//                   can be rebuilt.
//
//   metrics.rs    — Epoch-level loss / log-likelihood / KL
//                   appended to metrics.csv.
//
//   export.rs     — Generated images and latent codes as CSV
//                   for plotting elsewhere.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Row-per-example CSV export
pub mod export;
