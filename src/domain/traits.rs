// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The trainer never cares where samples come from. Anything
// that can produce a list of fixed-width ImageSamples can feed
// it: an IDX file on disk, a synthetic generator, or a future
// loader for another format.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::ImageSample;

// ─── DataSource ───────────────────────────────────────────────────────────────
/// Any component that can load training samples.
///
/// Implementations:
///   - IdxLoader       → reads MNIST-style IDX files
///   - SyntheticSource → generates constant-valued samples
pub trait DataSource {
    /// Load every available sample from this source.
    fn load_all(&self) -> Result<Vec<ImageSample>>;

    /// Short human-readable description used in log lines.
    fn describe(&self) -> String;
}
