// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// system works with. No Burn types, no file I/O here.
//
//   sample.rs — ImageSample and DatasetKind
//   traits.rs — DataSource abstraction
//   error.rs  — VaeError, the typed failure taxonomy
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A single flattened training example
pub mod sample;

// Core abstractions (traits) that other layers implement
pub mod traits;

// Typed errors shared by the ML and data layers
pub mod error;
