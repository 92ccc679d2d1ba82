// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failures raised by the encoder, decoder, loss engine
// and trainer. They fall into three families:
//
//   Shape         — encoder output cannot be split, drifts from
//                   the latched latent width, or a batch has the
//                   wrong feature width
//   Numeric       — loss or gradients stopped being finite
//   Configuration — invalid noise scale, learning rate, sizes
//
// Shape and configuration errors are raised at call time.
// Numeric divergence is raised after the backward pass and the
// epoch loop wraps it with the offending epoch/batch.
//
// The application layer works with anyhow::Result, so every
// variant converts with `?` and can be recovered again with
// `err.downcast_ref::<VaeError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaeError {
    /// Encoder network emitted an odd number of units, so it
    /// cannot be split into equal mean / log-variance halves.
    #[error("encoder output width {width} is odd; expected 2 * latent_dim units")]
    OddEncoderWidth { width: usize },

    /// Encoder network output no longer matches the latched latent width.
    #[error("encoder output width {found} disagrees with latent_dim {latent_dim} (expected {})", 2 * latent_dim)]
    LatentWidthDrift { latent_dim: usize, found: usize },

    /// A batch reached a network with the wrong number of features.
    #[error("input width {found} does not match network input width {expected}")]
    InputWidthMismatch { expected: usize, found: usize },

    /// latent_dim was read before the encoder had seen any input.
    #[error("latent_dim is unknown until the encoder has been initialised")]
    LatentDimUnset,

    /// Loss or gradients contain NaN / Inf.
    #[error("non-finite {quantity} detected")]
    NumericDivergence { quantity: &'static str },

    /// A step failed inside the epoch loop; training stops here.
    #[error("training halted at epoch {epoch}, batch {batch}")]
    TrainingHalted {
        epoch: usize,
        batch: usize,
        #[source]
        source: Box<VaeError>,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("batch contains no examples")]
    EmptyBatch,
}

impl VaeError {
    pub fn config(msg: impl Into<String>) -> Self {
        VaeError::Configuration(msg.into())
    }

    /// True for every variant of the shape family.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            VaeError::OddEncoderWidth { .. }
                | VaeError::LatentWidthDrift { .. }
                | VaeError::InputWidthMismatch { .. }
                | VaeError::LatentDimUnset
        )
    }
}
