// ============================================================
// Layer 5 — Decoder
// ============================================================
// Wraps a FeatureNet and models p(x|z) as an isotropic Gaussian
// with a fixed scale chosen at construction:
//
//   mu_x  = net(z)
//   xhat  = mu_x + eps * sigma_x
//
// log(sigma_x) is computed once and shared by every example and
// every call. The output width is whatever the network yields.

use burn::{prelude::*, tensor::backend::AutodiffBackend};

use crate::domain::error::VaeError;
use crate::ml::{
    distribution::{DecodeOutput, ReconstructionDistribution},
    networks::{FeatureNet, FeatureTransform, GradSquaredNorm},
    noise::NoiseSource,
};

/// Observation noise used when nothing else is configured.
pub const DEFAULT_SIGMA_X: f64 = 0.75;

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub net:     FeatureNet<B>,
    log_sigma_x: f64,
}

impl<B: Backend> Decoder<B> {
    pub fn new(net: FeatureNet<B>, sigma_x: f64) -> Result<Self, VaeError> {
        if !sigma_x.is_finite() || sigma_x <= 0.0 {
            return Err(VaeError::config(format!(
                "sigma_x must be positive and finite, got {sigma_x}"
            )));
        }
        Ok(Self { net, log_sigma_x: sigma_x.ln() })
    }

    pub fn log_sigma_x(&self) -> f64 { self.log_sigma_x }

    pub fn latent_width(&self) -> usize { self.net.input_width() }

    pub fn output_width(&self) -> usize { self.net.output_width() }

    /// p(x|z) parameters without drawing noise.
    pub fn reconstruction(&self, z: Tensor<B, 2>) -> Result<ReconstructionDistribution<B>, VaeError> {
        Ok(ReconstructionDistribution {
            mu_x:        self.net.forward(z)?,
            log_sigma_x: self.log_sigma_x,
        })
    }

    /// decode(z) → (xhat, mu_x, logsigma_x) with fresh noise.
    pub fn decode<N: NoiseSource>(
        &self,
        z:     Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<DecodeOutput<B>, VaeError> {
        let reconstruction = self.reconstruction(z)?;
        let xhat           = reconstruction.sample(noise);
        Ok(DecodeOutput { xhat, reconstruction })
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Decoder<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.net.grad_squared_norm(grads)
    }
}
