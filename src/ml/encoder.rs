// ============================================================
// Layer 5 — Encoder
// ============================================================
// Wraps a FeatureNet and turns its raw output into the
// approximate posterior q(z|x) plus one reparameterised sample.
//
//   raw       = net(x)                  [N, 2 * latent_dim]
//   mu_z      = raw[:, ..latent_dim]
//   logvar_z  = raw[:, latent_dim..]
//   z         = mu_z + exp(0.5 * logvar_z) * eps
//
// latent_dim is either given at construction (`with_latent_dim`)
// or latched from the first raw output (`new` + `initialize` or
// the first `encode`). Once known it never changes:
//   - odd raw width        → OddEncoderWidth (never truncated)
//   - raw width ≠ 2 × dim  → LatentWidthDrift
// There is no setter. The latch is a module constant, so it is
// carried through optimiser steps and checkpoint loads untouched.

use burn::{module::Ignored, prelude::*, tensor::backend::AutodiffBackend};

use crate::domain::error::VaeError;
use crate::ml::{
    distribution::{EncodeOutput, LatentDistribution},
    networks::{FeatureNet, FeatureTransform, GradSquaredNorm},
    noise::NoiseSource,
};

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub net:    FeatureNet<B>,
    latent_dim: Ignored<Option<usize>>,
}

impl<B: Backend> Encoder<B> {
    /// Encoder whose latent width is learned from its first input.
    pub fn new(net: FeatureNet<B>) -> Self {
        Self { net, latent_dim: Ignored(None) }
    }

    /// Encoder with an explicit latent width. The network must emit
    /// exactly `2 * latent_dim` units.
    pub fn with_latent_dim(net: FeatureNet<B>, latent_dim: usize) -> Result<Self, VaeError> {
        if latent_dim == 0 {
            return Err(VaeError::config("latent_dim must be at least 1"));
        }
        let width = net.output_width();
        if width % 2 != 0 {
            return Err(VaeError::OddEncoderWidth { width });
        }
        if width != 2 * latent_dim {
            return Err(VaeError::LatentWidthDrift { latent_dim, found: width });
        }
        Ok(Self { net, latent_dim: Ignored(Some(latent_dim)) })
    }

    /// None until the latent width is known.
    pub fn latent_dim(&self) -> Option<usize> {
        self.latent_dim.0
    }

    pub fn input_width(&self) -> usize {
        self.net.input_width()
    }

    /// Run one trial batch through the network and return the
    /// latent width it implies (latching it if still unknown).
    pub fn initialize(&mut self, sample: Tensor<B, 2>) -> Result<usize, VaeError> {
        self.posterior(sample).map(|dist| dist.latent_dim())
    }

    /// Deterministic part of encoding: q(z|x) parameters only.
    pub fn posterior(&mut self, input: Tensor<B, 2>) -> Result<LatentDistribution<B>, VaeError> {
        let raw        = self.net.forward(input)?;
        let latent_dim = self.latch(raw.dims()[1])?;
        Ok(LatentDistribution::from_raw(raw, latent_dim))
    }

    /// encode(x) → (z, mu_z, logvar_z) with fresh noise.
    pub fn encode<N: NoiseSource>(
        &mut self,
        input: Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<EncodeOutput<B>, VaeError> {
        let posterior = self.posterior(input)?;
        let z         = posterior.sample(noise);
        Ok(EncodeOutput { z, posterior })
    }

    fn latch(&mut self, width: usize) -> Result<usize, VaeError> {
        if width % 2 != 0 {
            return Err(VaeError::OddEncoderWidth { width });
        }
        let found = width / 2;
        match self.latent_dim.0 {
            Some(latent_dim) if latent_dim != found => {
                Err(VaeError::LatentWidthDrift { latent_dim, found: width })
            }
            Some(latent_dim) => Ok(latent_dim),
            None if found == 0 => Err(VaeError::config("encoder network produced no output units")),
            None => {
                tracing::debug!("Encoder latent_dim latched at {}", found);
                self.latent_dim = Ignored(Some(found));
                Ok(found)
            }
        }
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Encoder<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.net.grad_squared_norm(grads)
    }
}
