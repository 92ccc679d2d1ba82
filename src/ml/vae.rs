// ============================================================
// Layer 5 — Variational Autoencoder
// ============================================================
// Couples one Encoder and one Decoder into the model trained by
// the trainer and used by the generate/encode commands.
//
// Forward pass (one call, fresh noise each time):
//
//   x ──► Encoder ──► (z, mu_z, logvar_z)
//                        │
//                        ▼
//                     Decoder ──► (xhat, mu_x, log σ_x)
//                        │
//                        ▼
//                   Loss engine ──► ElboResult { elbo, loss, ... }
//
// Networks are built from a serialisable VaeConfig by explicit
// factory calls, never at import time. The same config is saved
// next to each checkpoint so a trained model can be rebuilt.
//
// Reference: Burn Book §3 (Module derive)
//            Kingma & Welling (2014) Auto-Encoding Variational Bayes

use burn::{prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::domain::error::VaeError;
use crate::ml::{
    decoder::{Decoder, DEFAULT_SIGMA_X},
    distribution::{DecodeOutput, EncodeOutput},
    encoder::Encoder,
    loss::{elbo, ElboResult},
    networks::{
        Architecture, ConvDecoderConfig, ConvEncoderConfig, FeatureNet, GradSquaredNorm,
        MlpConfig,
    },
    noise::NoiseSource,
};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Everything needed to rebuild a model's architecture.
/// Fields that do not apply to the chosen architecture are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    pub architecture: Architecture,
    pub input_width:  usize,
    pub latent_dim:   usize,
    pub hidden_width: usize,
    pub image_size:   usize,
    pub channels:     usize,
    pub filters:      usize,
    pub sigma_x:      f64,
}

impl VaeConfig {
    /// Fully-connected encoder/decoder pair.
    pub fn mlp(input_width: usize, hidden_width: usize, latent_dim: usize) -> Self {
        Self {
            architecture: Architecture::Mlp,
            input_width,
            latent_dim,
            hidden_width,
            image_size:   0,
            channels:     0,
            filters:      0,
            sigma_x:      DEFAULT_SIGMA_X,
        }
    }

    /// Convolutional pair for square channel-last images.
    pub fn conv(image_size: usize, channels: usize, filters: usize, latent_dim: usize) -> Self {
        Self {
            architecture: Architecture::Conv,
            input_width:  image_size * image_size * channels,
            latent_dim,
            hidden_width: 0,
            image_size,
            channels,
            filters,
            sigma_x:      DEFAULT_SIGMA_X,
        }
    }

    pub fn with_sigma_x(mut self, sigma_x: f64) -> Self {
        self.sigma_x = sigma_x;
        self
    }

    pub fn validate(&self) -> Result<(), VaeError> {
        if self.latent_dim == 0 {
            return Err(VaeError::config("latent_dim must be at least 1"));
        }
        if self.input_width == 0 {
            return Err(VaeError::config("input width must be at least 1"));
        }
        if !self.sigma_x.is_finite() || self.sigma_x <= 0.0 {
            return Err(VaeError::config(format!(
                "sigma_x must be positive and finite, got {}",
                self.sigma_x
            )));
        }
        match self.architecture {
            Architecture::Mlp if self.hidden_width == 0 => {
                Err(VaeError::config("hidden_width must be at least 1"))
            }
            Architecture::Conv if self.filters == 0 || self.channels == 0 || self.image_size == 0 => {
                Err(VaeError::config("conv networks need image_size, channels and filters ≥ 1"))
            }
            Architecture::Conv if self.input_width != self.image_size * self.image_size * self.channels => {
                Err(VaeError::InputWidthMismatch {
                    expected: self.image_size * self.image_size * self.channels,
                    found:    self.input_width,
                })
            }
            _ => Ok(()),
        }
    }

    /// Build the (encoder, decoder) networks. The encoder emits
    /// 2 * latent_dim units; the decoder maps latent_dim back to input_width.
    pub fn build_networks<B: Backend>(&self, device: &B::Device) -> (FeatureNet<B>, FeatureNet<B>) {
        let raw_width = 2 * self.latent_dim;
        match self.architecture {
            Architecture::Mlp => (
                MlpConfig::new(self.input_width, self.hidden_width, raw_width).init(device).into(),
                MlpConfig::new(self.latent_dim, self.hidden_width, self.input_width).init(device).into(),
            ),
            Architecture::Conv => (
                ConvEncoderConfig::new(self.image_size, self.channels, self.filters, raw_width)
                    .init(device)
                    .into(),
                ConvDecoderConfig::new(self.latent_dim, self.image_size, self.channels, self.filters)
                    .init(device)
                    .into(),
            ),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Vae<B>, VaeError> {
        self.validate()?;
        let (encoder_net, decoder_net) = self.build_networks(device);
        let encoder = Encoder::with_latent_dim(encoder_net, self.latent_dim)?;
        let decoder = Decoder::new(decoder_net, self.sigma_x)?;
        Vae::new(encoder, decoder)
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Vae<B: Backend> {
    pub encoder: Encoder<B>,
    pub decoder: Decoder<B>,
}

/// Everything produced by one forward pass.
#[derive(Debug, Clone)]
pub struct VaeOutput<B: Backend> {
    pub encoded: EncodeOutput<B>,
    pub decoded: DecodeOutput<B>,
    pub elbo:    ElboResult<B>,
}

impl<B: Backend> Vae<B> {
    /// Pair an encoder with a decoder. The decoder must reproduce the
    /// encoder's input width and, when the latent width is already
    /// known, accept it.
    pub fn new(encoder: Encoder<B>, decoder: Decoder<B>) -> Result<Self, VaeError> {
        if decoder.output_width() != encoder.input_width() {
            return Err(VaeError::InputWidthMismatch {
                expected: encoder.input_width(),
                found:    decoder.output_width(),
            });
        }
        if let Some(latent_dim) = encoder.latent_dim() {
            if decoder.latent_width() != latent_dim {
                return Err(VaeError::InputWidthMismatch {
                    expected: decoder.latent_width(),
                    found:    latent_dim,
                });
            }
        }
        Ok(Self { encoder, decoder })
    }

    /// None until the encoder has seen input (or was built with one).
    pub fn latent_dim(&self) -> Option<usize> {
        self.encoder.latent_dim()
    }

    pub fn encode<N: NoiseSource>(
        &mut self,
        x:     Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<EncodeOutput<B>, VaeError> {
        self.encoder.encode(x, noise)
    }

    pub fn decode<N: NoiseSource>(
        &self,
        z:     Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<DecodeOutput<B>, VaeError> {
        self.decoder.decode(z, noise)
    }

    /// encode → decode → ELBO on one batch.
    pub fn forward<N: NoiseSource>(
        &mut self,
        x:     Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<VaeOutput<B>, VaeError> {
        let encoded = self.encode(x.clone(), noise)?;
        let decoded = self.decode(encoded.z.clone(), noise)?;
        let elbo    = elbo(x, &encoded.posterior, &decoded.reconstruction)?;
        Ok(VaeOutput { encoded, decoded, elbo })
    }

    /// One reparameterised latent sample per example.
    pub fn sample_posterior<N: NoiseSource>(
        &mut self,
        x:     Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<Tensor<B, 2>, VaeError> {
        Ok(self.encode(x, noise)?.z)
    }

    /// Posterior means, no noise.
    pub fn posterior_mean(&mut self, x: Tensor<B, 2>) -> Result<Tensor<B, 2>, VaeError> {
        Ok(self.encoder.posterior(x)?.mu_z)
    }

    /// Decode z and return either the noisy sample or the mean.
    pub fn reconstruct<N: NoiseSource>(
        &self,
        z:     Tensor<B, 2>,
        noisy: bool,
        noise: &mut N,
    ) -> Result<Tensor<B, 2>, VaeError> {
        Ok(self.decode(z, noise)?.select(noisy))
    }

    /// Decode `count` draws from the prior N(0, I).
    pub fn sample_from_prior<N: NoiseSource>(
        &self,
        count:  usize,
        device: &B::Device,
        noise:  &mut N,
    ) -> Result<DecodeOutput<B>, VaeError> {
        let latent_dim = self.latent_dim().ok_or(VaeError::LatentDimUnset)?;
        if count == 0 {
            return Err(VaeError::EmptyBatch);
        }
        let z = noise.standard_normal([count, latent_dim], device);
        self.decode(z, noise)
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Vae<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.encoder.grad_squared_norm(grads) + self.decoder.grad_squared_norm(grads)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{networks::FeatureTransform, noise::SeededNoise};
    use burn::{backend::NdArray, tensor::ElementConversion};

    type TestBackend = NdArray;

    #[test]
    fn test_round_trip_restores_flat_mnist_width() {
        let device    = Default::default();
        let mut model = VaeConfig::mlp(784, 32, 20).init::<TestBackend>(&device).unwrap();
        let mut noise = SeededNoise::new(1);

        let x       = Tensor::<TestBackend, 2>::ones([3, 784], &device).mul_scalar(0.5);
        let encoded = model.encode(x, &mut noise).unwrap();
        assert_eq!(encoded.z.dims(), [3, 20]);

        let decoded = model.decode(encoded.z, &mut noise).unwrap();
        assert_eq!(decoded.reconstruction.mu_x.dims(), [3, 784]);
    }

    #[test]
    fn test_conv_round_trip_restores_colour_width() {
        let device    = Default::default();
        let mut model = VaeConfig::conv(28, 3, 4, 6).init::<TestBackend>(&device).unwrap();
        let mut noise = SeededNoise::new(1);

        let out = model.forward(Tensor::zeros([2, 28 * 28 * 3], &device), &mut noise).unwrap();
        assert_eq!(out.encoded.z.dims(), [2, 6]);
        assert_eq!(out.decoded.xhat.dims(), [2, 28 * 28 * 3]);
    }

    #[test]
    fn test_same_seed_gives_identical_samples() {
        let device = Default::default();
        let model  = VaeConfig::mlp(10, 8, 3).init::<TestBackend>(&device).unwrap();
        let x      = Tensor::<TestBackend, 2>::ones([4, 10], &device);

        let run = |mut model: Vae<TestBackend>| {
            let mut noise = SeededNoise::new(99);
            let out = model.forward(x.clone(), &mut noise).unwrap();
            (
                out.encoded.z.into_data().to_vec::<f32>().unwrap(),
                out.decoded.xhat.into_data().to_vec::<f32>().unwrap(),
            )
        };

        assert_eq!(run(model.clone()), run(model));
    }

    #[test]
    fn test_loss_is_finite_for_finite_input() {
        let device    = Default::default();
        let mut model = VaeConfig::mlp(16, 8, 2).init::<TestBackend>(&device).unwrap();
        let mut noise = SeededNoise::new(5);

        let x   = Tensor::<TestBackend, 2>::random([8, 16], burn::tensor::Distribution::Default, &device);
        let out = model.forward(x, &mut noise).unwrap();
        let loss: f64 = out.elbo.loss.into_scalar().elem();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_posterior_mean_ignores_noise() {
        let device    = Default::default();
        let mut model = VaeConfig::mlp(6, 8, 2).init::<TestBackend>(&device).unwrap();
        let x         = Tensor::<TestBackend, 2>::ones([2, 6], &device);

        let a = model.posterior_mean(x.clone()).unwrap().into_data().to_vec::<f32>().unwrap();
        let b = model.posterior_mean(x).unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_from_prior_shapes() {
        let device    = Default::default();
        let model     = VaeConfig::mlp(12, 8, 3).init::<TestBackend>(&device).unwrap();
        let mut noise = SeededNoise::new(2);

        let out = model.sample_from_prior(5, &device, &mut noise).unwrap();
        assert_eq!(out.xhat.dims(), [5, 12]);
        assert_eq!(out.select(false).dims(), [5, 12]);
    }

    #[test]
    fn test_sample_from_prior_needs_latent_dim() {
        let device  = Default::default();
        let config  = VaeConfig::mlp(12, 8, 3);
        let (e, d)  = config.build_networks::<TestBackend>(&device);
        let model   = Vae::new(Encoder::new(e), Decoder::new(d, 0.75).unwrap()).unwrap();
        let mut noise = SeededNoise::new(2);

        let err = model.sample_from_prior(5, &device, &mut noise).unwrap_err();
        assert!(matches!(err, VaeError::LatentDimUnset));
    }

    #[test]
    fn test_mismatched_pair_is_rejected() {
        let device  = Default::default();
        let (e, _)  = VaeConfig::mlp(12, 8, 3).build_networks::<TestBackend>(&device);
        let (_, d)  = VaeConfig::mlp(10, 8, 3).build_networks::<TestBackend>(&device);
        assert_eq!(d.output_width(), 10);

        let err = Vae::new(Encoder::new(e), Decoder::new(d, 0.75).unwrap()).unwrap_err();
        assert!(matches!(err, VaeError::InputWidthMismatch { expected: 12, found: 10 }));
    }

    #[test]
    fn test_config_validation() {
        assert!(VaeConfig::mlp(4, 4, 0).validate().is_err());
        assert!(VaeConfig::mlp(4, 0, 2).validate().is_err());
        assert!(VaeConfig::mlp(4, 4, 2).with_sigma_x(0.0).validate().is_err());
        assert!(VaeConfig::conv(28, 3, 0, 50).validate().is_err());
        assert!(VaeConfig::conv(28, 3, 32, 50).validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = VaeConfig::conv(28, 3, 32, 50).with_sigma_x(0.5);
        let json   = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"conv\""));
        assert_eq!(serde_json::from_str::<VaeConfig>(&json).unwrap(), config);
    }
}
