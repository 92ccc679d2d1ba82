// ============================================================
// Layer 5 — Latent and Reconstruction Distributions
// ============================================================
// Plain carriers for the distribution parameters that flow
// between Encoder, Decoder and the loss engine. They are built
// fresh on every call, never mutated, and dropped once the step
// that produced them is finished.
//
//   q(z|x) = N(mu_z, diag(exp(logvar_z)))     LatentDistribution
//   p(x|z) = N(mu_x, sigma_x² I)              ReconstructionDistribution
//
// Sampling uses the reparameterisation trick:
//
//   z = mu + sigma * eps,   eps ~ N(0, I)
//
// eps carries no gradient; mu and sigma are ordinary tensor
// expressions, so backprop reaches the networks that made them.

use burn::prelude::*;

use crate::ml::noise::NoiseSource;

// ─── LatentDistribution ───────────────────────────────────────────────────────
/// Diagonal Gaussian approximate posterior, one row per example.
#[derive(Debug, Clone)]
pub struct LatentDistribution<B: Backend> {
    /// Means — shape: [batch, latent_dim]
    pub mu_z: Tensor<B, 2>,
    /// Log-variances — shape: [batch, latent_dim]
    pub logvar_z: Tensor<B, 2>,
}

impl<B: Backend> LatentDistribution<B> {
    /// Split raw encoder output [batch, 2 * latent_dim] into
    /// (first half → mu_z, second half → logvar_z).
    pub fn from_raw(raw: Tensor<B, 2>, latent_dim: usize) -> Self {
        let [batch, _] = raw.dims();
        let mu_z     = raw.clone().slice([0..batch, 0..latent_dim]);
        let logvar_z = raw.slice([0..batch, latent_dim..2 * latent_dim]);
        Self { mu_z, logvar_z }
    }

    pub fn latent_dim(&self) -> usize {
        self.mu_z.dims()[1]
    }

    /// sigma_z = exp(0.5 * logvar_z)
    pub fn std(&self) -> Tensor<B, 2> {
        self.logvar_z.clone().mul_scalar(0.5).exp()
    }

    /// z = mu_z + sigma_z * eps
    pub fn reparameterize(&self, eps: Tensor<B, 2>) -> Tensor<B, 2> {
        self.mu_z.clone() + self.std() * eps
    }

    /// Draw one z per example with fresh noise.
    pub fn sample<N: NoiseSource>(&self, noise: &mut N) -> Tensor<B, 2> {
        let eps = noise.standard_normal(self.mu_z.dims(), &self.mu_z.device());
        self.reparameterize(eps)
    }
}

// ─── ReconstructionDistribution ───────────────────────────────────────────────
/// Isotropic Gaussian likelihood with a fixed, shared scale.
#[derive(Debug, Clone)]
pub struct ReconstructionDistribution<B: Backend> {
    /// Means — shape: [batch, output_width]
    pub mu_x: Tensor<B, 2>,
    /// log(sigma_x), constant for the decoder's lifetime
    pub log_sigma_x: f64,
}

impl<B: Backend> ReconstructionDistribution<B> {
    pub fn sigma_x(&self) -> f64 {
        self.log_sigma_x.exp()
    }

    /// xhat = mu_x + eps * sigma_x
    pub fn sample<N: NoiseSource>(&self, noise: &mut N) -> Tensor<B, 2> {
        let eps = noise.standard_normal(self.mu_x.dims(), &self.mu_x.device());
        self.mu_x.clone() + eps.mul_scalar(self.sigma_x())
    }
}

// ─── Encoder / Decoder outputs ────────────────────────────────────────────────
/// (z, mu_z, logvar_z) from one encode call.
#[derive(Debug, Clone)]
pub struct EncodeOutput<B: Backend> {
    pub z:         Tensor<B, 2>,
    pub posterior: LatentDistribution<B>,
}

/// (xhat, mu_x, logsigma_x) from one decode call.
#[derive(Debug, Clone)]
pub struct DecodeOutput<B: Backend> {
    pub xhat:           Tensor<B, 2>,
    pub reconstruction: ReconstructionDistribution<B>,
}

impl<B: Backend> DecodeOutput<B> {
    /// Noisy sample when `noisy`, otherwise the mean reconstruction.
    pub fn select(self, noisy: bool) -> Tensor<B, 2> {
        if noisy { self.xhat } else { self.reconstruction.mu_x }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_split_takes_halves_in_order() {
        let device = Default::default();
        let raw    = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0, 4.0]], &device);
        let dist   = LatentDistribution::from_raw(raw, 2);

        assert_eq!(dist.latent_dim(), 2);
        assert_eq!(dist.mu_z.into_data().to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
        assert_eq!(dist.logvar_z.into_data().to_vec::<f32>().unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_reparameterize_is_affine_in_eps() {
        let device = Default::default();
        // logvar = ln 4 → sigma = 2
        let ln4  = 4.0f32.ln();
        let raw  = Tensor::<TestBackend, 2>::from_floats([[1.0, -1.0, ln4, ln4]], &device);
        let dist = LatentDistribution::from_raw(raw, 2);
        let eps  = Tensor::<TestBackend, 2>::from_floats([[0.5, -0.25]], &device);

        let z = dist.reparameterize(eps).into_data().to_vec::<f32>().unwrap();
        assert!((z[0] - 2.0).abs() < 1e-5);
        assert!((z[1] + 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_select_picks_mean_or_sample() {
        let device = Default::default();
        let out = DecodeOutput::<TestBackend> {
            xhat: Tensor::ones([1, 2], &device),
            reconstruction: ReconstructionDistribution {
                mu_x:        Tensor::zeros([1, 2], &device),
                log_sigma_x: 0.75f64.ln(),
            },
        };
        let mean = out.clone().select(false).into_data().to_vec::<f32>().unwrap();
        let noisy = out.select(true).into_data().to_vec::<f32>().unwrap();
        assert_eq!(mean, vec![0.0, 0.0]);
        assert_eq!(noisy, vec![1.0, 1.0]);
    }
}
