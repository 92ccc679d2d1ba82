// ============================================================
// Layer 5 — Noise Sources
// ============================================================
// Every encode/decode call draws fresh standard-normal noise.
// Where that noise comes from is injected by the caller:
//
//   SeededNoise   — owns a StdRng; same seed gives bit-identical
//                   draws, independent of the tensor backend and
//                   of other threads. Used for training and tests.
//   BackendNoise  — Burn's process-wide backend RNG
//                   (Tensor::random), seeded via Backend::seed.
//                   Used by generate/encode when no --seed is given.
//   Noise         — either of the above, picked at runtime.
//
// Reference: rand / rand_distr crate documentation

use burn::{
    prelude::*,
    tensor::{Distribution, TensorData},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Produces tensors of independent N(0, 1) draws.
pub trait NoiseSource {
    fn standard_normal<B: Backend, const D: usize>(
        &mut self,
        shape:  [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D>;
}

// ─── SeededNoise ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl NoiseSource for SeededNoise {
    fn standard_normal<B: Backend, const D: usize>(
        &mut self,
        shape:  [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        let count: usize = shape.iter().product();
        let values: Vec<f32> = (0..count)
            .map(|_| self.rng.sample::<f32, _>(StandardNormal))
            .collect();
        Tensor::from_data(TensorData::new(values, shape), device)
    }
}

// ─── BackendNoise ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendNoise;

impl NoiseSource for BackendNoise {
    fn standard_normal<B: Backend, const D: usize>(
        &mut self,
        shape:  [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        Tensor::random(shape, Distribution::Normal(0.0, 1.0), device)
    }
}

// ─── Noise ────────────────────────────────────────────────────────────────────
/// Runtime choice between a private seeded stream and the backend RNG.
#[derive(Debug, Clone)]
pub enum Noise {
    Seeded(SeededNoise),
    Backend(BackendNoise),
}

impl Noise {
    /// Seeded when `seed` is given, otherwise the backend RNG.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Noise::Seeded(SeededNoise::new(seed)),
            None       => Noise::Backend(BackendNoise),
        }
    }
}

impl NoiseSource for Noise {
    fn standard_normal<B: Backend, const D: usize>(
        &mut self,
        shape:  [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        match self {
            Noise::Seeded(noise)  => noise.standard_normal(shape, device),
            Noise::Backend(noise) => noise.standard_normal(shape, device),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn draw(noise: &mut impl NoiseSource) -> Vec<f32> {
        noise
            .standard_normal::<TestBackend, 2>([4, 3], &Default::default())
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_same_seed_same_draws() {
        assert_eq!(draw(&mut SeededNoise::new(7)), draw(&mut SeededNoise::new(7)));
    }

    #[test]
    fn test_consecutive_draws_differ() {
        let mut noise = SeededNoise::new(7);
        assert_ne!(draw(&mut noise), draw(&mut noise));
    }

    #[test]
    fn test_draws_look_standard_normal() {
        let mut noise = SeededNoise::new(11);
        let values = noise
            .standard_normal::<TestBackend, 1>([20_000], &Default::default())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let n    = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var  = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn test_backend_noise_has_requested_shape() {
        let t = BackendNoise.standard_normal::<TestBackend, 2>([2, 5], &Default::default());
        assert_eq!(t.dims(), [2, 5]);
    }

    #[test]
    fn test_noise_follows_seed_choice() {
        let mut seeded = Noise::from_seed(Some(7));
        assert!(matches!(seeded, Noise::Seeded(_)));
        assert_eq!(draw(&mut seeded), draw(&mut SeededNoise::new(7)));

        let mut backend = Noise::from_seed(None);
        assert!(matches!(backend, Noise::Backend(_)));
        assert_eq!(draw(&mut backend).len(), 12);
    }
}
