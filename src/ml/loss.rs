// ============================================================
// Layer 5 — Loss Engine (ELBO)
// ============================================================
// Pure functions over distribution parameters. Every quantity
// is computed per example (shape [batch]) and only the final
// training loss is reduced over the batch.
//
//   KL(q || p)  = 0.5 * Σ_j ( exp(lv_j) + mu_j² − 1 − lv_j )
//
//   log p(x|z)  = Σ_i ( −½·ln 2π − ln σ − ½·((x_i − mu_i) / σ)² )
//
//   elbo        = log p(x|z) − KL
//   loss        = −mean(elbo)
//
// With a fixed σ the likelihood cannot overflow. The learned
// variant below clamps log-variance before exponentiating.
//
// Reference: Kingma & Welling (2014) Appendix B

use burn::prelude::*;

use crate::domain::error::VaeError;
use crate::ml::distribution::{LatentDistribution, ReconstructionDistribution};

/// ½·ln(2π)
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Bound on |log-variance| for learned observation noise.
pub const LOGVAR_CLAMP: f64 = 20.0;

/// Per-batch ELBO terms. All per-example tensors have shape [batch].
#[derive(Debug, Clone)]
pub struct ElboResult<B: Backend> {
    pub elbo:           Tensor<B, 1>,
    /// −mean(elbo), shape [1]
    pub loss:           Tensor<B, 1>,
    pub kl:             Tensor<B, 1>,
    pub log_likelihood: Tensor<B, 1>,
}

/// Closed-form KL from N(mu_z, diag(exp(logvar_z))) to N(0, I).
pub fn kl_divergence<B: Backend>(posterior: &LatentDistribution<B>) -> Tensor<B, 1> {
    let mu = posterior.mu_z.clone();
    let lv = posterior.logvar_z.clone();

    (lv.clone().exp() + mu.clone() * mu - lv)
        .sub_scalar(1.0)
        .sum_dim(1)
        .squeeze::<1>(1)
        .mul_scalar(0.5)
}

/// log N(x; mu_x, σ² I) summed over features, with ln σ fixed.
pub fn gaussian_log_likelihood<B: Backend>(
    x:           Tensor<B, 2>,
    mu_x:        Tensor<B, 2>,
    log_sigma_x: f64,
) -> Tensor<B, 1> {
    let [_, width] = x.dims();
    let z  = (x - mu_x).div_scalar(log_sigma_x.exp());
    let sq = z.clone() * z;

    sq.sum_dim(1)
        .squeeze::<1>(1)
        .mul_scalar(-0.5)
        .sub_scalar(width as f64 * (HALF_LN_2PI + log_sigma_x))
}

/// log N(x; mu_x, diag(exp(logvar_x))) summed over features.
/// logvar_x is clamped to [−LOGVAR_CLAMP, LOGVAR_CLAMP].
pub fn gaussian_log_likelihood_learned<B: Backend>(
    x:        Tensor<B, 2>,
    mu_x:     Tensor<B, 2>,
    logvar_x: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let lv   = logvar_x.clamp(-LOGVAR_CLAMP, LOGVAR_CLAMP);
    let diff = x - mu_x;
    let sq   = diff.clone() * diff * lv.clone().neg().exp();

    (sq + lv)
        .add_scalar(2.0 * HALF_LN_2PI)
        .mul_scalar(-0.5)
        .sum_dim(1)
        .squeeze::<1>(1)
}

/// Combine both terms into the ELBO and the scalar training loss.
pub fn elbo<B: Backend>(
    x:              Tensor<B, 2>,
    posterior:      &LatentDistribution<B>,
    reconstruction: &ReconstructionDistribution<B>,
) -> Result<ElboResult<B>, VaeError> {
    let expected = reconstruction.mu_x.dims()[1];
    let found    = x.dims()[1];
    if found != expected {
        return Err(VaeError::InputWidthMismatch { expected, found });
    }

    let log_likelihood = gaussian_log_likelihood(
        x,
        reconstruction.mu_x.clone(),
        reconstruction.log_sigma_x,
    );
    let kl   = kl_divergence(posterior);
    let elbo = log_likelihood.clone() - kl.clone();
    let loss = elbo.clone().mean().neg();

    Ok(ElboResult { elbo, loss, kl, log_likelihood })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values(t: Tensor<TestBackend, 1>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn posterior(mu: [[f32; 2]; 1], lv: [[f32; 2]; 1]) -> LatentDistribution<TestBackend> {
        let device = Default::default();
        LatentDistribution {
            mu_z:     Tensor::from_floats(mu, &device),
            logvar_z: Tensor::from_floats(lv, &device),
        }
    }

    #[test]
    fn test_kl_zero_at_standard_normal() {
        let kl = values(kl_divergence(&posterior([[0.0, 0.0]], [[0.0, 0.0]])));
        assert!(kl[0].abs() < 1e-7);
    }

    #[test]
    fn test_kl_known_value() {
        // mu = 1, lv = 0 contributes 0.5 per dimension
        let kl = values(kl_divergence(&posterior([[1.0, 1.0]], [[0.0, 0.0]])));
        assert!((kl[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_kl_positive_away_from_prior() {
        let kl = values(kl_divergence(&posterior([[0.0, 0.3]], [[-1.0, 2.0]])));
        assert!(kl[0] > 0.0);
    }

    #[test]
    fn test_log_likelihood_at_mean() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 2>::from_floats([[0.2, 0.7]], &device);

        // σ = 1, x = mu → −2 · ½ ln 2π = −ln 2π
        let ll = values(gaussian_log_likelihood(x.clone(), x, 0.0));
        assert!((ll[0] as f64 + (2.0 * std::f64::consts::PI).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_log_likelihood_penalises_distance() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0]], &device);
        let near   = Tensor::<TestBackend, 2>::from_floats([[0.9, 0.9]], &device);
        let far    = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0]], &device);

        let ln_sigma = 0.75f64.ln();
        let ll_near  = values(gaussian_log_likelihood(x.clone(), near, ln_sigma))[0];
        let ll_far   = values(gaussian_log_likelihood(x, far, ln_sigma))[0];
        assert!(ll_near > ll_far);
    }

    #[test]
    fn test_learned_variance_matches_fixed_form() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 2>::from_floats([[0.5, -0.5]], &device);
        let mu     = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0]], &device);

        // logvar = 2 ln σ
        let ln_sigma = 0.75f64.ln();
        let lv       = Tensor::<TestBackend, 2>::full([1, 2], 2.0 * ln_sigma, &device);

        let fixed   = values(gaussian_log_likelihood(x.clone(), mu.clone(), ln_sigma))[0];
        let learned = values(gaussian_log_likelihood_learned(x, mu, lv))[0];
        assert!((fixed - learned).abs() < 1e-4);
    }

    #[test]
    fn test_learned_variance_is_clamped() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 2>::from_floats([[1.0, -1.0]], &device);
        let mu     = Tensor::<TestBackend, 2>::zeros([1, 2], &device);

        for extreme in [-1000.0, 1000.0] {
            let lv = Tensor::<TestBackend, 2>::full([1, 2], extreme, &device);
            let ll = values(gaussian_log_likelihood_learned(x.clone(), mu.clone(), lv));
            assert!(ll[0].is_finite(), "logvar {extreme} gave {}", ll[0]);
        }
    }

    #[test]
    fn test_elbo_and_loss() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0], [0.0, 0.0]], &device);
        let post   = LatentDistribution {
            mu_z:     Tensor::<TestBackend, 2>::from_floats([[0.0], [1.0]], &device),
            logvar_z: Tensor::<TestBackend, 2>::zeros([2, 1], &device),
        };
        let recon = ReconstructionDistribution {
            mu_x:        x.clone(),
            log_sigma_x: 0.0,
        };

        let result = elbo(x, &post, &recon).unwrap();
        let ln_2pi = (2.0 * std::f64::consts::PI).ln() as f32;

        let per_example = values(result.elbo);
        assert!((per_example[0] + ln_2pi).abs() < 1e-5);
        assert!((per_example[1] + ln_2pi + 0.5).abs() < 1e-5);

        let loss = values(result.loss)[0];
        assert!((loss - (ln_2pi + 0.25)).abs() < 1e-5);
    }

    #[test]
    fn test_elbo_rejects_mismatched_widths() {
        let device = Default::default();
        let post   = posterior([[0.0, 0.0]], [[0.0, 0.0]]);
        let recon  = ReconstructionDistribution {
            mu_x:        Tensor::<TestBackend, 2>::zeros([1, 3], &device),
            log_sigma_x: 0.0,
        };
        let err = elbo(Tensor::zeros([1, 4], &device), &post, &recon).unwrap_err();
        assert!(matches!(err, VaeError::InputWidthMismatch { expected: 3, found: 4 }));
    }
}
