// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn-specific model code: networks,
// the stochastic encode/decode pipeline, the ELBO and training.
//
// What's in this layer (leaves first):
//
//   networks.rs     — FeatureTransform trait and the three
//                     pluggable networks (MLP, conv encoder,
//                     conv decoder) behind the FeatureNet enum
//
//   noise.rs        — Seeded and backend standard-normal sources
//
//   distribution.rs — LatentDistribution / ReconstructionDistribution
//                     and the reparameterised sampling step
//
//   encoder.rs      — x → (z, mu_z, logvar_z), latent_dim latch
//
//   decoder.rs      — z → (xhat, mu_x, log σ_x), fixed σ_x
//
//   loss.rs         — KL, Gaussian log-likelihood, ELBO, loss
//
//   vae.rs          — VaeConfig factory and the Vae module
//
//   trainer.rs      — train_step, the epoch loop, run_training
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Kingma & Welling (2014) Auto-Encoding Variational Bayes

/// Pluggable feature networks
pub mod networks;

/// Standard-normal noise sources
pub mod noise;

/// Distribution parameter carriers
pub mod distribution;

pub mod encoder;

pub mod decoder;

/// ELBO objective
pub mod loss;

/// The VAE model and its configuration
pub mod vae;

/// Training step and epoch loop
pub mod trainer;
