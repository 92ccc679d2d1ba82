// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One optimisation step:
//
//   1. forward    encode → decode → ELBO (fresh noise)
//   2. check      loss must be finite
//   3. backward   loss.backward()
//   4. check      global gradient L2 norm must be finite
//   5. update     exactly one Adam step on every parameter
//
// A failure in 1–4 returns an error before step 5, so the model
// is never partially updated. Nothing from the step (loss, mu,
// logvar, gradients) outlives it; only parameters and the
// optimiser state carry over.
//
// The epoch loop averages step reports, stops with
// TrainingHalted{epoch, batch} on divergence and hands each
// epoch summary to a callback (checkpoint + metrics CSV).
//
// Key Burn insight:
//   - Training uses MyBackend (Autodiff<inner>) for gradients
//   - loss.backward() consumes the graph built by this step only
//   - GradientsParams::from_grads maps gradients to parameter ids
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::ImageDataset,
};
use crate::domain::error::VaeError;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{networks::GradSquaredNorm, noise::{NoiseSource, SeededNoise}, vae::Vae};

#[cfg(not(feature = "wgpu"))]
pub type MyInnerBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
pub type MyInnerBackend = burn::backend::Wgpu;

pub type MyBackend = burn::backend::Autodiff<MyInnerBackend>;

// ─── Single step ──────────────────────────────────────────────────────────────
/// Scalars reported by one successful step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub loss:           f64,
    /// Batch mean of log p(x|z)
    pub log_likelihood: f64,
    /// Batch mean of KL(q(z|x) || p(z))
    pub kl:             f64,
    /// Global L2 norm over all parameter gradients
    pub grad_norm:      f64,
}

/// Forward, backward and one optimiser update on a single batch.
/// On error the model is left exactly as it was.
pub fn train_step<B, O, N>(
    model: &mut Vae<B>,
    batch: &ImageBatch<B>,
    optim: &mut O,
    lr:    f64,
    noise: &mut N,
) -> Result<StepReport, VaeError>
where
    B: AutodiffBackend,
    O: Optimizer<Vae<B>, B>,
    N: NoiseSource,
{
    let output = model.forward(batch.images.clone(), noise)?;

    let loss: f64 = output.elbo.loss.clone().into_scalar().elem();
    if !loss.is_finite() {
        return Err(VaeError::NumericDivergence { quantity: "loss" });
    }
    let log_likelihood: f64 = output.elbo.log_likelihood.clone().mean().into_scalar().elem();
    let kl: f64             = output.elbo.kl.clone().mean().into_scalar().elem();

    let grad_norm = backward_and_update(model, output.elbo.loss, optim, lr)?;

    Ok(StepReport { loss, log_likelihood, kl, grad_norm })
}

/// Steps 3 to 5: backpropagate `loss`, refuse non-finite gradients,
/// then apply one optimiser update. Returns the global gradient norm.
fn backward_and_update<B, O>(
    model: &mut Vae<B>,
    loss:  Tensor<B, 1>,
    optim: &mut O,
    lr:    f64,
) -> Result<f64, VaeError>
where
    B: AutodiffBackend,
    O: Optimizer<Vae<B>, B>,
{
    let grads     = loss.backward();
    let grad_norm = model.grad_squared_norm(&grads).sqrt();
    if !grad_norm.is_finite() {
        return Err(VaeError::NumericDivergence { quantity: "gradients" });
    }

    let grads = GradientsParams::from_grads(grads, &*model);
    *model    = optim.step(lr, model.clone(), grads);
    Ok(grad_norm)
}

// ─── Epoch loop ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    pub lr:     f64,
    /// Suppress per-epoch stdout lines
    pub quiet:  bool,
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), VaeError> {
        if self.epochs == 0 {
            return Err(VaeError::config("epochs must be at least 1"));
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(VaeError::config(format!(
                "learning rate must be positive and finite, got {}",
                self.lr
            )));
        }
        Ok(())
    }
}

/// Mean step values over one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// 1-based
    pub epoch:          usize,
    pub loss:           f64,
    pub log_likelihood: f64,
    pub kl:             f64,
    pub batches:        usize,
}

/// Run `options.epochs` passes over `loader`, one train_step per batch.
/// `on_epoch` sees the updated model after every epoch.
pub fn fit<B, O, N, F>(
    mut model: Vae<B>,
    loader:    &dyn DataLoader<ImageBatch<B>>,
    options:   &FitOptions,
    optim:     &mut O,
    noise:     &mut N,
    mut on_epoch: F,
) -> Result<(Vae<B>, Vec<EpochSummary>)>
where
    B: AutodiffBackend,
    O: Optimizer<Vae<B>, B>,
    N: NoiseSource,
    F: FnMut(&Vae<B>, &EpochSummary) -> Result<()>,
{
    options.validate()?;
    let mut history = Vec::with_capacity(options.epochs);

    for epoch in 1..=options.epochs {
        let mut loss_sum = 0.0f64;
        let mut ll_sum   = 0.0f64;
        let mut kl_sum   = 0.0f64;
        let mut batches  = 0usize;

        for (index, batch) in loader.iter().enumerate() {
            let report = match train_step(&mut model, &batch, optim, options.lr, noise) {
                Ok(report) => report,
                Err(err @ VaeError::NumericDivergence { .. }) => {
                    tracing::warn!("Diverged at epoch {}, batch {}: {}", epoch, index + 1, err);
                    return Err(VaeError::TrainingHalted {
                        epoch,
                        batch:  index + 1,
                        source: Box::new(err),
                    }
                    .into());
                }
                Err(err) if err.is_shape_mismatch() => {
                    tracing::error!("Batch {} does not fit the model: {}", index + 1, err);
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            };

            tracing::trace!(
                "epoch {} batch {}: loss={:.4} grad_norm={:.4}",
                epoch, index + 1, report.loss, report.grad_norm,
            );
            loss_sum += report.loss;
            ll_sum   += report.log_likelihood;
            kl_sum   += report.kl;
            batches  += 1;
        }

        if batches == 0 {
            return Err(VaeError::config("data loader produced no batches").into());
        }

        let n       = batches as f64;
        let summary = EpochSummary {
            epoch,
            loss:           loss_sum / n,
            log_likelihood: ll_sum / n,
            kl:             kl_sum / n,
            batches,
        };

        if !options.quiet {
            println!(
                "Epoch {:>3}/{} | loss={:.4} | log_likelihood={:.4} | kl={:.4}",
                epoch, options.epochs, summary.loss, summary.log_likelihood, summary.kl,
            );
        }

        on_epoch(&model, &summary)?;
        history.push(summary);
    }

    Ok((model, history))
}

// ─── CLI entry point ──────────────────────────────────────────────────────────
/// Build the model, optimiser and data loader from `cfg` and train,
/// saving a checkpoint and a metrics row after every epoch.
pub fn run_training(
    cfg:          &TrainConfig,
    dataset:      ImageDataset,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
) -> Result<Vec<EpochSummary>> {
    let device = <MyInnerBackend as Backend>::Device::default();
    tracing::info!("Using device: {:?}", device);

    MyBackend::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let vae_cfg = cfg.vae_config(dataset.width())?;
    ckpt_manager.save_vae_config(&vae_cfg)?;

    let model: Vae<MyBackend> = vae_cfg
        .init(&device)
        .context("Cannot build the VAE from the training configuration")?;
    tracing::info!(
        "Model ready: {:?} networks, input width {}, latent_dim {}",
        vae_cfg.architecture, vae_cfg.input_width, vae_cfg.latent_dim,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loader ───────────────────────────────────────────────────────────
    // Each epoch is a fresh permutation of the whole dataset from the
    // seeded RNG; one worker keeps the batch order reproducible.
    let batcher = ImageBatcher::<MyBackend>::new(device.clone());
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(dataset);

    let options = FitOptions { epochs: cfg.epochs, lr: cfg.lr, quiet: cfg.quiet };
    let mut noise = SeededNoise::new(cfg.seed);

    let (_, history) = fit(model, loader.as_ref(), &options, &mut optim, &mut noise, |model, summary| {
        ckpt_manager.save_model(model, summary.epoch)?;
        metrics.log(&EpochMetrics::from(summary))?;
        tracing::info!("Checkpoint saved for epoch {}", summary.epoch);
        Ok(())
    })?;

    tracing::info!("Training complete!");
    Ok(history)
}
