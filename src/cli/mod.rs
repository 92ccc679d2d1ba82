// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
//   train     — fit a VAE on IDX images or synthetic data
//   generate  — decode prior or posterior samples to CSV
//   encode    — write latent codes to CSV
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, EncodeArgs, GenerateArgs, Source, TrainArgs};

use crate::application::generate_use_case::{GenerateSource, GenerateUseCase};
use crate::infra::export::write_rows_csv;

#[derive(Parser, Debug)]
#[command(
    name = "vae-trainer",
    version,
    about = "Train a variational autoencoder on images, then sample and encode with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. No computation happens here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Generate(args) => run_generate(args),
            Commands::Encode(args)   => run_encode(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset '{}'", args.dataset);
    let checkpoint_dir = args.checkpoint_dir.clone();

    let history = TrainUseCase::new(args.into()).execute()?;
    if let Some(last) = history.last() {
        println!(
            "Training complete. Final loss {:.4}. Checkpoints in '{}'.",
            last.loss, checkpoint_dir
        );
    }
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let source = match args.source {
        Source::Prior => GenerateSource::Prior { count: args.count },
        Source::Posterior => GenerateSource::Posterior {
            data_file: args
                .data_file
                .context("--source posterior needs --data-file")?,
        },
    };

    let mut use_case = GenerateUseCase::from_checkpoint(&args.checkpoint_dir, args.seed)?;
    let rows = use_case.generate(&source, args.noisy)?;
    let n    = write_rows_csv(&args.output, "x", &rows, use_case.output_width(), None)?;

    println!("Wrote {} generated samples to '{}'", n, args.output.display());
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let mut use_case = GenerateUseCase::from_checkpoint(&args.checkpoint_dir, args.seed)?;
    let codes = use_case.encode(&args.data_file, args.labels_file.as_deref(), args.noisy)?;
    let n     = write_rows_csv(
        &args.output,
        "z",
        &codes.values,
        use_case.latent_dim()?,
        codes.labels.as_deref(),
    )?;

    println!("Wrote {} latent codes to '{}'", n, args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::domain::sample::DatasetKind;

    #[test]
    fn test_train_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "vae-trainer", "train", "--dataset", "synthetic", "--epochs", "3", "--latent-dim", "4", "-q",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.dataset, DatasetKind::Synthetic);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.latent_dim, Some(4));
        assert!(cfg.quiet);
        assert_eq!(cfg.batch_size, TrainConfig::default().batch_size);
    }

    #[test]
    fn test_generate_defaults_to_prior() {
        let cli = Cli::try_parse_from(["vae-trainer", "generate"]).unwrap();
        let Commands::Generate(args) = cli.command else { panic!("expected generate") };
        assert_eq!(args.source, Source::Prior);
        assert!(!args.noisy);
    }

    #[test]
    fn test_encode_accepts_labels_file() {
        let cli = Cli::try_parse_from([
            "vae-trainer", "encode", "--data-file", "images.idx", "--labels-file", "labels.idx",
        ])
        .unwrap();
        let Commands::Encode(args) = cli.command else { panic!("expected encode") };
        assert_eq!(args.labels_file.as_deref(), Some(std::path::Path::new("labels.idx")));
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        assert!(Cli::try_parse_from(["vae-trainer", "train", "--dataset", "cifar"]).is_err());
    }
}
