//! Evaluation CLI tool.
//!
//! Loads the best checkpoint from a training run and scores it on the
//! CIFAR-10 test split, printing a per-class report and writing the
//! confusion matrix as CSV.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cifar_core::{setup_cli_logging, DataSplit, InferenceBackend, ModelConfig};
use cifar_dataset::{ensure_dataset, AugmentationPipeline, CifarDataset};
use cifar_training::checkpoint::CheckpointManager;
use cifar_training::{Evaluator, ResNet9};

/// CIFAR-10 classifier evaluation tool
#[derive(Parser, Debug)]
#[command(
    name = "evaluate",
    about = "Evaluate a trained ResNet9 checkpoint on the CIFAR-10 test split"
)]
struct Args {
    /// Directory containing the checkpoints of a training run
    #[arg(short, long, value_name = "DIR", default_value = "output/checkpoints")]
    checkpoints: PathBuf,

    /// Dataset directory (downloaded on first use)
    #[arg(short, long, value_name = "DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory for the evaluation artifacts
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    output: PathBuf,

    /// Batch size for evaluation
    #[arg(short, long, value_name = "SIZE", default_value_t = 256)]
    batch_size: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("CIFAR-10 ResNet9 evaluation tool");

    let manager = CheckpointManager::new(args.checkpoints.clone());
    let checkpoint = manager
        .load_best()
        .context("Failed to load the best checkpoint state")?;

    info!(
        "Best checkpoint: epoch {} (val accuracy {:.4}, val loss {:.4})",
        checkpoint.epoch, checkpoint.val_accuracy, checkpoint.val_loss
    );

    let model_config = ModelConfig {
        num_classes: checkpoint.metadata.num_classes,
        base_channels: checkpoint.metadata.base_channels,
    };

    let device = cifar_core::default_device();
    let model: ResNet9<InferenceBackend> = ResNet9::new(&model_config, &device);
    let model = manager
        .load_best_weights(model, &device)
        .context("Failed to load the best checkpoint weights")?;

    let batches_dir = ensure_dataset(&args.data_dir).context("Failed to prepare the dataset")?;
    let test_dataset =
        CifarDataset::load(&batches_dir, DataSplit::Test, AugmentationPipeline::none())?;

    let evaluator = Evaluator::new(args.batch_size);
    let metrics = evaluator.evaluate(&model, &test_dataset, &device)?;
    Evaluator::print_report(&metrics);

    fs::create_dir_all(&args.output).context("Failed to create output directory")?;
    let csv_path = args.output.join("confusion_matrix.csv");
    fs::write(&csv_path, Evaluator::confusion_matrix_csv(&metrics))?;
    info!("Confusion matrix written to {}", csv_path.display());

    Ok(())
}
