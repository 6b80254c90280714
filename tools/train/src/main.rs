//! Training CLI tool.
//!
//! Downloads CIFAR-10 on first use, trains a ResNet9 classifier with the
//! one-cycle learning rate policy, and writes checkpoints, metrics and
//! charts to the output directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cifar_core::{
    load_toml_config, setup_cli_logging, DataSplit, InferenceBackend, TrainingBackend,
    TrainingConfig,
};
use cifar_dataset::{ensure_dataset, AugmentationPipeline, CifarDataset, DatasetStatistics};
use cifar_training::checkpoint::CheckpointManager;
use cifar_training::{charts, Evaluator, ResNet9, Trainer};

/// CIFAR-10 classifier training tool
#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train a ResNet9 classifier on CIFAR-10",
    long_about = "Train a ResNet9 classifier on CIFAR-10 with a one-cycle \
                  learning rate policy, on-the-fly augmentation, and automatic \
                  dataset download."
)]
struct Args {
    /// Path to training configuration file (TOML); defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Override dataset directory
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long, value_name = "N")]
    epochs: Option<usize>,

    /// Override peak learning rate
    #[arg(short, long, value_name = "LR")]
    lr: Option<f64>,

    /// Override batch size
    #[arg(short, long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Skip the final evaluation on the test split
    #[arg(long)]
    no_eval: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate the configuration without training
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("CIFAR-10 ResNet9 training tool");

    let mut config = match &args.config {
        Some(path) => load_toml_config::<TrainingConfig>(path)
            .context("Failed to load configuration file")?,
        None => TrainingConfig::default(),
    };

    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    if args.dry_run {
        info!("Configuration validated successfully (dry run)");
        print_config_summary(&config);
        return Ok(());
    }

    fs::create_dir_all(&config.output.output_dir).context("Failed to create output directory")?;

    let config_path = config.output.output_dir.join("config.toml");
    let config_str = toml::to_string_pretty(&config)?;
    fs::write(&config_path, config_str).context("Failed to save configuration")?;
    info!("Configuration saved to {}", config_path.display());

    print_config_summary(&config);

    let batches_dir =
        ensure_dataset(&config.data.data_dir).context("Failed to prepare the dataset")?;

    let train_augmentation = AugmentationPipeline::new(config.data.augmentation.clone());
    let train_dataset = CifarDataset::load(&batches_dir, DataSplit::Train, train_augmentation)?;
    let test_dataset =
        CifarDataset::load(&batches_dir, DataSplit::Test, AugmentationPipeline::none())?;

    let stats = DatasetStatistics::compute(train_dataset.images());
    info!("Training split:\n{}", stats.summary());

    let device = cifar_core::default_device();
    let trainer = Trainer::new(config.clone());
    let (_model, outcome) =
        trainer.fit::<TrainingBackend>(train_dataset, test_dataset, &device)?;

    let csv_path = config.output.output_dir.join("training_metrics.csv");
    fs::write(&csv_path, outcome.history.to_csv())?;
    info!("Metrics exported to {}", csv_path.display());

    if config.output.charts {
        let written = charts::render_history_charts(&outcome.history, &config.output.output_dir)?;
        for path in &written {
            info!("Chart written to {}", path.display());
        }
    }

    info!("");
    info!("Training summary:");
    info!(
        "  Best validation accuracy: {:.4} (epoch {})",
        outcome.best_val_accuracy, outcome.best_epoch
    );
    info!(
        "  Checkpoints saved to {}",
        config.output.output_dir.join("checkpoints").display()
    );

    if !args.no_eval {
        run_final_evaluation(&config, &batches_dir)?;
    }

    Ok(())
}

fn apply_overrides(config: &mut TrainingConfig, args: &Args) {
    if let Some(epochs) = args.epochs {
        config.training.num_epochs = epochs;
    }
    if let Some(lr) = args.lr {
        config.training.max_lr = lr;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(ref output) = args.output {
        config.output.output_dir = output.clone();
    }
    if let Some(ref data_dir) = args.data_dir {
        config.data.data_dir = data_dir.clone();
    }
}

fn print_config_summary(config: &TrainingConfig) {
    info!("");
    info!("Configuration summary:");
    info!("  Classes: {}", config.model.num_classes);
    info!("  Base channels: {}", config.model.base_channels);
    info!("  Epochs: {}", config.training.num_epochs);
    info!("  Batch size: {}", config.training.batch_size);
    info!("  Peak learning rate: {}", config.training.max_lr);
    info!("  Optimizer: {}", config.training.optimizer);
    info!("  Weight decay: {}", config.training.weight_decay);
    info!("  Gradient clip: {:?}", config.training.grad_clip);
    info!("  Workers: {}", config.training.num_workers);
    info!("  Data dir: {}", config.data.data_dir.display());
    info!("  Output dir: {}", config.output.output_dir.display());
    info!("  Seed: {}", config.seed);
    info!("");
}

/// Evaluates the best checkpoint on the test split
fn run_final_evaluation(config: &TrainingConfig, batches_dir: &std::path::Path) -> Result<()> {
    info!("Evaluating best model on the test split");

    let device = cifar_core::default_device();
    let manager = CheckpointManager::new(config.output.output_dir.join("checkpoints"));

    let model: ResNet9<InferenceBackend> = ResNet9::new(&config.model, &device);
    let model = manager
        .load_best_weights(model, &device)
        .context("Failed to load the best checkpoint")?;

    let test_dataset =
        CifarDataset::load(batches_dir, DataSplit::Test, AugmentationPipeline::none())?;

    let evaluator = Evaluator::new(config.training.batch_size);
    let metrics = evaluator.evaluate(&model, &test_dataset, &device)?;
    Evaluator::print_report(&metrics);

    let csv_path = config.output.output_dir.join("confusion_matrix.csv");
    fs::write(&csv_path, Evaluator::confusion_matrix_csv(&metrics))?;
    info!("Confusion matrix written to {}", csv_path.display());

    Ok(())
}
