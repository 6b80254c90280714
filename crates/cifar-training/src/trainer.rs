//! Custom training loop for the ResNet9 classifier.
//!
//! Batches come from background data-loading workers; the learning rate
//! is stepped per batch so the one-cycle policy follows its full curve.

use std::sync::Arc;
use std::time::Instant;

use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use cifar_core::{OptimizerType, Result, TrainingConfig, TrainingHistory};
use cifar_dataset::{CifarBatch, CifarBatcher, CifarItem};

use crate::checkpoint::{Checkpoint, CheckpointManager, CheckpointMetadata};
use crate::lr_schedule::LrScheduler;
use crate::model::ResNet9;

/// Result of a completed training run
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Per-epoch metric history
    pub history: TrainingHistory,
    /// Best validation accuracy reached, in [0, 1]
    pub best_val_accuracy: f64,
    /// Epoch (one-based) that reached the best validation accuracy
    pub best_epoch: usize,
}

/// Trainer wiring the data loaders, optimizer, scheduler and checkpoints
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Creates a trainer from a validated configuration
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Trains a fresh model on the given datasets.
    ///
    /// Returns the final model together with the training history. The
    /// best model by validation accuracy is saved through the
    /// checkpoint manager as `best_model`.
    pub fn fit<B>(
        &self,
        train_dataset: impl Dataset<CifarItem> + 'static,
        valid_dataset: impl Dataset<CifarItem> + 'static,
        device: &B::Device,
    ) -> Result<(ResNet9<B>, TrainOutcome)>
    where
        B: AutodiffBackend,
    {
        B::seed(self.config.seed);

        let params = &self.config.training;
        let batcher = CifarBatcher::new();

        let train_loader: Arc<dyn DataLoader<B, CifarBatch<B>>> =
            DataLoaderBuilder::new(batcher.clone())
                .batch_size(params.batch_size)
                .shuffle(self.config.seed)
                .num_workers(params.num_workers)
                .set_device(device.clone())
                .build(train_dataset);

        let valid_loader: Arc<dyn DataLoader<B::InnerBackend, CifarBatch<B::InnerBackend>>> =
            DataLoaderBuilder::new(batcher)
                .batch_size(params.batch_size)
                .num_workers(params.num_workers)
                .set_device(device.clone())
                .build(valid_dataset);

        let model = ResNet9::new(&self.config.model, device);
        info!(
            "Model initialized: {} classes, {} parameters",
            model.num_classes(),
            model.num_params()
        );

        match params.optimizer {
            OptimizerType::Adam => {
                let optim = AdamConfig::new()
                    .with_weight_decay(Some(WeightDecayConfig::new(params.weight_decay.into())))
                    .with_grad_clipping(params.grad_clip.map(GradientClippingConfig::Norm))
                    .init();
                self.run_loop(model, optim, train_loader, valid_loader)
            }
            OptimizerType::AdamW => {
                let optim = AdamWConfig::new()
                    .with_weight_decay(params.weight_decay.into())
                    .with_grad_clipping(params.grad_clip.map(GradientClippingConfig::Norm))
                    .init();
                self.run_loop(model, optim, train_loader, valid_loader)
            }
            OptimizerType::Sgd => {
                let optim = SgdConfig::new()
                    .with_weight_decay(Some(WeightDecayConfig::new(params.weight_decay.into())))
                    .with_momentum(Some(MomentumConfig::new()))
                    .with_gradient_clipping(params.grad_clip.map(GradientClippingConfig::Norm))
                    .init();
                self.run_loop(model, optim, train_loader, valid_loader)
            }
        }
    }

    fn run_loop<B, O>(
        &self,
        mut model: ResNet9<B>,
        mut optim: O,
        train_loader: Arc<dyn DataLoader<B, CifarBatch<B>>>,
        valid_loader: Arc<dyn DataLoader<B::InnerBackend, CifarBatch<B::InnerBackend>>>,
    ) -> Result<(ResNet9<B>, TrainOutcome)>
    where
        B: AutodiffBackend,
        O: Optimizer<ResNet9<B>, B>,
    {
        let params = &self.config.training;
        let num_items = train_loader.num_items();
        let steps_per_epoch = num_items.div_ceil(params.batch_size).max(1);

        let scheduler = LrScheduler::new(params.lr_schedule, params.max_lr, params.num_epochs);
        let manager = CheckpointManager::new(self.config.output.output_dir.join("checkpoints"))
            .keep_last_n(Some(self.config.output.keep_last_n));

        let mut history = TrainingHistory::new();
        let mut best_val_accuracy = 0.0f64;
        let mut best_epoch = 0usize;

        for epoch in 0..params.num_epochs {
            let epoch_start = Instant::now();
            let mut epoch_loss = 0.0f64;
            let mut correct = 0usize;
            let mut seen = 0usize;
            let mut lr = params.max_lr;

            let pb = ProgressBar::new(steps_per_epoch as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );

            for (step, batch) in train_loader.iter().enumerate() {
                lr = scheduler.get_lr_at_step(epoch, step, steps_per_epoch);

                let output = model.forward(batch.images.clone());
                let loss = CrossEntropyLossConfig::new()
                    .init(&output.device())
                    .forward(output.clone(), batch.targets.clone());

                let batch_size = batch.targets.dims()[0];
                let loss_value: f64 = loss.clone().into_scalar().elem();
                // Per-sample weighting keeps a ragged final batch from skewing the mean
                epoch_loss += loss_value * batch_size as f64;
                let predictions = output.argmax(1).reshape([batch_size]);
                let batch_correct: i64 = predictions
                    .equal(batch.targets.clone())
                    .int()
                    .sum()
                    .into_scalar()
                    .elem();
                correct += batch_correct as usize;
                seen += batch_size;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);

                pb.set_message(format!("loss {loss_value:.4} lr {lr:.5}"));
                pb.inc(1);
            }
            pb.finish_and_clear();

            let train_loss = epoch_loss / seen.max(1) as f64;
            let train_accuracy = correct as f64 / seen.max(1) as f64;

            let (val_loss, val_accuracy) = validate(&model, valid_loader.as_ref());
            let seconds = epoch_start.elapsed().as_secs_f64();

            let is_best = val_accuracy > best_val_accuracy;
            if is_best {
                best_val_accuracy = val_accuracy;
                best_epoch = epoch + 1;
            }

            info!(
                "Epoch {}/{}: train_loss={:.4} train_acc={:.4} val_loss={:.4} val_acc={:.4} lr={:.6} ({:.1}s){}",
                epoch + 1,
                params.num_epochs,
                train_loss,
                train_accuracy,
                val_loss,
                val_accuracy,
                lr,
                seconds,
                if is_best { " [best]" } else { "" },
            );

            history.add_epoch(
                epoch + 1,
                train_loss,
                val_loss,
                train_accuracy,
                val_accuracy,
                lr,
                seconds,
            );

            let metadata = CheckpointMetadata {
                num_classes: self.config.model.num_classes,
                base_channels: self.config.model.base_channels,
                num_parameters: model.num_params(),
                training_samples: num_items,
            };
            let checkpoint = Checkpoint::new(epoch + 1, val_loss, val_accuracy, lr, metadata);
            manager.save_checkpoint(&checkpoint, &model, is_best)?;
        }

        let outcome = TrainOutcome {
            history,
            best_val_accuracy,
            best_epoch,
        };

        Ok((model, outcome))
    }
}

/// Evaluates the model on the inner (non-autodiff) backend.
///
/// Returns (average loss, accuracy in [0, 1]).
fn validate<B: AutodiffBackend>(
    model: &ResNet9<B>,
    loader: &dyn DataLoader<B::InnerBackend, CifarBatch<B::InnerBackend>>,
) -> (f64, f64) {
    let inner_model = model.clone().valid();

    let mut total_loss = 0.0f64;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in loader.iter() {
        let output = inner_model.forward(batch.images.clone());
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), batch.targets.clone());

        let batch_size = batch.targets.dims()[0];
        total_loss += loss.into_scalar().elem::<f64>() * batch_size as f64;
        let predictions = output.argmax(1).reshape([batch_size]);
        let batch_correct: i64 = predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        seen += batch_size;
    }

    let avg_loss = total_loss / seen.max(1) as f64;
    let accuracy = correct as f64 / seen.max(1) as f64;
    (avg_loss, accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataset::InMemDataset;
    use cifar_core::{LrScheduleConfig, ModelConfig};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_items(count: usize) -> Vec<CifarItem> {
        (0..count)
            .map(|i| CifarItem {
                image: vec![(i % 7) as f32 / 7.0; 3072],
                label: i % 10,
            })
            .collect()
    }

    fn tiny_config(output_dir: std::path::PathBuf) -> TrainingConfig {
        let mut config = TrainingConfig::default();
        config.model = ModelConfig {
            num_classes: 10,
            base_channels: 4,
        };
        config.training.num_epochs = 1;
        config.training.batch_size = 4;
        config.training.num_workers = 1;
        config.training.lr_schedule = LrScheduleConfig::Constant;
        config.training.max_lr = 0.001;
        config.output.output_dir = output_dir;
        config
    }

    #[test]
    fn test_fit_smoke() {
        let temp_dir = TempDir::new().unwrap();
        let config = tiny_config(temp_dir.path().to_path_buf());
        let trainer = Trainer::new(config);

        let train = InMemDataset::new(tiny_items(8));
        let valid = InMemDataset::new(tiny_items(4));
        let device = Default::default();

        let (model, outcome) = trainer.fit::<TestBackend>(train, valid, &device).unwrap();

        assert_eq!(outcome.history.len(), 1);
        let val_acc = outcome.history.val_accuracy[0];
        assert!((0.0..=1.0).contains(&val_acc));
        let train_acc = outcome.history.train_accuracy[0];
        assert!((0.0..=1.0).contains(&train_acc));
        assert!(model.num_params() > 0);

        // Checkpoints were written
        assert!(temp_dir
            .path()
            .join("checkpoints")
            .join("latest.json")
            .exists());
    }
}
