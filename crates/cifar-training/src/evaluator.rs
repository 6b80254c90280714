//! Model evaluation on held-out data.

use std::time::Instant;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;

use cifar_core::{EvaluationMetrics, Result, CLASS_NAMES, NUM_CLASSES};
use cifar_dataset::{CifarBatch, CifarBatcher, CifarItem};

use crate::model::ResNet9;

/// Batched evaluator producing a confusion matrix and per-class metrics
pub struct Evaluator {
    batch_size: usize,
}

impl Evaluator {
    /// Creates an evaluator using the given batch size
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Runs the model over the whole dataset and computes metrics
    pub fn evaluate<B: Backend>(
        &self,
        model: &ResNet9<B>,
        dataset: &impl Dataset<CifarItem>,
        device: &B::Device,
    ) -> Result<EvaluationMetrics> {
        let batcher = CifarBatcher::new();
        let mut metrics = EvaluationMetrics::new(NUM_CLASSES);
        let mut total_loss = 0.0f64;
        let mut num_batches = 0usize;
        let mut inference_ms = 0.0f64;

        let len = dataset.len();
        for start in (0..len).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(len);
            let items: Vec<CifarItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: CifarBatch<B> = batcher.batch(items, device);
            let forward_start = Instant::now();
            let output = model.forward(batch.images);
            inference_ms += forward_start.elapsed().as_secs_f64() * 1000.0;

            let batch_size = batch.targets.dims()[0];
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());
            // Weight by batch size so a ragged final batch does not skew the mean
            total_loss += loss.into_scalar().elem::<f64>() * batch_size as f64;
            num_batches += 1;
            let predictions = output
                .argmax(1)
                .reshape([batch_size])
                .into_data()
                .to_vec::<i64>()
                .map_err(|e| cifar_core::Error::Model(format!("Prediction readout: {e:?}")))?;
            let targets = batch
                .targets
                .into_data()
                .to_vec::<i64>()
                .map_err(|e| cifar_core::Error::Model(format!("Target readout: {e:?}")))?;

            for (&actual, &predicted) in targets.iter().zip(predictions.iter()) {
                metrics.update_confusion_matrix(actual as usize, predicted as usize);
            }
        }

        metrics.compute_from_confusion_matrix();
        metrics.avg_loss = total_loss / metrics.num_samples.max(1) as f64;
        metrics.avg_batch_ms = inference_ms / num_batches.max(1) as f64;
        Ok(metrics)
    }

    /// Prints a per-class report to stdout
    pub fn print_report(metrics: &EvaluationMetrics) {
        println!();
        println!("Evaluation: {} samples", metrics.num_samples);
        println!(
            "  accuracy {:.4}  avg loss {:.4}  avg inference {:.1} ms/batch",
            metrics.accuracy, metrics.avg_loss, metrics.avg_batch_ms
        );
        println!();
        println!(
            "  {:<12} {:>9} {:>9} {:>9}",
            "class", "precision", "recall", "f1"
        );
        for (label, name) in CLASS_NAMES.iter().enumerate() {
            let precision = metrics.per_class_precision.get(&label).copied().unwrap_or(0.0);
            let recall = metrics.per_class_recall.get(&label).copied().unwrap_or(0.0);
            let f1 = metrics.per_class_f1.get(&label).copied().unwrap_or(0.0);
            println!("  {name:<12} {precision:>9.4} {recall:>9.4} {f1:>9.4}");
        }
        println!();
        println!(
            "  macro avg    {:>9.4} {:>9.4} {:>9.4}",
            metrics.macro_precision(),
            metrics.macro_recall(),
            metrics.macro_f1()
        );
    }

    /// Renders the confusion matrix as CSV, actual rows x predicted columns
    pub fn confusion_matrix_csv(metrics: &EvaluationMetrics) -> String {
        let mut out = String::from("actual\\predicted");
        for name in CLASS_NAMES.iter() {
            out.push(',');
            out.push_str(name);
        }
        out.push('\n');

        for (label, row) in metrics.confusion_matrix.iter().enumerate() {
            out.push_str(CLASS_NAMES.get(label).copied().unwrap_or("?"));
            for count in row {
                out.push_str(&format!(",{count}"));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataset::InMemDataset;
    use cifar_core::ModelConfig;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_evaluate_accuracy_in_range() {
        let device = Default::default();
        let config = ModelConfig {
            num_classes: 10,
            base_channels: 4,
        };
        let model: ResNet9<TestBackend> = ResNet9::new(&config, &device);

        let items: Vec<CifarItem> = (0..12)
            .map(|i| CifarItem {
                image: vec![0.5f32; 3072],
                label: i % 10,
            })
            .collect();
        let dataset = InMemDataset::new(items);

        let evaluator = Evaluator::new(4);
        let metrics = evaluator.evaluate(&model, &dataset, &device).unwrap();

        assert_eq!(metrics.num_samples, 12);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
    }

    #[test]
    fn test_avg_loss_ignores_batch_boundaries() {
        let device = Default::default();
        let config = ModelConfig {
            num_classes: 10,
            base_channels: 4,
        };
        let model: ResNet9<TestBackend> = ResNet9::new(&config, &device);

        // Distinct images so per-sample losses differ
        let items: Vec<CifarItem> = (0..12)
            .map(|i| CifarItem {
                image: vec![i as f32 / 12.0; 3072],
                label: i % 10,
            })
            .collect();

        // 12 items in one batch versus batches of 5, 5 and 2; a
        // per-sample mean gives the same result either way
        let whole = Evaluator::new(12)
            .evaluate(&model, &InMemDataset::new(items.clone()), &device)
            .unwrap();
        let ragged = Evaluator::new(5)
            .evaluate(&model, &InMemDataset::new(items), &device)
            .unwrap();

        assert!((whole.avg_loss - ragged.avg_loss).abs() < 1e-4);
    }

    #[test]
    fn test_confusion_matrix_csv() {
        let mut metrics = EvaluationMetrics::new(NUM_CLASSES);
        metrics.update_confusion_matrix(0, 0);
        metrics.update_confusion_matrix(0, 9);

        let csv = Evaluator::confusion_matrix_csv(&metrics);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[0].contains("airplane"));
        assert!(lines[1].starts_with("airplane,1"));
        assert!(lines[1].ends_with(",1"));
    }
}
