//! Metrics tracked during training and evaluation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-epoch training history, appended to as training progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Epoch numbers
    pub epochs: Vec<usize>,
    /// Training loss history
    pub train_loss: Vec<f64>,
    /// Validation loss history
    pub val_loss: Vec<f64>,
    /// Training accuracy history
    pub train_accuracy: Vec<f64>,
    /// Validation accuracy history
    pub val_accuracy: Vec<f64>,
    /// Learning rate at the end of each epoch
    pub learning_rate: Vec<f64>,
    /// Wall-clock seconds spent per epoch
    pub epoch_seconds: Vec<f64>,
}

impl TrainingHistory {
    /// Creates an empty history
    pub fn new() -> Self {
        Self {
            epochs: Vec::new(),
            train_loss: Vec::new(),
            val_loss: Vec::new(),
            train_accuracy: Vec::new(),
            val_accuracy: Vec::new(),
            learning_rate: Vec::new(),
            epoch_seconds: Vec::new(),
        }
    }

    /// Appends metrics for a completed epoch
    #[allow(clippy::too_many_arguments)]
    pub fn add_epoch(
        &mut self,
        epoch: usize,
        train_loss: f64,
        val_loss: f64,
        train_acc: f64,
        val_acc: f64,
        lr: f64,
        seconds: f64,
    ) {
        self.epochs.push(epoch);
        self.train_loss.push(train_loss);
        self.val_loss.push(val_loss);
        self.train_accuracy.push(train_acc);
        self.val_accuracy.push(val_acc);
        self.learning_rate.push(lr);
        self.epoch_seconds.push(seconds);
    }

    /// Number of recorded epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether no epochs have been recorded yet
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Best validation accuracy seen so far
    pub fn best_val_accuracy(&self) -> Option<f64> {
        self.val_accuracy
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Epoch with the best validation accuracy
    pub fn best_epoch(&self) -> Option<usize> {
        self.val_accuracy
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| self.epochs[idx])
    }

    /// Renders the history as CSV with a header row
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "epoch,train_loss,val_loss,train_accuracy,val_accuracy,learning_rate,epoch_seconds\n",
        );
        for i in 0..self.epochs.len() {
            out.push_str(&format!(
                "{},{:.6},{:.6},{:.6},{:.6},{:.8},{:.2}\n",
                self.epochs[i],
                self.train_loss[i],
                self.val_loss[i],
                self.train_accuracy[i],
                self.val_accuracy[i],
                self.learning_rate[i],
                self.epoch_seconds[i],
            ));
        }
        out
    }
}

impl Default for TrainingHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation metrics computed from a confusion matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Overall accuracy
    pub accuracy: f64,
    /// Average loss over the evaluated samples
    pub avg_loss: f64,
    /// Per-class precision
    pub per_class_precision: HashMap<usize, f64>,
    /// Per-class recall
    pub per_class_recall: HashMap<usize, f64>,
    /// Per-class F1 score
    pub per_class_f1: HashMap<usize, f64>,
    /// Confusion matrix (actual x predicted)
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Total number of samples evaluated
    pub num_samples: usize,
    /// Average inference time per batch in milliseconds
    pub avg_batch_ms: f64,
}

impl EvaluationMetrics {
    /// Creates a zeroed metrics instance for the given class count
    pub fn new(num_classes: usize) -> Self {
        Self {
            accuracy: 0.0,
            avg_loss: 0.0,
            per_class_precision: HashMap::new(),
            per_class_recall: HashMap::new(),
            per_class_f1: HashMap::new(),
            confusion_matrix: vec![vec![0; num_classes]; num_classes],
            num_samples: 0,
            avg_batch_ms: 0.0,
        }
    }

    /// Records one prediction in the confusion matrix
    pub fn update_confusion_matrix(&mut self, actual: usize, predicted: usize) {
        if actual < self.confusion_matrix.len() && predicted < self.confusion_matrix[0].len() {
            self.confusion_matrix[actual][predicted] += 1;
        }
    }

    /// Derives accuracy and per-class metrics from the confusion matrix
    pub fn compute_from_confusion_matrix(&mut self) {
        let num_classes = self.confusion_matrix.len();
        self.num_samples = self.confusion_matrix.iter().flatten().sum();

        if self.num_samples == 0 {
            return;
        }

        let correct: usize = (0..num_classes).map(|i| self.confusion_matrix[i][i]).sum();
        self.accuracy = correct as f64 / self.num_samples as f64;

        for class_id in 0..num_classes {
            let true_positives = self.confusion_matrix[class_id][class_id] as f64;
            let false_positives: f64 = (0..num_classes)
                .filter(|&i| i != class_id)
                .map(|i| self.confusion_matrix[i][class_id] as f64)
                .sum();
            let false_negatives: f64 = (0..num_classes)
                .filter(|&i| i != class_id)
                .map(|i| self.confusion_matrix[class_id][i] as f64)
                .sum();

            let precision = if true_positives + false_positives > 0.0 {
                true_positives / (true_positives + false_positives)
            } else {
                0.0
            };
            self.per_class_precision.insert(class_id, precision);

            let recall = if true_positives + false_negatives > 0.0 {
                true_positives / (true_positives + false_negatives)
            } else {
                0.0
            };
            self.per_class_recall.insert(class_id, recall);

            let f1 = if precision + recall > 0.0 {
                2.0 * (precision * recall) / (precision + recall)
            } else {
                0.0
            };
            self.per_class_f1.insert(class_id, f1);
        }
    }

    /// Macro-averaged precision
    pub fn macro_precision(&self) -> f64 {
        if self.per_class_precision.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.per_class_precision.values().sum();
        sum / self.per_class_precision.len() as f64
    }

    /// Macro-averaged recall
    pub fn macro_recall(&self) -> f64 {
        if self.per_class_recall.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.per_class_recall.values().sum();
        sum / self.per_class_recall.len() as f64
    }

    /// Macro-averaged F1 score
    pub fn macro_f1(&self) -> f64 {
        if self.per_class_f1.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.per_class_f1.values().sum();
        sum / self.per_class_f1.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_history() {
        let mut history = TrainingHistory::new();
        history.add_epoch(1, 1.0, 0.9, 0.70, 0.75, 0.001, 12.0);
        history.add_epoch(2, 0.8, 0.85, 0.75, 0.78, 0.002, 11.5);
        history.add_epoch(3, 0.6, 0.82, 0.80, 0.80, 0.001, 11.8);

        assert_eq!(history.len(), 3);
        assert_eq!(history.best_val_accuracy(), Some(0.80));
        assert_eq!(history.best_epoch(), Some(3));
    }

    #[test]
    fn test_history_csv() {
        let mut history = TrainingHistory::new();
        history.add_epoch(1, 1.0, 0.9, 0.7, 0.75, 0.001, 10.0);
        let csv = history.to_csv();
        assert!(csv.starts_with("epoch,train_loss"));
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_evaluation_metrics_creation() {
        let metrics = EvaluationMetrics::new(10);
        assert_eq!(metrics.confusion_matrix.len(), 10);
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.num_samples, 0);
    }

    #[test]
    fn test_confusion_matrix_update() {
        let mut metrics = EvaluationMetrics::new(3);
        metrics.update_confusion_matrix(0, 0);
        metrics.update_confusion_matrix(0, 1);
        metrics.update_confusion_matrix(1, 1);

        assert_eq!(metrics.confusion_matrix[0][0], 1);
        assert_eq!(metrics.confusion_matrix[0][1], 1);
        assert_eq!(metrics.confusion_matrix[1][1], 1);
    }

    #[test]
    fn test_compute_from_confusion_matrix() {
        let mut metrics = EvaluationMetrics::new(2);
        metrics.confusion_matrix = vec![vec![2, 0], vec![1, 2]];

        metrics.compute_from_confusion_matrix();

        assert_eq!(metrics.num_samples, 5);
        assert_eq!(metrics.accuracy, 0.8);
        assert!(metrics.accuracy >= 0.0 && metrics.accuracy <= 1.0);
        assert!(metrics.per_class_precision.contains_key(&0));
        assert!(metrics.per_class_recall.contains_key(&0));
    }

    #[test]
    fn test_macro_metrics() {
        let mut metrics = EvaluationMetrics::new(3);
        metrics.per_class_precision.insert(0, 0.9);
        metrics.per_class_precision.insert(1, 0.8);
        metrics.per_class_precision.insert(2, 0.7);

        assert!((metrics.macro_precision() - 0.8).abs() < 0.01);
    }
}
