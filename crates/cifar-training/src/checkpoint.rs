//! Model checkpointing and training state persistence.
//!
//! A checkpoint is a pair of files sharing a stem: a JSON file with the
//! training state and an `.mpk` file with the model weights.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cifar_core::{Error, Result};

use crate::model::ResNet9;

/// Training state stored alongside the model weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub learning_rate: f64,
    pub timestamp: String,
    pub metadata: CheckpointMetadata,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub num_classes: usize,
    pub base_channels: usize,
    pub num_parameters: usize,
    pub training_samples: usize,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time
    pub fn new(
        epoch: usize,
        val_loss: f64,
        val_accuracy: f64,
        learning_rate: f64,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            epoch,
            val_loss,
            val_accuracy,
            learning_rate,
            timestamp: Utc::now().to_rfc3339(),
            metadata,
        }
    }

    /// Saves the training state as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        info!("Checkpoint state saved to {}", path.display());
        Ok(())
    }

    /// Loads a training state from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&json)?;
        Ok(checkpoint)
    }
}

/// Saves model weights; the recorder appends the `.mpk` extension
pub fn save_weights<B: Backend>(model: &ResNet9<B>, stem: &Path) -> Result<()> {
    model
        .clone()
        .save_file(stem.to_path_buf(), &CompactRecorder::new())
        .map_err(|e| Error::Model(format!("Failed to save weights {}: {e:?}", stem.display())))
}

/// Loads model weights into a freshly initialized model
pub fn load_weights<B: Backend>(
    model: ResNet9<B>,
    stem: &Path,
    device: &B::Device,
) -> Result<ResNet9<B>> {
    model
        .load_file(stem.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| Error::Model(format!("Failed to load weights {}: {e:?}", stem.display())))
}

/// Manager for the checkpoint directory
pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
    keep_best: bool,
    keep_last_n: Option<usize>,
}

impl CheckpointManager {
    /// Creates a manager keeping the best checkpoint and the last three
    pub fn new(checkpoint_dir: PathBuf) -> Self {
        Self {
            checkpoint_dir,
            keep_best: true,
            keep_last_n: Some(3),
        }
    }

    /// Configures whether to track the best checkpoint
    pub fn keep_best(mut self, keep: bool) -> Self {
        self.keep_best = keep;
        self
    }

    /// Configures how many epoch checkpoints to retain
    pub fn keep_last_n(mut self, n: Option<usize>) -> Self {
        self.keep_last_n = n;
        self
    }

    /// Saves an epoch checkpoint, updating the latest and best copies
    pub fn save_checkpoint<B: Backend>(
        &self,
        checkpoint: &Checkpoint,
        model: &ResNet9<B>,
        is_best: bool,
    ) -> Result<()> {
        fs::create_dir_all(&self.checkpoint_dir)?;

        let stem = self
            .checkpoint_dir
            .join(format!("checkpoint_epoch_{}", checkpoint.epoch));
        checkpoint.save(&stem.with_extension("json"))?;
        save_weights(model, &stem)?;

        if is_best && self.keep_best {
            let best_stem = self.checkpoint_dir.join("best_model");
            checkpoint.save(&best_stem.with_extension("json"))?;
            save_weights(model, &best_stem)?;
            info!("Best model checkpoint updated (epoch {})", checkpoint.epoch);
        }

        let latest_stem = self.checkpoint_dir.join("latest");
        checkpoint.save(&latest_stem.with_extension("json"))?;
        save_weights(model, &latest_stem)?;

        if let Some(keep_n) = self.keep_last_n {
            self.cleanup_old_checkpoints(keep_n)?;
        }

        Ok(())
    }

    /// Loads the latest training state
    pub fn load_latest(&self) -> Result<Checkpoint> {
        Checkpoint::load(&self.checkpoint_dir.join("latest.json"))
    }

    /// Loads the best training state
    pub fn load_best(&self) -> Result<Checkpoint> {
        Checkpoint::load(&self.checkpoint_dir.join("best_model.json"))
    }

    /// Loads the best model weights into a fresh model
    pub fn load_best_weights<B: Backend>(
        &self,
        model: ResNet9<B>,
        device: &B::Device,
    ) -> Result<ResNet9<B>> {
        load_weights(model, &self.checkpoint_dir.join("best_model"), device)
    }

    /// Lists epoch checkpoint state files, sorted by epoch
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        if !self.checkpoint_dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.checkpoint_dir)? {
            let path = entry?.path();
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if extract_epoch_from_filename(filename).is_some() {
                checkpoints.push(path);
            }
        }

        checkpoints.sort_by_key(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .and_then(extract_epoch_from_filename)
                .unwrap_or(0)
        });

        Ok(checkpoints)
    }

    fn cleanup_old_checkpoints(&self, keep_n: usize) -> Result<()> {
        let checkpoints = self.list_checkpoints()?;
        if checkpoints.len() <= keep_n {
            return Ok(());
        }

        let to_remove = checkpoints.len() - keep_n;
        for state_path in checkpoints.iter().take(to_remove) {
            let weights_path = state_path.with_extension("mpk");
            for path in [state_path.as_path(), weights_path.as_path()] {
                if !path.exists() {
                    continue;
                }
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove old checkpoint {}: {e}", path.display());
                } else {
                    info!("Removed old checkpoint {}", path.display());
                }
            }
        }

        Ok(())
    }

    /// Checkpoint directory path
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }
}

/// Extracts the epoch number from a `checkpoint_epoch_N.json` filename
pub fn extract_epoch_from_filename(filename: &str) -> Option<usize> {
    filename
        .strip_prefix("checkpoint_epoch_")
        .and_then(|s| s.strip_suffix(".json"))
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use cifar_core::ModelConfig;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn small_model(device: &<TestBackend as Backend>::Device) -> ResNet9<TestBackend> {
        let config = ModelConfig {
            num_classes: 10,
            base_channels: 4,
        };
        ResNet9::new(&config, device)
    }

    #[test]
    fn test_checkpoint_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let original = Checkpoint::new(10, 0.5, 0.9, 0.001, CheckpointMetadata::default());
        original.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.epoch, 10);
        assert_eq!(loaded.val_accuracy, 0.9);
    }

    #[test]
    fn test_weights_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = small_model(&device);
        let stem = temp_dir.path().join("weights");

        save_weights(&model, &stem).unwrap();
        assert!(stem.with_extension("mpk").exists());

        let fresh = small_model(&device);
        let loaded = load_weights(fresh, &stem, &device).unwrap();
        assert_eq!(loaded.num_params(), model.num_params());
    }

    #[test]
    fn test_checkpoint_manager_retention() {
        let temp_dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = small_model(&device);

        let manager = CheckpointManager::new(temp_dir.path().to_path_buf())
            .keep_best(true)
            .keep_last_n(Some(2));

        for epoch in 1..=5 {
            let checkpoint = Checkpoint::new(
                epoch,
                1.0 / epoch as f64,
                0.5 + epoch as f64 * 0.05,
                0.001,
                CheckpointMetadata::default(),
            );
            manager
                .save_checkpoint(&checkpoint, &model, epoch == 5)
                .unwrap();
        }

        let checkpoints = manager.list_checkpoints().unwrap();
        assert!(checkpoints.len() <= 2);

        assert!(temp_dir.path().join("best_model.json").exists());
        assert!(temp_dir.path().join("best_model.mpk").exists());
        assert!(temp_dir.path().join("latest.json").exists());

        let latest = manager.load_latest().unwrap();
        assert_eq!(latest.epoch, 5);
        let best = manager.load_best().unwrap();
        assert_eq!(best.epoch, 5);
    }

    #[test]
    fn test_extract_epoch_from_filename() {
        assert_eq!(
            extract_epoch_from_filename("checkpoint_epoch_5.json"),
            Some(5)
        );
        assert_eq!(
            extract_epoch_from_filename("checkpoint_epoch_123.json"),
            Some(123)
        );
        assert_eq!(extract_epoch_from_filename("best_model.json"), None);
        assert_eq!(extract_epoch_from_filename("latest.json"), None);
    }
}
