//! Configuration structures for CIFAR-10 training.

use crate::error::{Error, Result};
use crate::types::{IMAGE_SIDE, NUM_CLASSES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for model training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Model configuration
    pub model: ModelConfig,
    /// Training hyperparameters
    pub training: TrainingParams,
    /// Data configuration
    pub data: DataConfig,
    /// Output configuration
    pub output: OutputConfig,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            training: TrainingParams::default(),
            data: DataConfig::default(),
            output: OutputConfig::default(),
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Validates the full configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.num_classes == 0 {
            return Err(Error::Config("num_classes must be positive".to_string()));
        }
        self.training.validate()?;
        self.data.augmentation.validate()?;
        Ok(())
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output classes
    pub num_classes: usize,
    /// Base channel width of the first convolution stage
    pub base_channels: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: NUM_CLASSES,
            base_channels: 64,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Number of training epochs
    pub num_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Peak learning rate
    pub max_lr: f64,
    /// Optimizer type
    pub optimizer: OptimizerType,
    /// Learning rate schedule
    pub lr_schedule: LrScheduleConfig,
    /// Weight decay (L2 regularization)
    pub weight_decay: f32,
    /// Gradient clipping norm
    pub grad_clip: Option<f32>,
    /// Number of workers for data loading
    pub num_workers: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            num_epochs: 8,
            batch_size: 128,
            max_lr: 0.01,
            optimizer: OptimizerType::Adam,
            lr_schedule: LrScheduleConfig::default(),
            weight_decay: 1e-4,
            grad_clip: Some(0.1),
            num_workers: 4,
        }
    }
}

impl TrainingParams {
    /// Validates the training hyperparameters
    pub fn validate(&self) -> Result<()> {
        if self.num_epochs == 0 {
            return Err(Error::Config("num_epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".to_string()));
        }
        if self.max_lr <= 0.0 {
            return Err(Error::Config("max_lr must be positive".to_string()));
        }
        if let Some(clip) = self.grad_clip {
            if clip <= 0.0 {
                return Err(Error::Config("grad_clip must be positive".to_string()));
            }
        }
        if let LrScheduleConfig::OneCycle { pct_start, .. } = self.lr_schedule {
            if !(0.0..1.0).contains(&pct_start) {
                return Err(Error::Config(
                    "pct_start must be in [0, 1)".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Optimizer type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerType {
    /// Adam optimizer
    Adam,
    /// AdamW optimizer (decoupled weight decay)
    AdamW,
    /// SGD with momentum
    Sgd,
}

impl std::fmt::Display for OptimizerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerType::Adam => write!(f, "adam"),
            OptimizerType::AdamW => write!(f, "adamw"),
            OptimizerType::Sgd => write!(f, "sgd"),
        }
    }
}

/// Learning rate schedule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LrScheduleConfig {
    /// Constant learning rate
    Constant,
    /// One-cycle policy: linear warmup then cosine annealing
    OneCycle {
        /// Fraction of total steps spent warming up
        pct_start: f64,
        /// Initial lr = max_lr / div_factor
        div_factor: f64,
        /// Final lr = max_lr / final_div_factor
        final_div_factor: f64,
    },
    /// Cosine annealing from max_lr down to min_lr
    Cosine {
        /// Minimum learning rate
        min_lr: f64,
    },
    /// Step decay every `step_size` epochs
    Step {
        /// Epochs between decays
        step_size: usize,
        /// Decay factor
        gamma: f64,
    },
}

impl Default for LrScheduleConfig {
    fn default() -> Self {
        LrScheduleConfig::OneCycle {
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 1e4,
        }
    }
}

/// Data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory for the downloaded dataset
    pub data_dir: PathBuf,
    /// Whether to shuffle training data
    pub shuffle: bool,
    /// Augmentation parameters for the training split
    pub augmentation: AugmentationConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            shuffle: true,
            augmentation: AugmentationConfig::default(),
        }
    }
}

/// Data augmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Random crop with reflection padding
    pub random_crop: bool,
    /// Padding in pixels applied before the random crop
    pub crop_padding: usize,
    /// Horizontal flip probability
    pub horizontal_flip_prob: f32,
    /// Quarter-turn rotation probability
    pub rotation_prob: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            random_crop: true,
            crop_padding: 4,
            horizontal_flip_prob: 0.5,
            rotation_prob: 0.0,
        }
    }
}

impl AugmentationConfig {
    /// No augmentation, used for validation and test splits
    pub fn none() -> Self {
        Self {
            random_crop: false,
            crop_padding: 0,
            horizontal_flip_prob: 0.0,
            rotation_prob: 0.0,
        }
    }

    /// Validates the augmentation parameters
    pub fn validate(&self) -> Result<()> {
        // Reflection padding indexes at most one image side beyond the edge
        if self.random_crop && self.crop_padding >= IMAGE_SIDE {
            return Err(Error::Config(format!(
                "crop_padding must be below {IMAGE_SIDE}, got {}",
                self.crop_padding
            )));
        }
        for (name, prob) in [
            ("horizontal_flip_prob", self.horizontal_flip_prob),
            ("rotation_prob", self.rotation_prob),
        ] {
            if !(0.0..=1.0).contains(&prob) {
                return Err(Error::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, prob
                )));
            }
        }
        Ok(())
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for checkpoints, metrics and charts
    pub output_dir: PathBuf,
    /// How many epoch checkpoints to keep (in addition to best/latest)
    pub keep_last_n: usize,
    /// Whether to render SVG charts after training
    pub charts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            keep_last_n: 3,
            charts: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_training_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.model.num_classes, 10);
        assert_eq!(config.training.batch_size, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_epochs() {
        let mut config = TrainingConfig::default();
        config.training.num_epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_pct_start() {
        let mut config = TrainingConfig::default();
        config.training.lr_schedule = LrScheduleConfig::OneCycle {
            pct_start: 1.5,
            div_factor: 25.0,
            final_div_factor: 1e4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_optimizer_display() {
        assert_eq!(OptimizerType::Adam.to_string(), "adam");
        assert_eq!(OptimizerType::Sgd.to_string(), "sgd");
    }

    #[test]
    fn test_augmentation_none() {
        let aug = AugmentationConfig::none();
        assert!(!aug.random_crop);
        assert_eq!(aug.horizontal_flip_prob, 0.0);
        assert!(aug.validate().is_ok());
    }

    #[test]
    fn test_crop_padding_bounds() {
        let mut aug = AugmentationConfig::default();
        aug.crop_padding = IMAGE_SIDE;
        assert!(aug.validate().is_err());

        aug.crop_padding = IMAGE_SIDE - 1;
        assert!(aug.validate().is_ok());

        // Unused padding is not an error when the crop is disabled
        aug.random_crop = false;
        aug.crop_padding = IMAGE_SIDE;
        assert!(aug.validate().is_ok());
    }

    #[test]
    fn test_augmentation_invalid_prob() {
        let aug = AugmentationConfig {
            horizontal_flip_prob: 1.5,
            ..Default::default()
        };
        assert!(aug.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = TrainingConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: TrainingConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.training.batch_size, config.training.batch_size);
        assert_eq!(parsed.training.lr_schedule, config.training.lr_schedule);
    }
}
