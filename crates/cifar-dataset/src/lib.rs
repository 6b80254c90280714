//! CIFAR-10 dataset handling: download, decoding, augmentation and batching.

pub mod augmentation;
pub mod batcher;
pub mod cifar10;
pub mod download;
pub mod statistics;

pub use augmentation::AugmentationPipeline;
pub use batcher::{CifarBatch, CifarBatcher};
pub use cifar10::{CifarDataset, CifarImage, CifarItem};
pub use download::ensure_dataset;
pub use statistics::DatasetStatistics;
