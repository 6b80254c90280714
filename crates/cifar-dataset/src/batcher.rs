//! Batching of CIFAR-10 items into normalized tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

use cifar_core::{CHANNELS, CIFAR_MEAN, CIFAR_STD, IMAGE_SIDE};

use crate::cifar10::CifarItem;

/// A batch of CIFAR-10 images for training or evaluation
#[derive(Clone, Debug)]
pub struct CifarBatch<B: Backend> {
    /// Normalized images with shape [batch_size, 3, 32, 32]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher converting items into normalized CHW tensors
#[derive(Clone, Debug)]
pub struct CifarBatcher {
    mean: [f32; CHANNELS],
    std: [f32; CHANNELS],
}

impl CifarBatcher {
    /// Creates a batcher normalizing with the CIFAR-10 channel statistics
    pub fn new() -> Self {
        Self {
            mean: CIFAR_MEAN,
            std: CIFAR_STD,
        }
    }

    /// Creates a batcher with custom normalization statistics
    pub fn with_stats(mean: [f32; CHANNELS], std: [f32; CHANNELS]) -> Self {
        Self { mean, std }
    }
}

impl Default for CifarBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, CifarItem, CifarBatch<B>> for CifarBatcher {
    fn batch(&self, items: Vec<CifarItem>, device: &B::Device) -> CifarBatch<B> {
        let batch_size = items.len();

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images_data, [batch_size, CHANNELS, IMAGE_SIDE, IMAGE_SIDE]),
            device,
        );

        // Per-channel normalization: (x - mean) / std, broadcast over [1, 3, 1, 1]
        let mean = Tensor::<B, 4>::from_data(
            TensorData::new(self.mean.to_vec(), [1, CHANNELS, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_data(
            TensorData::new(self.std.to_vec(), [1, CHANNELS, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        CifarBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_batch_shapes() {
        let batcher = CifarBatcher::new();
        let device = Default::default();

        let items = vec![
            CifarItem {
                image: vec![0.5f32; 3072],
                label: 1,
            },
            CifarItem {
                image: vec![0.25f32; 3072],
                label: 8,
            },
        ];

        let batch: CifarBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [2, 3, 32, 32]);
        assert_eq!(batch.targets.dims(), [2]);
    }

    #[test]
    fn test_normalization() {
        // Unit statistics leave the values untouched
        let batcher = CifarBatcher::with_stats([0.0; 3], [1.0; 3]);
        let device = Default::default();

        let items = vec![CifarItem {
            image: vec![0.5f32; 3072],
            label: 0,
        }];

        let batch: CifarBatch<TestBackend> = batcher.batch(items, &device);
        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_targets() {
        let batcher = CifarBatcher::new();
        let device = Default::default();

        let items: Vec<CifarItem> = (0..4)
            .map(|i| CifarItem {
                image: vec![0.0f32; 3072],
                label: i,
            })
            .collect();

        let batch: CifarBatch<TestBackend> = batcher.batch(items, &device);
        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![0, 1, 2, 3]);
    }
}
