//! Dataset statistics: class balance and per-channel moments.

use cifar_core::{CHANNELS, CLASS_NAMES, NUM_CLASSES};

use crate::cifar10::CifarImage;

/// Summary statistics over a set of decoded images
#[derive(Debug, Clone)]
pub struct DatasetStatistics {
    /// Total number of images
    pub num_images: usize,
    /// Images per class, in label order
    pub class_counts: [usize; NUM_CLASSES],
    /// Per-channel mean over all pixels, values in [0, 1]
    pub mean: [f32; CHANNELS],
    /// Per-channel standard deviation
    pub std: [f32; CHANNELS],
}

impl DatasetStatistics {
    /// Computes statistics over the given images
    pub fn compute(images: &[CifarImage]) -> Self {
        let mut class_counts = [0usize; NUM_CLASSES];
        let mut sum = [0.0f64; CHANNELS];
        let mut sum_sq = [0.0f64; CHANNELS];
        let mut pixel_count = 0usize;

        for image in images {
            class_counts[image.label] += 1;
            for pixel in image.data.chunks_exact(CHANNELS) {
                for c in 0..CHANNELS {
                    let v = pixel[c] as f64 / 255.0;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }
            }
            pixel_count += image.data.len() / CHANNELS;
        }

        let mut mean = [0.0f32; CHANNELS];
        let mut std = [0.0f32; CHANNELS];
        if pixel_count > 0 {
            let n = pixel_count as f64;
            for c in 0..CHANNELS {
                let m = sum[c] / n;
                mean[c] = m as f32;
                std[c] = ((sum_sq[c] / n - m * m).max(0.0)).sqrt() as f32;
            }
        }

        Self {
            num_images: images.len(),
            class_counts,
            mean,
            std,
        }
    }

    /// Whether every class has the same number of images
    pub fn is_balanced(&self) -> bool {
        match self.class_counts.iter().find(|&&c| c > 0) {
            Some(&first) => self.class_counts.iter().all(|&c| c == first),
            None => true,
        }
    }

    /// Formats a human-readable summary table
    pub fn summary(&self) -> String {
        let mut out = format!("{} images\n", self.num_images);
        for (label, count) in self.class_counts.iter().enumerate() {
            out.push_str(&format!("  {:<12} {}\n", CLASS_NAMES[label], count));
        }
        out.push_str(&format!(
            "  mean (RGB): [{:.4}, {:.4}, {:.4}]\n",
            self.mean[0], self.mean[1], self.mean[2]
        ));
        out.push_str(&format!(
            "  std  (RGB): [{:.4}, {:.4}, {:.4}]\n",
            self.std[0], self.std[1], self.std[2]
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cifar_core::IMAGE_BYTES;

    #[test]
    fn test_empty_statistics() {
        let stats = DatasetStatistics::compute(&[]);
        assert_eq!(stats.num_images, 0);
        assert!(stats.is_balanced());
        assert_eq!(stats.mean, [0.0; 3]);
    }

    #[test]
    fn test_constant_image_stats() {
        let images = vec![CifarImage {
            data: vec![255u8; IMAGE_BYTES],
            label: 0,
        }];
        let stats = DatasetStatistics::compute(&images);

        assert_eq!(stats.num_images, 1);
        assert_eq!(stats.class_counts[0], 1);
        for c in 0..3 {
            assert!((stats.mean[c] - 1.0).abs() < 1e-6);
            assert!(stats.std[c] < 1e-3);
        }
    }

    #[test]
    fn test_balance_detection() {
        let balanced: Vec<CifarImage> = (0..20)
            .map(|i| CifarImage {
                data: vec![0u8; IMAGE_BYTES],
                label: i % 10,
            })
            .collect();
        assert!(DatasetStatistics::compute(&balanced).is_balanced());

        let skewed: Vec<CifarImage> = (0..21)
            .map(|i| CifarImage {
                data: vec![0u8; IMAGE_BYTES],
                label: i % 10,
            })
            .collect();
        assert!(!DatasetStatistics::compute(&skewed).is_balanced());
    }
}
