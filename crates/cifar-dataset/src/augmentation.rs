//! Data augmentation for CIFAR-10 training images.
//!
//! Augmentations operate on 32x32 RGB images and are applied on the fly
//! when a training sample is fetched.

use image::{ImageBuffer, RgbImage};
use rand::Rng;

use cifar_core::{AugmentationConfig, IMAGE_SIDE};

/// Augmentation pipeline for CIFAR-10 images
#[derive(Debug, Clone)]
pub struct AugmentationPipeline {
    config: AugmentationConfig,
}

impl AugmentationPipeline {
    /// Creates a new augmentation pipeline with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Standard training-time pipeline: padded random crop plus flips
    pub fn train_default() -> Self {
        Self::new(AugmentationConfig::default())
    }

    /// Identity pipeline for validation and test data
    pub fn none() -> Self {
        Self::new(AugmentationConfig::none())
    }

    /// Applies augmentation to a single image
    pub fn augment(&self, image: &RgbImage) -> RgbImage {
        let mut rng = rand::thread_rng();
        let mut augmented = image.clone();

        if self.config.random_crop && self.config.crop_padding > 0 {
            augmented = self.padded_random_crop(&augmented, &mut rng);
        }

        if self.config.horizontal_flip_prob > 0.0
            && rng.gen_bool(self.config.horizontal_flip_prob as f64)
        {
            augmented = image::imageops::flip_horizontal(&augmented);
        }

        if self.config.rotation_prob > 0.0 && rng.gen_bool(self.config.rotation_prob as f64) {
            augmented = self.random_quarter_rotation(&augmented, &mut rng);
        }

        augmented
    }

    /// Pads the image by reflection and crops a random window of the
    /// original size.
    fn padded_random_crop(&self, image: &RgbImage, rng: &mut rand::rngs::ThreadRng) -> RgbImage {
        let pad = self.config.crop_padding as i64;
        let side = IMAGE_SIDE as i64;

        let dx = rng.gen_range(0..=2 * pad);
        let dy = rng.gen_range(0..=2 * pad);

        ImageBuffer::from_fn(IMAGE_SIDE as u32, IMAGE_SIDE as u32, |x, y| {
            let src_x = reflect_index(x as i64 + dx - pad, side);
            let src_y = reflect_index(y as i64 + dy - pad, side);
            *image.get_pixel(src_x as u32, src_y as u32)
        })
    }

    /// Rotates the image by a random multiple of 90 degrees
    fn random_quarter_rotation(
        &self,
        image: &RgbImage,
        rng: &mut rand::rngs::ThreadRng,
    ) -> RgbImage {
        match rng.gen_range(1..=3) {
            1 => image::imageops::rotate90(image),
            2 => image::imageops::rotate180(image),
            _ => image::imageops::rotate270(image),
        }
    }
}

/// Reflects an out-of-bounds coordinate back into [0, side)
fn reflect_index(p: i64, side: i64) -> i64 {
    if p < 0 {
        -p
    } else if p >= side {
        2 * side - p - 2
    } else {
        p
    }
}

/// Converts interleaved RGB bytes into an image buffer
pub fn rgb_image_from_bytes(data: &[u8]) -> Option<RgbImage> {
    RgbImage::from_raw(IMAGE_SIDE as u32, IMAGE_SIDE as u32, data.to_vec())
}

/// Converts an image buffer back to CHW floats in [0, 1]
pub fn image_to_chw_floats(image: &RgbImage) -> Vec<f32> {
    let mut out = vec![0.0f32; 3 * IMAGE_SIDE * IMAGE_SIDE];
    for (x, y, pixel) in image.enumerate_pixels() {
        let idx = y as usize * IMAGE_SIDE + x as usize;
        for c in 0..3 {
            out[c * IMAGE_SIDE * IMAGE_SIDE + idx] = pixel[c] as f32 / 255.0;
        }
    }
    out
}
