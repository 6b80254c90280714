//! CIFAR-10 binary batch decoding and the Burn dataset wrapper.
//!
//! The binary format stores each record as one label byte followed by
//! 3072 image bytes in planar order (1024 red, 1024 green, 1024 blue).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use burn::data::dataset::Dataset;
use tracing::info;

use cifar_core::{DataSplit, Error, Result, CLASS_NAMES, IMAGE_BYTES, IMAGE_SIDE, NUM_CLASSES};

use crate::augmentation::{image_to_chw_floats, rgb_image_from_bytes, AugmentationPipeline};

/// Records per binary batch file
const RECORDS_PER_FILE: usize = 10_000;

/// Bytes per record: one label byte plus the planar image
const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

/// Single decoded CIFAR-10 image
#[derive(Debug, Clone)]
pub struct CifarImage {
    /// Interleaved RGB bytes, row-major (3072 values)
    pub data: Vec<u8>,
    /// Class label (0..10)
    pub label: usize,
}

impl CifarImage {
    /// Human-readable class name for this image's label
    pub fn class_name(&self) -> &'static str {
        CLASS_NAMES[self.label]
    }
}

/// Sample handed to the batcher: CHW floats in [0, 1] plus the label
#[derive(Debug, Clone)]
pub struct CifarItem {
    /// Image as CHW floats, length 3 * 32 * 32
    pub image: Vec<f32>,
    /// Class label (0..10)
    pub label: usize,
}

/// In-memory CIFAR-10 split with on-the-fly augmentation
pub struct CifarDataset {
    images: Vec<CifarImage>,
    split: DataSplit,
    augmentation: AugmentationPipeline,
}

impl CifarDataset {
    /// Loads a split from the extracted binary batch files.
    ///
    /// The training split concatenates `data_batch_1.bin` through
    /// `data_batch_5.bin`; the test split reads `test_batch.bin`.
    pub fn load(
        batches_dir: &Path,
        split: DataSplit,
        augmentation: AugmentationPipeline,
    ) -> Result<Self> {
        let mut images = Vec::new();

        match split {
            DataSplit::Train => {
                for i in 1..=5 {
                    let path = batches_dir.join(format!("data_batch_{i}.bin"));
                    images.extend(load_batch_file(&path)?);
                }
            }
            DataSplit::Test => {
                let path = batches_dir.join("test_batch.bin");
                images = load_batch_file(&path)?;
            }
        }

        info!("Loaded {} {} images", images.len(), split);

        Ok(Self {
            images,
            split,
            augmentation,
        })
    }

    /// Builds a dataset directly from decoded images, used in tests and
    /// for custom subsets.
    pub fn from_images(
        images: Vec<CifarImage>,
        split: DataSplit,
        augmentation: AugmentationPipeline,
    ) -> Self {
        Self {
            images,
            split,
            augmentation,
        }
    }

    /// Which split this dataset holds
    pub fn split(&self) -> DataSplit {
        self.split
    }

    /// Raw decoded images, before augmentation
    pub fn images(&self) -> &[CifarImage] {
        &self.images
    }

    /// Number of images per class, in label order
    pub fn class_distribution(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for image in &self.images {
            counts[image.label] += 1;
        }
        counts
    }
}

impl Dataset<CifarItem> for CifarDataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        let image = self.images.get(index)?;
        let rgb = rgb_image_from_bytes(&image.data)?;
        let augmented = self.augmentation.augment(&rgb);

        Some(CifarItem {
            image: image_to_chw_floats(&augmented),
            label: image.label,
        })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// Decodes a single binary batch file into interleaved RGB images
pub fn load_batch_file(path: &Path) -> Result<Vec<CifarImage>> {
    let mut file = File::open(path)
        .map_err(|e| Error::Dataset(format!("Failed to open {}: {e}", path.display())))?;

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    if buffer.len() != RECORD_BYTES * RECORDS_PER_FILE {
        return Err(Error::Dataset(format!(
            "Unexpected size for {}: expected {} bytes, got {}",
            path.display(),
            RECORD_BYTES * RECORDS_PER_FILE,
            buffer.len()
        )));
    }

    let plane = IMAGE_SIDE * IMAGE_SIDE;
    let mut images = Vec::with_capacity(RECORDS_PER_FILE);

    for record in buffer.chunks_exact(RECORD_BYTES) {
        let label = record[0] as usize;
        if label >= NUM_CLASSES {
            return Err(Error::Dataset(format!(
                "Label {} out of range in {}",
                label,
                path.display()
            )));
        }

        // Planar to interleaved
        let pixels = &record[1..];
        let mut data = vec![0u8; IMAGE_BYTES];
        for j in 0..plane {
            data[j * 3] = pixels[j];
            data[j * 3 + 1] = pixels[plane + j];
            data[j * 3 + 2] = pixels[2 * plane + j];
        }

        images.push(CifarImage { data, label });
    }

    Ok(images)
}
