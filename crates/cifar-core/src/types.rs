//! Core type definitions for the CIFAR-10 training project.

use serde::{Deserialize, Serialize};

/// Number of CIFAR-10 classes
pub const NUM_CLASSES: usize = 10;

/// Side length of a CIFAR-10 image in pixels
pub const IMAGE_SIDE: usize = 32;

/// Number of color channels
pub const CHANNELS: usize = 3;

/// Bytes per image in the binary batch format (planar RGB)
pub const IMAGE_BYTES: usize = IMAGE_SIDE * IMAGE_SIDE * CHANNELS;

/// CIFAR-10 class names, in label order
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Per-channel mean of the CIFAR-10 training set (RGB, values in [0, 1])
pub const CIFAR_MEAN: [f32; CHANNELS] = [0.4914, 0.4822, 0.4465];

/// Per-channel standard deviation of the CIFAR-10 training set
pub const CIFAR_STD: [f32; CHANNELS] = [0.2023, 0.1994, 0.2010];

/// Represents a CIFAR-10 class/category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CifarClass {
    /// Label index (0..10)
    pub id: usize,
    /// Human-readable name (e.g., "airplane")
    pub name: String,
}

impl CifarClass {
    /// Creates a class descriptor from a label index
    pub fn from_label(label: usize) -> Option<Self> {
        CLASS_NAMES.get(label).map(|name| Self {
            id: label,
            name: (*name).to_string(),
        })
    }

    /// Returns all ten classes in label order
    pub fn all() -> Vec<Self> {
        CLASS_NAMES
            .iter()
            .enumerate()
            .map(|(id, name)| Self {
                id,
                name: (*name).to_string(),
            })
            .collect()
    }
}

/// Data split type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSplit {
    /// Training data (data_batch_1..5.bin)
    Train,
    /// Test data (test_batch.bin)
    Test,
}

impl std::fmt::Display for DataSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSplit::Train => write!(f, "train"),
            DataSplit::Test => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names_order() {
        assert_eq!(CLASS_NAMES[0], "airplane");
        assert_eq!(CLASS_NAMES[9], "truck");
        assert_eq!(CLASS_NAMES.len(), NUM_CLASSES);
    }

    #[test]
    fn test_class_from_label() {
        let class = CifarClass::from_label(3).unwrap();
        assert_eq!(class.id, 3);
        assert_eq!(class.name, "cat");
        assert!(CifarClass::from_label(10).is_none());
    }

    #[test]
    fn test_all_classes() {
        let classes = CifarClass::all();
        assert_eq!(classes.len(), NUM_CLASSES);
        assert_eq!(classes[7].name, "horse");
    }

    #[test]
    fn test_data_split_display() {
        assert_eq!(DataSplit::Train.to_string(), "train");
        assert_eq!(DataSplit::Test.to_string(), "test");
    }

    #[test]
    fn test_image_bytes() {
        assert_eq!(IMAGE_BYTES, 3072);
    }
}
