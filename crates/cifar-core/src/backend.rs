//! Backend selection for the Burn framework.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};

/// Inference backend used for evaluation
pub type InferenceBackend = NdArray<f32>;

/// Training backend with autodiff support
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Returns the device used for both training and inference
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}
