//! ResNet9 model, training loop, evaluation and checkpointing for CIFAR-10.

pub mod charts;
pub mod checkpoint;
pub mod evaluator;
pub mod lr_schedule;
pub mod model;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointManager};
pub use evaluator::Evaluator;
pub use lr_schedule::LrScheduler;
pub use model::ResNet9;
pub use trainer::{TrainOutcome, Trainer};
