//! Core types and utilities for CIFAR-10 classifier training.
//!
//! This crate provides the foundational types, configuration structures,
//! and metric records used across the workspace.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use backend::*;
pub use cli::*;
pub use config::*;
pub use error::{Error, Result};
pub use metrics::*;
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::metrics::*;
    pub use crate::types::*;
}
