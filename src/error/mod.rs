//! Error module orchestrator.
//!
//! Downstream code imports error types from here while the implementation
//! details live in the private `types` module.

mod types;

pub use types::{PanelError, Result};
