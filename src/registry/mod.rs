//! Registry module orchestrator.

mod core;

pub use core::FrameRegistry;
