//! Layout module orchestrator.
//!
//! The binary and the runtime import layout types from here while the
//! implementation details live in the private `core` module.

mod core;

pub use core::{
    Align, Assets, Frame, HEADER_X, HEADER_Y, ROW_BASE_Y, ROW_SPACING, Row, TextRun, format_cpu,
    format_mem,
};
