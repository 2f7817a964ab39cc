//! guestpanel — a cluster guest status panel for serial-attached smart
//! screens.
//!
//! The crate samples a virtualization cluster's guest inventory over its
//! management API and renders a color-coded status table onto a small
//! persistent-frame display reached over a byte-oriented channel. The
//! refresh loop lives in [`runtime`]; everything else is a collaborator it
//! drives.

pub mod classify;
pub mod config;
pub mod display;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod sampler;

pub use classify::{PRODUCTION_TAG, classify, status_color};
pub use config::{DisplayRevision, PanelConfig};
pub use display::{DisplaySink, FramedSink, Orientation, SimulatedSink, SinkOp, open_sink};
pub use error::{PanelError, Result};
pub use geometry::{Rect, Rgb};
pub use layout::{Align, Assets, Frame, ROW_BASE_Y, ROW_SPACING, Row, TextRun};
pub use logging::{FileSink, LogEvent, LogLevel, Logger, StderrSink};
pub use metrics::{MetricSnapshot, PanelMetrics};
pub use model::{ClusterNode, Guest, GuestKind, GuestStatus};
pub use registry::FrameRegistry;
pub use runtime::{PanelRuntime, RuntimeOptions, StopFlag};
pub use sampler::{ClusterSampler, ProxmoxSampler};
