//! Display sink capability interface.
//!
//! The physical smart-screen driver lives on the far side of a byte-oriented
//! channel; this module owns the capability surface the runtime is allowed to
//! touch. Exactly one owner writes to the channel at any time — the runtime
//! holds the boxed sink exclusively and signal handlers never reach it.

use std::fs::OpenOptions;
use std::path::Path;

use serde::Deserialize;

use crate::config::{DisplayRevision, PanelConfig};
use crate::error::Result;
use crate::geometry::Rgb;
use crate::layout::TextRun;

mod framed;
mod simulated;

pub use framed::FramedSink;
pub use simulated::{SimulatedSink, SinkOp};

/// Screen orientation, resolved once at startup and never switched at
/// runtime. Hardware starts in portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

impl Orientation {
    pub(crate) fn wire_code(&self) -> u8 {
        match self {
            Orientation::Portrait => 0,
            Orientation::Landscape => 1,
            Orientation::ReversePortrait => 2,
            Orientation::ReverseLandscape => 3,
        }
    }
}

/// Capability set consumed from the external display driver.
///
/// `display_text` repaints the run's bounding box from its background image
/// before drawing, so callers get double-buffer semantics per text run
/// without owning a framebuffer.
pub trait DisplaySink: Send {
    fn initialize(&mut self) -> Result<()>;

    /// Return the panel to a known state; also clears the screen.
    fn reset(&mut self) -> Result<()>;

    fn set_brightness(&mut self, percent: u8) -> Result<()>;

    /// Backplate LED color, a no-op on hardware without one.
    fn set_backplate(&mut self, color: Rgb) -> Result<()>;

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()>;

    /// Draw a full-frame background image.
    fn display_bitmap(&mut self, path: &Path) -> Result<()>;

    /// Draw one text run.
    fn display_text(&mut self, run: &TextRun) -> Result<()>;

    /// Release the channel. The runtime guarantees this is called exactly
    /// once on every exit path.
    fn close(&mut self) -> Result<()>;
}

/// Resolve the configured revision into a live sink.
///
/// The revision string has already been validated by the configuration
/// layer, so reaching this function with hardware revisions means the
/// channel may be opened. Opening the channel is the first hardware I/O the
/// process performs.
pub fn open_sink(config: &PanelConfig) -> Result<Box<dyn DisplaySink>> {
    let revision = config.resolved_revision()?;
    match revision {
        DisplayRevision::Simulated => Ok(Box::new(SimulatedSink::new())),
        hardware => {
            let channel = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&config.channel)?;
            Ok(Box::new(FramedSink::new(
                Box::new(channel),
                hardware,
                config.width,
                config.height,
            )))
        }
    }
}
