//! Operation-recording sink for tests and dry runs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::geometry::Rgb;
use crate::layout::TextRun;

use super::{DisplaySink, Orientation};

/// One recorded sink operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Initialize,
    Reset,
    Brightness(u8),
    Backplate(Rgb),
    Orientation(Orientation),
    Bitmap(PathBuf),
    Text(TextRun),
    Close,
}

#[derive(Debug, Default)]
struct Recording {
    ops: Vec<SinkOp>,
    closes: u32,
}

/// Simulated display: records every operation instead of touching hardware.
///
/// Clones share the same recording, so a test can keep a handle while the
/// runtime owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSink {
    inner: Arc<Mutex<Recording>>,
}

impl SimulatedSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, op: SinkOp) {
        self.inner.lock().expect("sink mutex poisoned").ops.push(op);
    }

    /// Snapshot of all operations recorded so far.
    pub fn ops(&self) -> Vec<SinkOp> {
        self.inner.lock().expect("sink mutex poisoned").ops.clone()
    }

    /// Text runs recorded so far, in dispatch order.
    pub fn texts(&self) -> Vec<TextRun> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SinkOp::Text(run) => Some(run),
                _ => None,
            })
            .collect()
    }

    /// How many times the channel has been released.
    pub fn close_count(&self) -> u32 {
        self.inner.lock().expect("sink mutex poisoned").closes
    }
}

impl DisplaySink for SimulatedSink {
    fn initialize(&mut self) -> Result<()> {
        self.record(SinkOp::Initialize);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.record(SinkOp::Reset);
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> Result<()> {
        self.record(SinkOp::Brightness(percent));
        Ok(())
    }

    fn set_backplate(&mut self, color: Rgb) -> Result<()> {
        self.record(SinkOp::Backplate(color));
        Ok(())
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.record(SinkOp::Orientation(orientation));
        Ok(())
    }

    fn display_bitmap(&mut self, path: &Path) -> Result<()> {
        self.record(SinkOp::Bitmap(path.to_path_buf()));
        Ok(())
    }

    fn display_text(&mut self, run: &TextRun) -> Result<()> {
        self.record(SinkOp::Text(run.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut guard = self.inner.lock().expect("sink mutex poisoned");
        guard.ops.push(SinkOp::Close);
        guard.closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_recording() {
        let sink = SimulatedSink::new();
        let mut handle: Box<dyn DisplaySink> = Box::new(sink.clone());
        handle.reset().unwrap();
        handle.set_brightness(10).unwrap();
        handle.close().unwrap();

        assert_eq!(sink.ops().len(), 3);
        assert_eq!(sink.close_count(), 1);
        assert_eq!(sink.ops()[1], SinkOp::Brightness(10));
    }
}
