use std::path::PathBuf;

use crate::classify::classify;
use crate::geometry::{Rect, Rgb};
use crate::model::Guest;

/// Vertical position of the first guest row, in pixels.
pub const ROW_BASE_Y: u16 = 30;

/// Vertical spacing between consecutive rows, in pixels.
pub const ROW_SPACING: u16 = 30;

/// Position of the timestamp header, independent of row count.
pub const HEADER_X: u16 = 10;
pub const HEADER_Y: u16 = 2;

/// Fixed column geometry, applied identically to VM and container rows.
struct Column {
    x: u16,
    width: u16,
}

const COL_VMID: Column = Column { x: 10, width: 50 };
const COL_NAME: Column = Column { x: 60, width: 300 };
const COL_MEM: Column = Column { x: 230, width: 90 };
const COL_CPU: Column = Column { x: 330, width: 90 };
const COL_STATUS: Column = Column { x: 390, width: 100 };

/// Horizontal alignment of a text run inside its bounding box.
///
/// The status column is left-aligned for both guest kinds. (The behavior this
/// panel replaced aligned VM status cells left but container status cells
/// right; one rule for both kinds is deliberate.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Static read-only assets referenced by every composed frame. The paths are
/// opaque to the panel; the display driver rasterizes them.
#[derive(Debug, Clone)]
pub struct Assets {
    pub background: PathBuf,
    pub header_font: PathBuf,
    pub header_font_size: u16,
    pub row_font: PathBuf,
    pub row_font_size: u16,
}

/// One text draw operation handed to the display sink. The sink repaints the
/// bounding box from `background` before drawing, emulating double buffering.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub content: String,
    /// Bounding box repainted before the text is drawn. A zero width means
    /// unconstrained; the driver sizes the box to the text.
    pub rect: Rect,
    pub align: Align,
    pub color: Rgb,
    pub font: PathBuf,
    pub font_size: u16,
    pub background: Option<PathBuf>,
}

/// A classified guest pinned to its vertical slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub guest: Guest,
    pub color: Rgb,
    pub y: u16,
}

/// One fully composed screen: a background plus ordered guest rows.
#[derive(Debug, Clone)]
pub struct Frame {
    pub background: PathBuf,
    pub rows: Vec<Row>,
}

impl Frame {
    /// Build a frame from an ordered guest snapshot.
    ///
    /// Guests failing classification are dropped; the survivors keep their
    /// input order and receive consecutive y offsets starting at
    /// [`ROW_BASE_Y`]. Rows are never reordered after emission.
    pub fn compose(guests: &[Guest], background: PathBuf) -> Self {
        let mut rows = Vec::new();
        let mut y = ROW_BASE_Y;
        for guest in guests {
            if let Some(color) = classify(guest) {
                rows.push(Row {
                    guest: guest.clone(),
                    color,
                    y,
                });
                y += ROW_SPACING;
            }
        }
        Self { background, rows }
    }

    /// Flatten the frame into the text runs dispatched to the sink: the
    /// timestamp header first, then five cells per row.
    pub fn text_runs(&self, timestamp: &str, assets: &Assets) -> Vec<TextRun> {
        let mut runs = Vec::with_capacity(1 + self.rows.len() * 5);
        runs.push(header_run(timestamp, assets, &self.background));
        for row in &self.rows {
            runs.extend(row_runs(row, assets, &self.background));
        }
        runs
    }
}

fn header_run(timestamp: &str, assets: &Assets, background: &PathBuf) -> TextRun {
    TextRun {
        content: timestamp.to_string(),
        rect: Rect::new(HEADER_X, HEADER_Y, 0, 0),
        align: Align::Left,
        color: Rgb::WHITE,
        font: assets.header_font.clone(),
        font_size: assets.header_font_size,
        background: Some(background.clone()),
    }
}

fn row_runs(row: &Row, assets: &Assets, background: &PathBuf) -> Vec<TextRun> {
    let cell = |column: &Column, content: String| TextRun {
        content,
        rect: Rect::new(column.x, row.y, column.width, ROW_SPACING),
        align: Align::Left,
        color: row.color,
        font: assets.row_font.clone(),
        font_size: assets.row_font_size,
        background: Some(background.clone()),
    };

    vec![
        cell(&COL_VMID, row.guest.vmid.to_string()),
        cell(&COL_NAME, row.guest.name.clone()),
        cell(&COL_MEM, format_mem(row.guest.mem)),
        cell(&COL_CPU, format_cpu(row.guest.cpu)),
        cell(&COL_STATUS, row.guest.status.as_str().to_string()),
    ]
}

/// Format a byte count as whole mebibytes, e.g. `2147483648` -> `"2048MB"`.
pub fn format_mem(bytes: u64) -> String {
    let mib = (bytes as f64 / 1_048_576.0).round() as u64;
    format!("{mib}MB")
}

/// Format a CPU fraction as a whole percentage, e.g. `0.4567` -> `"46%"`.
pub fn format_cpu(fraction: f64) -> String {
    let percent = (fraction * 100.0).round() as i64;
    format!("{percent}%")
}
