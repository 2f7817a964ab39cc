use std::collections::HashMap;

use blake3::Hash;

use crate::layout::TextRun;

/// Cells are keyed by their top-left pixel position; the column geometry is
/// fixed, so a position identifies a cell across frames.
type CellKey = (u16, u16);

#[derive(Debug, Clone)]
struct CellState {
    hash: Hash,
    last: TextRun,
}

/// Change tracker between composed frames.
///
/// The serial channel is slow, so re-sending every cell each cycle wastes
/// most of the refresh budget. The registry hashes each cell's content and
/// color and lets only changed cells through to the sink. Cells vacated by a
/// shrinking row set are blanked by replaying their former run with empty
/// content, which repaints the background over the stale box.
#[derive(Debug, Default)]
pub struct FrameRegistry {
    cells: HashMap<CellKey, CellState>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all tracked state. The next `sync` dispatches every run.
    /// Called after the background bitmap is (re)drawn, which invalidates
    /// everything on screen.
    pub fn invalidate(&mut self) {
        self.cells.clear();
    }

    /// Fold a composed frame into the tracker, returning the runs that must
    /// be dispatched: changed or new cells in frame order, then blanking
    /// runs for cells no longer present.
    pub fn sync(&mut self, runs: &[TextRun]) -> Vec<TextRun> {
        let mut out = Vec::new();
        let mut seen: Vec<CellKey> = Vec::with_capacity(runs.len());

        for run in runs {
            let key = (run.rect.x, run.rect.y);
            seen.push(key);
            let hash = cell_hash(run);
            let changed = self
                .cells
                .get(&key)
                .map(|state| state.hash != hash)
                .unwrap_or(true);
            if changed {
                self.cells.insert(
                    key,
                    CellState {
                        hash,
                        last: run.clone(),
                    },
                );
                out.push(run.clone());
            }
        }

        let vacated: Vec<CellKey> = self
            .cells
            .keys()
            .filter(|key| !seen.contains(key))
            .copied()
            .collect();
        for key in vacated {
            if let Some(state) = self.cells.remove(&key) {
                let mut blank = state.last;
                blank.content.clear();
                out.push(blank);
            }
        }

        out
    }
}

fn cell_hash(run: &TextRun) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(run.content.as_bytes());
    hasher.update(&run.color.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rgb;
    use crate::layout::Align;
    use std::path::PathBuf;

    fn run(content: &str, x: u16, y: u16, color: Rgb) -> TextRun {
        TextRun {
            content: content.to_string(),
            rect: crate::geometry::Rect::new(x, y, 90, 30),
            align: Align::Left,
            color,
            font: PathBuf::from("f.ttf"),
            font_size: 24,
            background: Some(PathBuf::from("bg.png")),
        }
    }

    #[test]
    fn first_sync_dispatches_everything() {
        let mut registry = FrameRegistry::new();
        let runs = vec![run("101", 10, 30, Rgb::GREEN), run("web1", 60, 30, Rgb::GREEN)];
        assert_eq!(registry.sync(&runs).len(), 2);
    }

    #[test]
    fn unchanged_cells_are_skipped() {
        let mut registry = FrameRegistry::new();
        let runs = vec![run("101", 10, 30, Rgb::GREEN)];
        registry.sync(&runs);
        assert!(registry.sync(&runs).is_empty());
    }

    #[test]
    fn content_or_color_change_is_dispatched() {
        let mut registry = FrameRegistry::new();
        registry.sync(&[run("running", 390, 30, Rgb::GREEN)]);

        let changed = registry.sync(&[run("stopped", 390, 30, Rgb::RED)]);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].content, "stopped");

        // Same content, different color still repaints.
        let recolored = registry.sync(&[run("stopped", 390, 30, Rgb::GREEN)]);
        assert_eq!(recolored.len(), 1);
    }

    #[test]
    fn vacated_cells_are_blanked() {
        let mut registry = FrameRegistry::new();
        registry.sync(&[run("101", 10, 30, Rgb::GREEN), run("102", 10, 60, Rgb::GREEN)]);

        let out = registry.sync(&[run("101", 10, 30, Rgb::GREEN)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "");
        assert_eq!((out[0].rect.x, out[0].rect.y), (10, 60));

        // The blank is not re-sent on the next cycle.
        assert!(registry.sync(&[run("101", 10, 30, Rgb::GREEN)]).is_empty());
    }

    #[test]
    fn invalidate_forces_a_full_redraw() {
        let mut registry = FrameRegistry::new();
        let runs = vec![run("101", 10, 30, Rgb::GREEN)];
        registry.sync(&runs);
        registry.invalidate();
        assert_eq!(registry.sync(&runs).len(), 1);
    }
}
