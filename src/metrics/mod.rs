use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated across refresh iterations.
#[derive(Debug, Default, Clone)]
pub struct PanelMetrics {
    samples: u64,
    frames: u64,
    rows: u64,
    runs_drawn: u64,
    runs_skipped: u64,
}

impl PanelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&mut self) {
        self.samples = self.samples.saturating_add(1);
    }

    pub fn record_frame(&mut self, rows: usize, drawn: usize, skipped: usize) {
        self.frames = self.frames.saturating_add(1);
        self.rows = self.rows.saturating_add(rows as u64);
        self.runs_drawn = self.runs_drawn.saturating_add(drawn as u64);
        self.runs_skipped = self.runs_skipped.saturating_add(skipped as u64);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            samples: self.samples,
            frames: self.frames,
            rows: self.rows,
            runs_drawn: self.runs_drawn,
            runs_skipped: self.runs_skipped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub samples: u64,
    pub frames: u64,
    pub rows: u64,
    pub runs_drawn: u64,
    pub runs_skipped: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        let mut event = LogEvent::new(LogLevel::Info, target, "panel_metrics");
        let mut fields = LogFields::new();
        fields.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        fields.insert("samples".to_string(), json!(self.samples));
        fields.insert("frames".to_string(), json!(self.frames));
        fields.insert("rows".to_string(), json!(self.rows));
        fields.insert("runs_drawn".to_string(), json!(self.runs_drawn));
        fields.insert("runs_skipped".to_string(), json!(self.runs_skipped));
        event.fields = fields;
        event
    }
}
