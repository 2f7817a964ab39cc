//! Refresh loop: sample, classify, lay out, render, wait.
//!
//! Single-threaded and fully synchronous. Each iteration runs to completion;
//! the stop flag is observed only between iterations, so there is no
//! mid-render cancellation and the last render on screen is always a
//! complete frame.
//! The display channel is released through a scoped wrapper that closes the
//! sink on every exit path, error exits included.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::config::PanelConfig;
use crate::display::{DisplaySink, Orientation};
use crate::error::Result;
use crate::geometry::Rgb;
use crate::layout::{Assets, Frame};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::PanelMetrics;
use crate::model::{Guest, GuestKind};
use crate::registry::FrameRegistry;
use crate::sampler::ClusterSampler;

const LOG_TARGET: &str = "panel::runtime";
const METRICS_TARGET: &str = "panel::metrics";

/// Observable stop request shared with signal handlers.
///
/// `request_stop` only flips an atomic flag, so it is safe to invoke from a
/// signal context and idempotent under repeated delivery. It never touches
/// the display channel or any in-flight render state.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Raw flag for `signal_hook::flag::register`.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner)
    }
}

/// Knobs the runtime needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Fixed residual delay between iterations. Deliberately not
    /// elapsed-compensated: the effective period grows under slow sampling,
    /// matching the panel's long-standing behavior.
    pub interval: Duration,
    /// Interval between metric snapshot log events. Zero disables.
    pub metrics_interval: Duration,
    pub assets: Assets,
    pub brightness: u8,
    pub backplate: Rgb,
    pub orientation: Orientation,
    pub logger: Option<Logger>,
}

impl RuntimeOptions {
    pub fn from_config(config: &PanelConfig, logger: Option<Logger>) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            metrics_interval: Duration::from_secs(config.metrics_interval_secs),
            assets: config.assets(),
            brightness: config.brightness,
            backplate: config.backplate,
            orientation: config.orientation,
            logger,
        }
    }
}

pub struct PanelRuntime {
    sampler: Box<dyn ClusterSampler>,
    sink: Box<dyn DisplaySink>,
    registry: FrameRegistry,
    metrics: PanelMetrics,
    options: RuntimeOptions,
    stop: StopFlag,
    /// Decorative rolling counter, 0..=100 in steps of 2 per iteration.
    progress: u8,
    start_instant: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl PanelRuntime {
    pub fn new(
        sampler: Box<dyn ClusterSampler>,
        sink: Box<dyn DisplaySink>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            sampler,
            sink,
            registry: FrameRegistry::new(),
            metrics: PanelMetrics::new(),
            options,
            stop: StopFlag::new(),
            progress: 0,
            start_instant: None,
            last_metrics_emit: None,
        }
    }

    /// Stop handle to wire into signal handlers or other threads.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Run until a stop is requested. The display channel is closed exactly
    /// once on the way out, whether the loop ended gracefully or with an
    /// error.
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_inner(None);
        self.release(result)
    }

    /// Run at most `cycles` iterations, then shut down as `run` would. Used
    /// by tests and the `--dry-run` entry point.
    pub fn run_cycles(&mut self, cycles: usize) -> Result<()> {
        let result = self.run_inner(Some(cycles));
        self.release(result)
    }

    fn run_inner(&mut self, budget: Option<usize>) -> Result<()> {
        self.bootstrap()?;
        let mut completed = 0usize;
        loop {
            if self.finished(completed, budget) {
                break;
            }
            self.iterate()?;
            completed += 1;
            self.maybe_emit_metrics();
            // Re-check before sleeping so a stop request or a spent cycle
            // budget exits without stalling one extra interval.
            if self.finished(completed, budget) {
                break;
            }
            thread::sleep(self.options.interval);
        }
        Ok(())
    }

    fn finished(&self, completed: usize, budget: Option<usize>) -> bool {
        self.stop.is_set() || budget.is_some_and(|max| completed >= max)
    }

    /// Scoped channel release. Loop errors win over close errors so the
    /// original failure is what reaches the caller.
    fn release(&mut self, result: Result<()>) -> Result<()> {
        let closed = self.sink.close();
        let uptime_ms = self
            .start_instant
            .map(|start| start.elapsed().as_millis())
            .unwrap_or(0);
        self.log(
            LogLevel::Info,
            "loop_stopped",
            [json_kv("uptime_ms", json!(uptime_ms as u64))],
        );
        result.and(closed)
    }

    /// Bring the display to a known state and paint the background once.
    fn bootstrap(&mut self) -> Result<()> {
        let now = Instant::now();
        self.start_instant = Some(now);
        self.last_metrics_emit = Some(now);
        self.log(
            LogLevel::Info,
            "loop_started",
            [json_kv(
                "interval_ms",
                json!(self.options.interval.as_millis() as u64),
            )],
        );

        self.sink.reset()?;
        self.sink.initialize()?;
        self.sink.set_brightness(self.options.brightness)?;
        self.sink.set_backplate(self.options.backplate)?;
        self.sink.set_orientation(self.options.orientation)?;

        let started = Instant::now();
        self.sink.display_bitmap(&self.options.assets.background)?;
        self.registry.invalidate();
        self.log(
            LogLevel::Debug,
            "background_drawn",
            [json_kv(
                "elapsed_ms",
                json!(started.elapsed().as_millis() as u64),
            )],
        );
        Ok(())
    }

    /// One full SAMPLE -> CLASSIFY_AND_LAYOUT -> RENDER pass.
    fn iterate(&mut self) -> Result<()> {
        let started = Instant::now();

        let guests = self.sample()?;
        let frame = Frame::compose(&guests, self.options.assets.background.clone());
        let runs = frame.text_runs(&header_timestamp(), &self.options.assets);
        let total = runs.len();

        let changed = self.registry.sync(&runs);
        for run in &changed {
            self.sink.display_text(run)?;
        }

        let drawn = changed.len();
        self.metrics
            .record_frame(frame.rows.len(), drawn, total.saturating_sub(drawn));
        self.progress = (self.progress + 2) % 101;

        self.log(
            LogLevel::Debug,
            "frame_rendered",
            [
                json_kv("rows", json!(frame.rows.len())),
                json_kv("runs_drawn", json!(drawn)),
                json_kv("progress", json!(self.progress)),
                json_kv("elapsed_ms", json!(started.elapsed().as_millis() as u64)),
            ],
        );
        Ok(())
    }

    /// Fetch the topology once, then the guest listings: VM listings for
    /// every node first, then container listings, API order within each.
    /// This is the row order contract; classification preserves it.
    fn sample(&mut self) -> Result<Vec<Guest>> {
        let nodes = self.sampler.nodes()?;
        let mut guests = Vec::new();
        for kind in [GuestKind::Vm, GuestKind::Container] {
            for node in &nodes {
                guests.extend(self.sampler.guests(&node.id, kind)?);
            }
        }
        self.metrics.record_sample();
        Ok(guests)
    }

    fn maybe_emit_metrics(&mut self) {
        if self.options.metrics_interval.is_zero() {
            return;
        }
        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.options.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }
        let uptime = self
            .start_instant
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        if let Some(logger) = self.options.logger.as_ref() {
            logger.log_event(self.metrics.snapshot(uptime).to_log_event(METRICS_TARGET));
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.options.logger.as_ref() {
            logger.log_event(event_with_fields(level, LOG_TARGET, message, fields));
        }
    }
}

fn header_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{SimulatedSink, SinkOp};
    use crate::error::PanelError;
    use crate::model::{ClusterNode, GuestStatus};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    struct StubSampler {
        guests_by_kind: Vec<(GuestKind, Vec<Guest>)>,
        stop_on_nodes: Option<StopFlag>,
    }

    impl ClusterSampler for StubSampler {
        fn nodes(&self) -> Result<Vec<ClusterNode>> {
            if let Some(flag) = &self.stop_on_nodes {
                flag.request_stop();
            }
            Ok(vec![ClusterNode::new("pve3")])
        }

        fn guests(&self, _node: &str, kind: GuestKind) -> Result<Vec<Guest>> {
            Ok(self
                .guests_by_kind
                .iter()
                .filter(|(k, _)| *k == kind)
                .flat_map(|(_, guests)| guests.clone())
                .collect())
        }
    }

    fn guest(vmid: u32, name: &str, kind: GuestKind, status: &str, tags: &[&str]) -> Guest {
        Guest {
            vmid,
            name: name.to_string(),
            kind,
            status: GuestStatus::from_wire(status),
            cpu: 0.123,
            mem: 2_147_483_648,
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn options() -> RuntimeOptions {
        RuntimeOptions {
            interval: Duration::ZERO,
            metrics_interval: Duration::ZERO,
            assets: Assets {
                background: PathBuf::from("res/backgrounds/bg4.png"),
                header_font: PathBuf::from("res/fonts/geforce/GeForce-Bold.ttf"),
                header_font_size: 20,
                row_font: PathBuf::from("res/fonts/geforce/GeForce-Light.ttf"),
                row_font_size: 24,
            },
            brightness: 10,
            backplate: Rgb::BLACK,
            orientation: Orientation::Landscape,
            logger: None,
        }
    }

    fn runtime_with(sampler: StubSampler) -> (PanelRuntime, SimulatedSink) {
        let sink = SimulatedSink::new();
        let runtime = PanelRuntime::new(Box::new(sampler), Box::new(sink.clone()), options());
        (runtime, sink)
    }

    #[test]
    fn end_to_end_tagged_vm_untagged_container() {
        let sampler = StubSampler {
            guests_by_kind: vec![
                (
                    GuestKind::Vm,
                    vec![guest(101, "web1", GuestKind::Vm, "running", &["production"])],
                ),
                (
                    GuestKind::Container,
                    vec![guest(200, "scratch", GuestKind::Container, "running", &[])],
                ),
            ],
            stop_on_nodes: None,
        };
        let (mut runtime, sink) = runtime_with(sampler);
        runtime.run_cycles(1).unwrap();

        let texts = sink.texts();
        // Header plus five cells for the single classified row.
        assert_eq!(texts.len(), 6);
        let row_cells: Vec<(&str, u16)> = texts[1..]
            .iter()
            .map(|run| (run.content.as_str(), run.rect.y))
            .collect();
        assert_eq!(
            row_cells,
            vec![
                ("101", 30),
                ("web1", 30),
                ("2048MB", 30),
                ("12%", 30),
                ("running", 30),
            ]
        );
        for run in &texts[1..] {
            assert_eq!(run.color, Rgb::GREEN);
        }
        assert!(
            !texts.iter().any(|run| run.content == "scratch"),
            "untagged container must not produce a row"
        );
    }

    #[test]
    fn bootstrap_order_then_close_on_exit() {
        let sampler = StubSampler {
            guests_by_kind: vec![],
            stop_on_nodes: None,
        };
        let (mut runtime, sink) = runtime_with(sampler);
        runtime.run_cycles(1).unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], SinkOp::Reset);
        assert_eq!(ops[1], SinkOp::Initialize);
        assert_eq!(ops[2], SinkOp::Brightness(10));
        assert_eq!(ops[3], SinkOp::Backplate(Rgb::BLACK));
        assert_eq!(ops[4], SinkOp::Orientation(Orientation::Landscape));
        assert!(matches!(ops[5], SinkOp::Bitmap(_)));
        assert_eq!(*ops.last().unwrap(), SinkOp::Close);
        assert_eq!(sink.close_count(), 1);
    }

    #[test]
    fn repeated_stop_requests_close_the_channel_once() {
        let sampler = StubSampler {
            guests_by_kind: vec![],
            stop_on_nodes: None,
        };
        let (mut runtime, sink) = runtime_with(sampler);
        let flag = runtime.stop_flag();
        flag.request_stop();
        flag.request_stop();
        flag.request_stop();

        runtime.run().unwrap();
        assert_eq!(sink.close_count(), 1);
        // Flag was set before the first loop-top check: no frame rendered.
        assert!(sink.texts().is_empty());
    }

    #[test]
    fn in_flight_iteration_completes_after_stop_request() {
        let (mut runtime, sink) = {
            let sink = SimulatedSink::new();
            let mut runtime = PanelRuntime::new(
                Box::new(StubSampler {
                    guests_by_kind: vec![(
                        GuestKind::Vm,
                        vec![guest(101, "web1", GuestKind::Vm, "running", &["production"])],
                    )],
                    stop_on_nodes: None,
                }),
                Box::new(sink.clone()),
                options(),
            );
            // Wire the stop flag so sampling requests a stop mid-iteration.
            let flag = runtime.stop_flag();
            runtime.sampler = Box::new(StubSampler {
                guests_by_kind: vec![(
                    GuestKind::Vm,
                    vec![guest(101, "web1", GuestKind::Vm, "running", &["production"])],
                )],
                stop_on_nodes: Some(flag),
            });
            (runtime, sink)
        };

        runtime.run().unwrap();
        // The iteration that observed the stop request still rendered fully.
        assert_eq!(sink.texts().len(), 6);
        assert_eq!(sink.close_count(), 1);
    }

    struct FailingSampler;

    impl ClusterSampler for FailingSampler {
        fn nodes(&self) -> Result<Vec<ClusterNode>> {
            Err(PanelError::Transport(
                "GET https://localhost:8006/api2/json/nodes: connection refused".to_string(),
            ))
        }

        fn guests(&self, _node: &str, _kind: GuestKind) -> Result<Vec<Guest>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn transport_failure_propagates_and_still_closes_the_channel() {
        let sink = SimulatedSink::new();
        let mut runtime =
            PanelRuntime::new(Box::new(FailingSampler), Box::new(sink.clone()), options());

        let err = runtime.run().unwrap_err();
        assert!(matches!(err, PanelError::Transport(_)));
        assert_eq!(sink.close_count(), 1);
        assert_eq!(*sink.ops().last().unwrap(), SinkOp::Close);
    }

    #[test]
    fn spent_cycle_budget_skips_the_final_delay() {
        let sampler = StubSampler {
            guests_by_kind: vec![],
            stop_on_nodes: None,
        };
        let sink = SimulatedSink::new();
        let mut opts = options();
        opts.interval = Duration::from_secs(5);
        let mut runtime = PanelRuntime::new(Box::new(sampler), Box::new(sink.clone()), opts);

        let started = Instant::now();
        runtime.run_cycles(1).unwrap();
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "single-cycle run slept the cadence interval"
        );
        assert_eq!(sink.close_count(), 1);
    }

    #[test]
    fn unchanged_frames_skip_redundant_draws() {
        let sampler = StubSampler {
            guests_by_kind: vec![(
                GuestKind::Vm,
                vec![guest(101, "web1", GuestKind::Vm, "running", &["production"])],
            )],
            stop_on_nodes: None,
        };
        let (mut runtime, sink) = runtime_with(sampler);
        runtime.run_cycles(2).unwrap();

        let texts = sink.texts();
        // Second cycle re-sends at most the header (timestamp may tick);
        // the five row cells are unchanged and skipped.
        assert!(texts.len() <= 7, "expected dirty-skip, got {}", texts.len());
    }

    #[test]
    fn vm_rows_precede_container_rows() {
        let sampler = StubSampler {
            guests_by_kind: vec![
                (
                    GuestKind::Vm,
                    vec![guest(102, "api1", GuestKind::Vm, "running", &["production"])],
                ),
                (
                    GuestKind::Container,
                    vec![guest(301, "cache1", GuestKind::Container, "stopped", &["production"])],
                ),
            ],
            stop_on_nodes: None,
        };
        let (mut runtime, sink) = runtime_with(sampler);
        runtime.run_cycles(1).unwrap();

        let texts = sink.texts();
        let names: Vec<(&str, u16)> = texts
            .iter()
            .filter(|run| run.content == "api1" || run.content == "cache1")
            .map(|run| (run.content.as_str(), run.rect.y))
            .collect();
        assert_eq!(names, vec![("api1", 30), ("cache1", 60)]);

        let stopped_cell = texts.iter().find(|run| run.content == "stopped").unwrap();
        assert_eq!(stopped_cell.color, Rgb::RED);
    }
}
