//! Typed progress events emitted while a run advances.
//!
//! The orchestrator reports each stage transition as a [`ProgressEvent`] to an
//! [`Arc<dyn ProgressSink>`]. Emission is synchronous and must not block: the
//! sink decides how to render. The CLI wires a
//! [`tokio::sync::mpsc::UnboundedSender`] so that the run can live on a
//! background task while the foreground loop draws a progress bar.
//!
//! # Example
//!
//! ```rust
//! use pdf_optimizer::{ProgressEvent, ProgressSink};
//! use std::sync::Arc;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
//! let sink: Arc<dyn ProgressSink> = Arc::new(tx);
//! sink.emit(ProgressEvent::saving(0, 1, "Saving optimised PDF"));
//! assert_eq!(rx.try_recv().unwrap().stage(), pdf_optimizer::Stage::Saving);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Global stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extracting,
    Processing,
    Translating,
    Saving,
    Complete,
}

impl Stage {
    /// Percentage the shell shows when a stage starts.
    pub fn base_percent(self) -> f32 {
        match self {
            Stage::Extracting => 10.0,
            Stage::Processing => 40.0,
            Stage::Translating => 70.0,
            Stage::Saving => 90.0,
            Stage::Complete => 100.0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extracting => "extracting",
            Stage::Processing => "processing",
            Stage::Translating => "translating",
            Stage::Saving => "saving",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Position within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressEvent {
    Extracting(Progress),
    Processing(Progress),
    Translating(Progress),
    Saving(Progress),
    Complete(Progress),
}

impl ProgressEvent {
    fn progress_of(current: usize, total: usize, message: impl Into<String>) -> Progress {
        Progress {
            current,
            total,
            message: message.into(),
        }
    }

    pub fn extracting(current: usize, total: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Extracting(Self::progress_of(current, total, message))
    }

    pub fn processing(current: usize, total: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Processing(Self::progress_of(current, total, message))
    }

    pub fn translating(current: usize, total: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Translating(Self::progress_of(current, total, message))
    }

    pub fn saving(current: usize, total: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Saving(Self::progress_of(current, total, message))
    }

    pub fn complete(message: impl Into<String>) -> Self {
        ProgressEvent::Complete(Self::progress_of(1, 1, message))
    }

    pub fn stage(&self) -> Stage {
        match self {
            ProgressEvent::Extracting(_) => Stage::Extracting,
            ProgressEvent::Processing(_) => Stage::Processing,
            ProgressEvent::Translating(_) => Stage::Translating,
            ProgressEvent::Saving(_) => Stage::Saving,
            ProgressEvent::Complete(_) => Stage::Complete,
        }
    }

    pub fn progress(&self) -> &Progress {
        match self {
            ProgressEvent::Extracting(p)
            | ProgressEvent::Processing(p)
            | ProgressEvent::Translating(p)
            | ProgressEvent::Saving(p)
            | ProgressEvent::Complete(p) => p,
        }
    }
}

/// Receives progress events from the pipeline.
///
/// Implementations must be `Send + Sync` (events are emitted from the
/// blocking rasterisation thread as well as the async run) and must return
/// promptly.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// A sink that drops every event.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A closed receiver means nobody is watching any more.
        let _ = self.send(event);
    }
}

/// Convenience alias for the shared sink type.
pub type SharedProgress = Arc<dyn ProgressSink>;

/// Shell-side percentage estimate.
///
/// Real events move the estimate to `base + 30 * current / total`; between
/// events the shell calls [`ProgressEstimate::tick`] on a fixed interval,
/// which creeps forward by one point but never reaches [`Self::TICK_CEILING`].
/// Only a [`Stage::Complete`] event reaches 100.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimate {
    percent: f32,
    status: String,
    finished: bool,
}

impl ProgressEstimate {
    /// Heuristic ticks stop here.
    pub const TICK_CEILING: f32 = 90.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fold a real event into the estimate.
    pub fn apply(&mut self, event: &ProgressEvent) {
        let stage = event.stage();
        let p = event.progress();

        if stage == Stage::Complete {
            self.percent = 100.0;
            self.finished = true;
        } else {
            let mut value = stage.base_percent();
            if p.current > 0 && p.total > 0 {
                value += (p.current as f32 / p.total as f32) * 30.0;
            }
            // Stay below 100 until the run says it is done.
            self.percent = value.min(99.0);
        }

        self.status = if p.message.is_empty() {
            stage.to_string()
        } else {
            format!("{} ({}/{})", p.message, p.current, p.total)
        };
    }

    /// Heuristic advance when no real update arrived.
    pub fn tick(&mut self) {
        if !self.finished && self.percent < Self::TICK_CEILING {
            self.percent = (self.percent + 1.0).min(Self::TICK_CEILING - 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn emit(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let sink = NoopProgress;
        sink.emit(ProgressEvent::extracting(0, 3, "start"));
        sink.emit(ProgressEvent::complete("done"));
    }

    #[test]
    fn arc_dyn_sink_records_events() {
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let sink: SharedProgress = rec.clone();
        sink.emit(ProgressEvent::processing(1, 2, "page 2/2"));
        let events = rec.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Stage::Processing);
        assert_eq!(events[0].progress().current, 1);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ProgressEvent::saving(0, 1, "saving"));
    }

    #[test]
    fn estimate_maps_stage_and_fraction() {
        let mut est = ProgressEstimate::new();
        est.apply(&ProgressEvent::processing(1, 2, "Processing page 2/2"));
        assert!((est.percent() - 55.0).abs() < 0.01);
        assert_eq!(est.status(), "Processing page 2/2 (1/2)");

        est.apply(&ProgressEvent::extracting(0, 4, ""));
        assert!((est.percent() - 10.0).abs() < 0.01);
        assert_eq!(est.status(), "extracting");
    }

    #[test]
    fn ticks_never_reach_ceiling_before_complete() {
        let mut est = ProgressEstimate::new();
        for _ in 0..500 {
            est.tick();
        }
        assert!(est.percent() < ProgressEstimate::TICK_CEILING);
        assert!(!est.is_finished());

        est.apply(&ProgressEvent::complete("done"));
        assert_eq!(est.percent(), 100.0);
        est.tick();
        assert_eq!(est.percent(), 100.0);
    }

    #[test]
    fn ticks_do_not_pull_real_progress_down() {
        let mut est = ProgressEstimate::new();
        est.apply(&ProgressEvent::saving(1, 1, "saved"));
        let before = est.percent();
        est.tick();
        assert_eq!(est.percent(), before);
    }
}
