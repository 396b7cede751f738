//! Stage progress notifications

use crate::error::{ClusteringError, Stage};
use log::{info, warn};
use std::time::Duration;

/// Receives progress of a clustering pass. Notifications cannot affect the pass.
pub trait StageObserver {
    /// `stage` is about to run
    fn stage_started(&mut self, _stage: Stage) {}

    /// `stage` completed after `elapsed`
    fn stage_finished(&mut self, _stage: Stage, _elapsed: Duration) {}

    /// `stage` failed with `error`; the pass stops
    fn stage_failed(&mut self, _stage: Stage, _error: &ClusteringError) {}
}

/// Writes one `log` record per notification
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn stage_started(&mut self, stage: Stage) {
        info!("starting {}", stage);
    }

    fn stage_finished(&mut self, stage: Stage, elapsed: Duration) {
        info!("{} elapsed time: {:.3}s", stage, elapsed.as_secs_f64());
    }

    fn stage_failed(&mut self, stage: Stage, error: &ClusteringError) {
        warn!("{} stopped the pass: {}", stage, error);
    }
}

/// Ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl StageObserver for NoOpObserver {}
