//! Session bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

/// Controller lifecycle: `Idle -> Running -> Stopping -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Running,
    Stopping,
}

/// Identity of a started session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Description of the frame source in use
    pub source: String,
}

/// Totals reported when a session stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub frames_processed: u64,
    pub frame_failures: u64,
    pub cheating_attempts: u32,
}

/// Health report for the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub running: bool,
    pub message: String,
    pub state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub frames_processed: u64,
    pub cheating_attempts: u32,
    pub viewers: usize,
}

/// Counters written by the worker and read by the control path
#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    frames_processed: AtomicU64,
    frame_failures: AtomicU64,
    cheating_attempts: AtomicU32,
    finished: AtomicBool,
}

impl SessionStats {
    pub(crate) fn frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_failed(&self) {
        self.frame_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_cheating_attempts(&self, attempts: u32) {
        self.cheating_attempts.store(attempts, Ordering::Relaxed);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub(crate) fn cheating_attempts(&self) -> u32 {
        self.cheating_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn summary(&self, info: &SessionInfo) -> SessionSummary {
        SessionSummary {
            id: info.id,
            started_at: info.started_at,
            stopped_at: Utc::now(),
            frames_processed: self.frames_processed(),
            frame_failures: self.frame_failures.load(Ordering::Relaxed),
            cheating_attempts: self.cheating_attempts(),
        }
    }
}

/// Marks the session finished when the worker exits, including by panic.
///
/// An exit while `running` is still set was not requested by `stop()`, so the
/// guard also moves a `Running` controller back to `Idle`.
pub(crate) struct FinishGuard<'a> {
    pub(crate) stats: &'a SessionStats,
    pub(crate) running: &'a AtomicBool,
    pub(crate) state: &'a watch::Sender<LifecycleState>,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.stats.mark_finished();
        if self.running.swap(false, Ordering::SeqCst) {
            self.state.send_if_modified(|state| {
                let was_running = *state == LifecycleState::Running;
                if was_running {
                    *state = LifecycleState::Idle;
                }
                was_running
            });
        }
    }
}
