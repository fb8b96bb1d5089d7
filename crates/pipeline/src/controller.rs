//! Session lifecycle controller

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use stream::StreamPublisher;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::session::{HealthStatus, LifecycleState, SessionInfo, SessionStats, SessionSummary};
use crate::worker::Worker;
use crate::{PipelineConfig, PipelineError, SessionBackend};

/// A live session as seen from the control path
struct ActiveSession {
    info: SessionInfo,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    handle: JoinHandle<()>,
    done: oneshot::Receiver<SessionSummary>,
}

/// What `health()` reads without waiting on a start or stop in progress
#[derive(Default)]
struct StatusBoard {
    current: Option<(SessionInfo, Arc<SessionStats>)>,
    last_error: Option<String>,
}

/// Starts, stops, and reports on the capture session.
///
/// At most one session exists at a time. The worker thread is the only owner
/// of the frame source; the controller talks to it through the `running`
/// flag, the readiness and completion channels, and the join handle.
pub struct PipelineController {
    backend: Arc<dyn SessionBackend>,
    publisher: StreamPublisher,
    config: PipelineConfig,
    state_tx: Arc<watch::Sender<LifecycleState>>,
    session: Mutex<Option<ActiveSession>>,
    status: StdMutex<StatusBoard>,
}

impl PipelineController {
    /// Create an idle controller
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        publisher: StreamPublisher,
        config: PipelineConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Idle);
        Self {
            backend,
            publisher,
            config,
            state_tx: Arc::new(state_tx),
            session: Mutex::new(None),
            status: StdMutex::new(StatusBoard::default()),
        }
    }

    /// Publisher shared with viewers
    pub fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    fn status(&self) -> MutexGuard<'_, StatusBoard> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the capture device and start the worker.
    ///
    /// Returns once the worker reports the source open, or with
    /// `DeviceUnavailable` if that does not happen within `open_timeout_ms`.
    pub async fn start(&self) -> Result<SessionInfo, PipelineError> {
        let mut slot = self.session.lock().await;

        if let Some(active) = slot.as_ref() {
            if !active.stats.is_finished() {
                return Err(PipelineError::SessionAlreadyActive);
            }
        }
        if let Some(stale) = slot.take() {
            warn!("Session {} ended without a stop, reaping it", stale.info.id);
            if !join_worker(stale.handle).await {
                error!("Capture worker for session {} panicked", stale.info.id);
            }
            self.status().current = None;
        }

        let mut info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            source: String::new(),
        };
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SessionStats::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let worker = Worker {
            backend: Arc::clone(&self.backend),
            publisher: self.publisher.clone(),
            config: self.config.clone(),
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            info: info.clone(),
            state: Arc::clone(&self.state_tx),
        };
        let handle = thread::Builder::new()
            .name(format!("gaze-capture-{}", &info.id.simple().to_string()[..8]))
            .spawn(move || worker.run(ready_tx, done_tx))
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;

        match timeout(self.config.open_timeout(), ready_rx).await {
            Ok(Ok(Ok(source))) => {
                info.source = source;
                let mut status = self.status();
                status.current = Some((info.clone(), Arc::clone(&stats)));
                status.last_error = None;
                drop(status);

                self.state_tx.send_replace(LifecycleState::Running);
                if stats.is_finished() {
                    // Worker died between the handshake and now
                    self.state_tx.send_replace(LifecycleState::Idle);
                }
                *slot = Some(ActiveSession {
                    info: info.clone(),
                    running,
                    stats,
                    handle,
                    done: done_rx,
                });
                info!("Session {} started", info.id);
                Ok(info)
            }
            Ok(Ok(Err(e))) => {
                join_worker(handle).await;
                Err(self.start_failed(e))
            }
            Ok(Err(_)) => {
                join_worker(handle).await;
                Err(self.start_failed(PipelineError::WorkerPanicked))
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                warn!(
                    "Capture device did not open within {:?}, detaching the worker",
                    self.config.open_timeout()
                );
                Err(self.start_failed(PipelineError::DeviceUnavailable(format!(
                    "timed out after {}ms",
                    self.config.open_timeout_ms
                ))))
            }
        }
    }

    fn start_failed(&self, e: PipelineError) -> PipelineError {
        error!("Failed to start session: {}", e);
        self.status().last_error = Some(e.to_string());
        e
    }

    /// Signal the worker to finish and wait, bounded by `stop_timeout_ms`, for it to exit.
    ///
    /// Concurrent calls are serialised; only one of them finds the session.
    pub async fn stop(&self) -> Result<SessionSummary, PipelineError> {
        let mut slot = self.session.lock().await;
        let Some(active) = slot.take() else {
            return Err(PipelineError::NoActiveSession);
        };

        self.state_tx.send_replace(LifecycleState::Stopping);
        info!("Stopping session {}", active.info.id);
        active.running.store(false, Ordering::SeqCst);

        let result = match timeout(self.config.stop_timeout(), active.done).await {
            Ok(Ok(summary)) => {
                if join_worker(active.handle).await {
                    Ok(summary)
                } else {
                    Err(PipelineError::WorkerPanicked)
                }
            }
            Ok(Err(_)) => {
                join_worker(active.handle).await;
                error!("Capture worker for session {} panicked", active.info.id);
                Err(PipelineError::WorkerPanicked)
            }
            Err(_) => {
                warn!(
                    "Capture worker did not exit within {:?}, detaching it",
                    self.config.stop_timeout()
                );
                Ok(active.stats.summary(&active.info))
            }
        };

        let mut status = self.status();
        status.current = None;
        if let Err(e) = &result {
            status.last_error = Some(e.to_string());
        }
        drop(status);

        self.state_tx.send_replace(LifecycleState::Idle);
        if let Ok(summary) = &result {
            info!(
                "Session {} stopped after {} frames",
                summary.id, summary.frames_processed
            );
        }
        result
    }

    /// Snapshot for the control surface. Never waits on a start or stop.
    pub fn health(&self) -> HealthStatus {
        let status = self.status();
        let viewers = self.publisher.viewer_count();

        match &status.current {
            Some((info, stats)) if !stats.is_finished() => HealthStatus {
                running: true,
                message: "Eye tracking is running".to_string(),
                state: self.state(),
                session_id: Some(info.id),
                frames_processed: stats.frames_processed(),
                cheating_attempts: stats.cheating_attempts(),
                viewers,
            },
            Some((info, stats)) => HealthStatus {
                running: false,
                message: "Eye tracking stopped unexpectedly".to_string(),
                state: self.state(),
                session_id: Some(info.id),
                frames_processed: stats.frames_processed(),
                cheating_attempts: stats.cheating_attempts(),
                viewers,
            },
            None => HealthStatus {
                running: false,
                message: match &status.last_error {
                    Some(e) => format!("Eye tracking is not running: {}", e),
                    None => "Eye tracking is not running".to_string(),
                },
                state: self.state(),
                session_id: None,
                frames_processed: 0,
                cheating_attempts: 0,
                viewers,
            },
        }
    }
}

/// Join the worker thread off the async runtime; false if it panicked
async fn join_worker(handle: JoinHandle<()>) -> bool {
    matches!(
        tokio::task::spawn_blocking(move || handle.join()).await,
        Ok(Ok(()))
    )
}
