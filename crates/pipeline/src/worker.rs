//! Capture worker loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use alerting::{AttentionMonitor, MonitorConfig};
use camera_capture::FrameSource;
use gaze::GazeClassifier;
use metrics::{counter, histogram};
use storage::AttemptLog;
use stream::{annotate, StreamPublisher};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::session::{FinishGuard, LifecycleState, SessionInfo, SessionStats, SessionSummary};
use crate::{PipelineConfig, PipelineError, SessionBackend};

/// Readiness report: the source description once the session is live
pub(crate) type ReadySender = oneshot::Sender<Result<String, PipelineError>>;

/// Everything the worker thread owns for one session
pub(crate) struct Worker {
    pub(crate) backend: Arc<dyn SessionBackend>,
    pub(crate) publisher: StreamPublisher,
    pub(crate) config: PipelineConfig,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) stats: Arc<SessionStats>,
    pub(crate) info: SessionInfo,
    pub(crate) state: Arc<watch::Sender<LifecycleState>>,
}

impl Worker {
    /// Open the session resources, report readiness, then loop until `running` clears.
    ///
    /// The frame source is released here, after the last iteration, and only
    /// then is the completion report sent.
    pub(crate) fn run(self, ready: ReadySender, done: oneshot::Sender<SessionSummary>) {
        let _guard = FinishGuard {
            stats: &self.stats,
            running: &self.running,
            state: &self.state,
        };

        let mut source = match self.backend.open_source() {
            Ok(source) => source,
            Err(e) => {
                let _ = ready.send(Err(PipelineError::DeviceUnavailable(e.to_string())));
                return;
            }
        };

        let classifier = match self.backend.build_classifier() {
            Ok(classifier) => classifier,
            Err(e) => {
                source.release();
                let _ = ready.send(Err(PipelineError::Detector(e.to_string())));
                return;
            }
        };

        let log = match AttemptLog::open(&self.config.attempt_log_path) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!("Attempt log unavailable, alerts will not be persisted: {}", e);
                None
            }
        };

        let description = source.describe();
        if ready.send(Ok(description.clone())).is_err() {
            warn!("Session {} abandoned before it started", self.info.id);
            source.release();
            return;
        }

        info!("Session {} capturing from {}", self.info.id, description);
        let mut monitor = AttentionMonitor::new(MonitorConfig {
            away_frame_threshold: self.config.away_frame_threshold,
        });

        while self.running.load(Ordering::SeqCst) {
            self.tick(&mut source, &classifier, &mut monitor, log.as_ref());
            thread::sleep(self.config.frame_interval());
        }

        source.release();
        let summary = self.stats.summary(&self.info);
        info!(
            "Session {} finished: {} frames, {} cheating attempts",
            self.info.id, summary.frames_processed, summary.cheating_attempts
        );
        let _ = done.send(summary);
    }

    /// One capture-classify-publish iteration; every failure is logged and absorbed
    fn tick(
        &self,
        source: &mut Box<dyn FrameSource>,
        classifier: &GazeClassifier,
        monitor: &mut AttentionMonitor,
        log: Option<&AttemptLog>,
    ) {
        let started = Instant::now();

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame acquisition failed: {}", e);
                counter!("gaze_frame_failures_total").increment(1);
                self.stats.frame_failed();
                return;
            }
        };

        let analysis = match classifier.classify(&frame) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.sequence, e);
                counter!("gaze_frame_failures_total").increment(1);
                self.stats.frame_failed();
                return;
            }
        };
        self.stats.frame_processed();
        counter!("gaze_frames_processed_total").increment(1);

        if let Some(alert) = monitor.observe(analysis.result.looking_away) {
            self.stats.set_cheating_attempts(monitor.state().cheating_attempts);
            counter!("gaze_alerts_total").increment(1);
            if let Some(log) = log {
                if let Err(e) = log.record(alert.attempt_number) {
                    warn!("Failed to persist attempt {}: {}", alert.attempt_number, e);
                }
            }
            self.publisher.publish_alert(&alert);
        }

        if self.publisher.viewer_count() > 0 {
            match frame.to_rgb_image() {
                Some(mut rgb) => {
                    annotate(&mut rgb, &analysis, classifier.roi_margin());
                    if let Err(e) = self.publisher.publish_frame(&rgb) {
                        warn!("Failed to publish frame {}: {}", frame.sequence, e);
                        counter!("gaze_publish_failures_total").increment(1);
                    }
                }
                None => {
                    warn!("Frame {} has an inconsistent buffer size", frame.sequence);
                    counter!("gaze_publish_failures_total").increment(1);
                }
            }
        }
        self.publisher.publish_status(&analysis.result);

        debug!("Frame {} classified: {:?}", frame.sequence, analysis.result);
        histogram!("gaze_frame_processing_seconds").record(started.elapsed().as_secs_f64());
    }
}
