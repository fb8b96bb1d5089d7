//! Attention Monitor Implementation

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// An alert is raised once the away run exceeds this many frames (default: 15)
    pub away_frame_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            away_frame_threshold: 15,
        }
    }
}

impl MonitorConfig {
    /// Alert after a short glance away
    pub fn strict() -> Self {
        Self {
            away_frame_threshold: 8,
        }
    }

    /// Tolerate longer glances away
    pub fn lenient() -> Self {
        Self {
            away_frame_threshold: 30,
        }
    }
}

/// A debounce threshold crossing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRaised {
    /// Session attempt count including this one
    pub attempt_number: u32,
    pub message: String,
}

impl AlertRaised {
    /// Create the alert for `attempt_number`
    pub fn new(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            message: format!("Cheating attempt {} detected", attempt_number),
        }
    }
}

/// Coarse view of the monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionPhase {
    Attentive,
    Away,
}

/// Running counters of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionState {
    /// Length of the current looking-away run since the last reset
    pub consecutive_away_frames: u32,
    /// Alerts raised this session, never decreases
    pub cheating_attempts: u32,
}

impl AttentionState {
    /// Pure per-frame transition.
    ///
    /// An attentive frame clears the run. An away frame extends it, and once
    /// the run exceeds `threshold` an alert is raised and the run starts over,
    /// so a sustained away condition alerts every `threshold + 1` frames.
    pub fn step(self, looking_away: bool, threshold: u32) -> (AttentionState, Option<AlertRaised>) {
        if !looking_away {
            return (
                AttentionState {
                    consecutive_away_frames: 0,
                    ..self
                },
                None,
            );
        }

        let run = self.consecutive_away_frames.saturating_add(1);
        if run > threshold {
            let attempts = self.cheating_attempts.saturating_add(1);
            (
                AttentionState {
                    consecutive_away_frames: 0,
                    cheating_attempts: attempts,
                },
                Some(AlertRaised::new(attempts)),
            )
        } else {
            (
                AttentionState {
                    consecutive_away_frames: run,
                    ..self
                },
                None,
            )
        }
    }

    /// Phase implied by the current run
    pub fn phase(&self) -> AttentionPhase {
        if self.consecutive_away_frames > 0 {
            AttentionPhase::Away
        } else {
            AttentionPhase::Attentive
        }
    }
}

/// Debounces the per-frame looking-away signal into discrete alerts
pub struct AttentionMonitor {
    config: MonitorConfig,
    state: AttentionState,
}

impl AttentionMonitor {
    /// Create a monitor with zeroed counters
    pub fn new(config: MonitorConfig) -> Self {
        debug!("Creating attention monitor with config: {:?}", config);
        Self {
            config,
            state: AttentionState::default(),
        }
    }

    /// Feed one classified frame
    pub fn observe(&mut self, looking_away: bool) -> Option<AlertRaised> {
        let (next, alert) = self.state.step(looking_away, self.config.away_frame_threshold);
        self.state = next;
        if let Some(alert) = &alert {
            info!("{}", alert.message);
        }
        alert
    }

    /// Current counters
    pub fn state(&self) -> AttentionState {
        self.state
    }

    /// Current phase
    pub fn phase(&self) -> AttentionPhase {
        self.state.phase()
    }

    /// Discard all counters
    pub fn reset(&mut self) {
        self.state = AttentionState::default();
    }
}

impl Default for AttentionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}
