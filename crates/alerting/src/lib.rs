//! Attention Alerting
//!
//! Debounces the per-frame looking-away signal into cheating-attempt alerts.

mod monitor;

pub use monitor::{AlertRaised, AttentionMonitor, AttentionPhase, AttentionState, MonitorConfig};
