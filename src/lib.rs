/// CRD types for telemetry pipelines and parsers
pub mod api;

/// Condition history management (pure state transitions)
pub mod conditions;

/// Per-signal-type reconcilers
pub mod controllers;

/// Workload readiness probing
pub mod prober;

/// Flow-health evaluation via the self-monitor
pub mod selfmonitor;

/// Errors, metrics, logging, configuration
pub mod util;

pub use util::errors::{Error, Result};

#[cfg(test)]
pub mod fixtures;
