//! Condition history management.
//!
//! Conditions fall into two kinds. Transition-log types (`Pending`,
//! `Running`) record the readiness history of a pipeline as an append-only
//! log, reset when a fresh Pending/Running cycle begins. Gauge types
//! (`TelemetryFlowHealthy`) always reflect the latest verdict and are
//! replaced in place. All functions here are pure; persistence is the
//! reconcilers' concern.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::selfmonitor::flow_health::FlowHealthVerdict;
use crate::util::status::set_status_condition;

// Condition types
pub const TYPE_PENDING: &str = "Pending";
pub const TYPE_RUNNING: &str = "Running";
pub const TYPE_FLOW_HEALTHY: &str = "TelemetryFlowHealthy";

// Readiness reasons, part of the external contract consumed by dashboards
pub const REASON_FLUENT_BIT_DS_NOT_READY: &str = "FluentBitDaemonSetNotReady";
pub const REASON_FLUENT_BIT_DS_READY: &str = "FluentBitDaemonSetReady";
pub const REASON_METRIC_GATEWAY_NOT_READY: &str = "MetricGatewayDeploymentNotReady";
pub const REASON_METRIC_GATEWAY_READY: &str = "MetricGatewayDeploymentReady";
pub const REASON_TRACE_GATEWAY_NOT_READY: &str = "TraceGatewayDeploymentNotReady";
pub const REASON_TRACE_GATEWAY_READY: &str = "TraceGatewayDeploymentReady";

// Flow-health reasons
pub const REASON_FLOW_HEALTHY: &str = "FlowHealthy";
pub const REASON_SELF_MONITOR_PROBING_FAILED: &str = "SelfMonitorProbingFailed";

/// Tags a condition type with its history semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionKind {
    /// Appended to the history; consecutive duplicates collapse
    TransitionLog,
    /// Replaced in place; at most one entry per type
    Gauge,
}

pub fn kind_of(condition_type: &str) -> ConditionKind {
    match condition_type {
        TYPE_PENDING | TYPE_RUNNING => ConditionKind::TransitionLog,
        _ => ConditionKind::Gauge,
    }
}

fn message_for(reason: &str) -> String {
    match reason {
        REASON_FLUENT_BIT_DS_NOT_READY => "Fluent Bit DaemonSet is not ready",
        REASON_FLUENT_BIT_DS_READY => "Fluent Bit DaemonSet is ready",
        REASON_METRIC_GATEWAY_NOT_READY => "Metric gateway Deployment is not ready",
        REASON_METRIC_GATEWAY_READY => "Metric gateway Deployment is ready",
        REASON_TRACE_GATEWAY_NOT_READY => "Trace gateway Deployment is not ready",
        REASON_TRACE_GATEWAY_READY => "Trace gateway Deployment is ready",
        REASON_FLOW_HEALTHY => "Telemetry flow is healthy",
        REASON_SELF_MONITOR_PROBING_FAILED => "Could not determine flow health: self-monitor is unreachable",
        _ => reason,
    }
    .to_string()
}

pub fn pending(reason: &str, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: TYPE_PENDING.to_string(),
        status: "True".to_string(),
        reason: reason.to_string(),
        message: message_for(reason),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

pub fn running(reason: &str, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: TYPE_RUNNING.to_string(),
        status: "True".to_string(),
        reason: reason.to_string(),
        message: message_for(reason),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

/// Derives the `TelemetryFlowHealthy` gauge condition from a verdict.
pub fn flow_healthy(verdict: &FlowHealthVerdict, observed_generation: Option<i64>) -> Condition {
    let (status, reason, message) = match verdict {
        FlowHealthVerdict::Healthy => ("True", REASON_FLOW_HEALTHY.to_string(), message_for(REASON_FLOW_HEALTHY)),
        FlowHealthVerdict::Degraded(problem) => (
            "False",
            problem.reason().to_string(),
            problem.message().to_string(),
        ),
        FlowHealthVerdict::Unknown => (
            "Unknown",
            REASON_SELF_MONITOR_PROBING_FAILED.to_string(),
            message_for(REASON_SELF_MONITOR_PROBING_FAILED),
        ),
    };
    Condition {
        type_: TYPE_FLOW_HEALTHY.to_string(),
        status: status.to_string(),
        reason,
        message,
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

/// Applies `next` to the ordered condition list, returning the new list and
/// whether anything changed. Safe to call on every reconcile tick: repeated
/// application of the same condition is a no-op and preserves timestamps.
pub fn apply_condition(existing: &[Condition], next: Condition) -> (Vec<Condition>, bool) {
    match kind_of(&next.type_) {
        ConditionKind::TransitionLog => apply_transition(existing, next),
        ConditionKind::Gauge => set_status_condition(existing, next),
    }
}

fn is_transition(condition: &Condition) -> bool {
    kind_of(&condition.type_) == ConditionKind::TransitionLog
}

fn apply_transition(existing: &[Condition], mut next: Condition) -> (Vec<Condition>, bool) {
    let log: Vec<&Condition> = existing.iter().filter(|c| is_transition(c)).collect();

    if let Some(last) = log.last() {
        if last.type_ == next.type_ && last.reason == next.reason {
            return (existing.to_vec(), false);
        }
    }

    // A new Pending after a completed Pending/Running cycle starts a fresh
    // reporting cycle: the old transition log is cleared, gauges survive.
    let new_cycle = next.type_ == TYPE_PENDING
        && log.len() >= 2
        && log.last().is_some_and(|c| c.type_ == TYPE_RUNNING);

    let mut conditions: Vec<Condition> = if new_cycle {
        existing.iter().filter(|c| !is_transition(c)).cloned().collect()
    } else {
        existing.to_vec()
    };

    next.last_transition_time = Time(Utc::now());
    conditions.push(next);
    (conditions, true)
}
