//! The fixed alert-rule taxonomy evaluated by the self-monitor.
//!
//! Each signal type has its own rule set; rule names and the reason tokens
//! they map to are part of the external contract and must not be renamed
//! without a migration plan.

use crate::api::v1alpha1::SignalType;
use crate::selfmonitor::client::FiringAlert;

pub const LABEL_ALERT_NAME: &str = "alertname";
pub const LABEL_PIPELINE_NAME: &str = "pipeline_name";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertSeverity {
    /// The pipeline is definitely not delivering
    Fatal,
    /// The pipeline is delivering but impaired
    Degraded,
}

/// A concrete data-flow problem derived from a firing alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowProblem {
    AllDataDropped,
    NoDataDelivered,
    BufferFull,
    SomeDataDropped,
    BufferFillingUp,
    GatewayThrottling,
}

impl FlowProblem {
    /// Stable reason token recorded on the `TelemetryFlowHealthy` condition.
    pub fn reason(&self) -> &'static str {
        match self {
            FlowProblem::AllDataDropped => "AllTelemetryDataDropped",
            FlowProblem::NoDataDelivered => "NoTelemetryDataDelivered",
            FlowProblem::BufferFull => "AgentBufferFull",
            FlowProblem::SomeDataDropped => "SomeTelemetryDataDropped",
            FlowProblem::BufferFillingUp => "BufferFillingUp",
            FlowProblem::GatewayThrottling => "GatewayThrottling",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FlowProblem::AllDataDropped => "All telemetry data is being dropped before delivery",
            FlowProblem::NoDataDelivered => "No telemetry data is being delivered to the backend",
            FlowProblem::BufferFull => "The agent buffer is full; incoming data will be lost",
            FlowProblem::SomeDataDropped => "Some telemetry data is being dropped before delivery",
            FlowProblem::BufferFillingUp => "The buffer is filling up faster than it drains",
            FlowProblem::GatewayThrottling => "The gateway is throttling incoming data",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            FlowProblem::AllDataDropped | FlowProblem::NoDataDelivered | FlowProblem::BufferFull => {
                AlertSeverity::Fatal
            }
            FlowProblem::SomeDataDropped
            | FlowProblem::BufferFillingUp
            | FlowProblem::GatewayThrottling => AlertSeverity::Degraded,
        }
    }

    /// Total order used to reduce concurrently firing alerts to one verdict.
    /// Fatal problems always outrank degraded ones.
    fn priority(&self) -> u8 {
        match self {
            FlowProblem::AllDataDropped => 5,
            FlowProblem::NoDataDelivered => 4,
            FlowProblem::BufferFull => 3,
            FlowProblem::SomeDataDropped => 2,
            FlowProblem::BufferFillingUp => 1,
            FlowProblem::GatewayThrottling => 0,
        }
    }
}

/// Maps a firing alert name to the problem it signals for the given signal
/// type. Names outside the signal's rule set are ignored.
pub fn problem_for_alert(signal_type: SignalType, alert_name: &str) -> Option<FlowProblem> {
    match signal_type {
        SignalType::Logs => match alert_name {
            "LogAgentAllLogsDropped" => Some(FlowProblem::AllDataDropped),
            "LogAgentNoLogsDelivered" => Some(FlowProblem::NoDataDelivered),
            "LogAgentBufferFull" => Some(FlowProblem::BufferFull),
            "LogAgentSomeLogsDropped" => Some(FlowProblem::SomeDataDropped),
            "LogAgentBufferInUse" => Some(FlowProblem::BufferFillingUp),
            _ => None,
        },
        SignalType::Metrics => match alert_name {
            "MetricGatewayAllDataDropped" => Some(FlowProblem::AllDataDropped),
            "MetricGatewaySomeDataDropped" => Some(FlowProblem::SomeDataDropped),
            "MetricGatewayExporterQueueAlmostFull" => Some(FlowProblem::BufferFillingUp),
            "MetricGatewayThrottling" => Some(FlowProblem::GatewayThrottling),
            _ => None,
        },
        SignalType::Traces => match alert_name {
            "TraceGatewayAllDataDropped" => Some(FlowProblem::AllDataDropped),
            "TraceGatewaySomeDataDropped" => Some(FlowProblem::SomeDataDropped),
            "TraceGatewayExporterQueueAlmostFull" => Some(FlowProblem::BufferFillingUp),
            "TraceGatewayThrottling" => Some(FlowProblem::GatewayThrottling),
            _ => None,
        },
    }
}

/// An alert applies to a pipeline when its `pipeline_name` label matches, or
/// when the label is absent (fleet-wide alerts apply to every pipeline of
/// the signal type).
fn matches_pipeline(alert: &FiringAlert, pipeline_name: &str) -> bool {
    match alert.labels.get(LABEL_PIPELINE_NAME) {
        Some(name) => name == pipeline_name,
        None => true,
    }
}

/// Reduces the firing alerts scoped to one pipeline to the single
/// highest-priority problem, or `None` when the flow is healthy.
pub fn reduce(
    firing: &[FiringAlert],
    pipeline_name: &str,
    signal_type: SignalType,
) -> Option<FlowProblem> {
    firing
        .iter()
        .filter(|alert| matches_pipeline(alert, pipeline_name))
        .filter_map(|alert| {
            alert
                .labels
                .get(LABEL_ALERT_NAME)
                .and_then(|name| problem_for_alert(signal_type, name))
        })
        .max_by_key(|problem| problem.priority())
}
