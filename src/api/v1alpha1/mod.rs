use core::fmt;
use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod logparser;
pub mod logpipeline;
pub mod metricpipeline;
pub mod tracepipeline;

/// The kind of telemetry data a pipeline carries. Alert rule sets and
/// backing workloads are selected by signal type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalType {
    Logs,
    Metrics,
    Traces,
}

impl Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalType::Logs => write!(f, "logs"),
            SignalType::Metrics => write!(f, "metrics"),
            SignalType::Traces => write!(f, "traces"),
        }
    }
}

/// OTLP output shared by metric and trace pipelines
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct OtlpOutput {
    /// Endpoint of the OTLP-compatible backend
    pub endpoint: String,
    /// Transport protocol, `grpc` or `http`
    #[serde(default = "default_otlp_protocol")]
    pub protocol: String,
}

fn default_otlp_protocol() -> String {
    "grpc".to_string()
}

pub fn conditions_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    serde_json::from_value(serde_json::json!({
        "type": "array",
        "x-kubernetes-list-type": "map",
        "x-kubernetes-list-map-keys": ["type"],
        "items": {
            "type": "object",
            "properties": {
                "lastTransitionTime": { "format": "date-time", "type": "string" },
                "message": { "type": "string" },
                "observedGeneration": { "type": "integer", "format": "int64", "default": 0 },
                "reason": { "type": "string" },
                "status": { "type": "string" },
                "type": { "type": "string" }
            },
            "required": [
                "lastTransitionTime",
                "message",
                "reason",
                "status",
                "type"
            ],
        },
    }))
    .unwrap()
}
