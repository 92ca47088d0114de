//! Self-monitoring: flow-health evaluation and the fleet-wide overview.

pub mod alerts;
pub mod client;
pub mod flow_health;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::v1alpha1::SignalType;
use crate::selfmonitor::flow_health::{FlowHealthEvaluator, FlowHealthVerdict};

/// Routes flow-health queries to the evaluator, scoped by pipeline name and
/// signal type. Each pipeline's verdict is computed independently; the
/// fleet snapshot below is a read-only side channel for diagnostics and
/// never feeds back into per-resource status computation.
pub struct SelfMonitorCoordinator {
    evaluator: Arc<dyn FlowHealthEvaluator>,
    fleet: RwLock<HashMap<(SignalType, String), FleetEntry>>,
}

#[derive(Clone, Serialize)]
pub struct FleetEntry {
    pub state: String,
    pub reason: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Per-pipeline flow-health snapshot exposed by the web server.
#[derive(Clone, Default, Serialize)]
pub struct FleetOverview {
    pub healthy: usize,
    pub degraded: usize,
    pub unknown: usize,
    pub pipelines: Vec<PipelineFlowStatus>,
}

#[derive(Clone, Serialize)]
pub struct PipelineFlowStatus {
    pub name: String,
    pub signal_type: String,
    pub state: String,
    pub reason: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl SelfMonitorCoordinator {
    pub fn new(evaluator: Arc<dyn FlowHealthEvaluator>) -> Self {
        Self {
            evaluator,
            fleet: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluates flow health for one pipeline and records the verdict in the
    /// fleet snapshot.
    pub async fn flow_health(&self, pipeline_name: &str, signal_type: SignalType) -> FlowHealthVerdict {
        let verdict = self.evaluator.evaluate(pipeline_name, signal_type).await;

        let (state, reason) = match &verdict {
            FlowHealthVerdict::Healthy => ("Healthy", None),
            FlowHealthVerdict::Degraded(problem) => ("Degraded", Some(problem.reason().to_string())),
            FlowHealthVerdict::Unknown => ("Unknown", None),
        };
        self.fleet.write().await.insert(
            (signal_type, pipeline_name.to_string()),
            FleetEntry {
                state: state.to_string(),
                reason,
                observed_at: Utc::now(),
            },
        );

        verdict
    }

    /// Drops a deleted pipeline from the fleet snapshot.
    pub async fn forget(&self, pipeline_name: &str, signal_type: SignalType) {
        self.fleet
            .write()
            .await
            .remove(&(signal_type, pipeline_name.to_string()));
    }

    /// Fleet-wide view across all pipelines of all signal types.
    pub async fn overview(&self) -> FleetOverview {
        let fleet = self.fleet.read().await;
        let mut overview = FleetOverview::default();

        for ((signal_type, name), entry) in fleet.iter() {
            match entry.state.as_str() {
                "Healthy" => overview.healthy += 1,
                "Degraded" => overview.degraded += 1,
                _ => overview.unknown += 1,
            }
            overview.pipelines.push(PipelineFlowStatus {
                name: name.clone(),
                signal_type: signal_type.to_string(),
                state: entry.state.clone(),
                reason: entry.reason.clone(),
                observed_at: entry.observed_at,
            });
        }
        overview.pipelines.sort_by(|a, b| a.name.cmp(&b.name));

        overview
    }
}
