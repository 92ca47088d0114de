use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::api::v1alpha1::SignalType;
use crate::selfmonitor::alerts;
use crate::selfmonitor::alerts::FlowProblem;
use crate::selfmonitor::client::AlertSource;

/// The flow-health verdict for one pipeline, recomputed on every reconcile
/// cycle and never cached across cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowHealthVerdict {
    /// Data is flowing end-to-end without loss
    Healthy,
    /// Data flow is impaired or stopped
    Degraded(FlowProblem),
    /// The self-monitor could not be queried; must never be reported as healthy
    Unknown,
}

#[async_trait]
pub trait FlowHealthEvaluator: Send + Sync {
    async fn evaluate(&self, pipeline_name: &str, signal_type: SignalType) -> FlowHealthVerdict;
}

/// Evaluates flow health from the self-monitor's firing alerts.
pub struct SelfMonitorEvaluator {
    alerts: Arc<dyn AlertSource>,
}

impl SelfMonitorEvaluator {
    pub fn new(alerts: Arc<dyn AlertSource>) -> Self {
        Self { alerts }
    }
}

#[async_trait]
impl FlowHealthEvaluator for SelfMonitorEvaluator {
    async fn evaluate(&self, pipeline_name: &str, signal_type: SignalType) -> FlowHealthVerdict {
        let firing = match self.alerts.firing_alerts().await {
            Ok(firing) => firing,
            Err(e) => {
                warn!(
                    "flow health for {} pipeline {} is unknown: {}",
                    signal_type, pipeline_name, e
                );
                return FlowHealthVerdict::Unknown;
            }
        };

        match alerts::reduce(&firing, pipeline_name, signal_type) {
            Some(problem) => FlowHealthVerdict::Degraded(problem),
            None => FlowHealthVerdict::Healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selfmonitor::alerts::{LABEL_ALERT_NAME, LABEL_PIPELINE_NAME};
    use crate::selfmonitor::client::FiringAlert;
    use crate::util::errors::{Error, StdError};
    use std::collections::HashMap;

    struct StubAlertSource {
        result: Result<Vec<FiringAlert>, ()>,
    }

    #[async_trait]
    impl AlertSource for StubAlertSource {
        async fn firing_alerts(&self) -> crate::Result<Vec<FiringAlert>> {
            match &self.result {
                Ok(alerts) => Ok(alerts.clone()),
                Err(()) => Err(Error::StdError(StdError::HttpError(
                    "self-monitor unreachable".to_string(),
                ))),
            }
        }
    }

    fn alert(name: &str, pipeline: Option<&str>) -> FiringAlert {
        let mut labels = HashMap::new();
        labels.insert(LABEL_ALERT_NAME.to_string(), name.to_string());
        if let Some(pipeline) = pipeline {
            labels.insert(LABEL_PIPELINE_NAME.to_string(), pipeline.to_string());
        }
        FiringAlert {
            labels,
            state: "firing".to_string(),
        }
    }

    #[tokio::test]
    async fn no_firing_alerts_is_healthy() {
        let evaluator = SelfMonitorEvaluator::new(Arc::new(StubAlertSource { result: Ok(vec![]) }));

        let verdict = evaluator.evaluate("pipeline", SignalType::Logs).await;
        assert_eq!(verdict, FlowHealthVerdict::Healthy);
    }

    #[tokio::test]
    async fn firing_alert_degrades_the_pipeline() {
        let evaluator = SelfMonitorEvaluator::new(Arc::new(StubAlertSource {
            result: Ok(vec![alert("LogAgentAllLogsDropped", Some("pipeline"))]),
        }));

        let verdict = evaluator.evaluate("pipeline", SignalType::Logs).await;
        assert_eq!(verdict, FlowHealthVerdict::Degraded(FlowProblem::AllDataDropped));
    }

    #[tokio::test]
    async fn query_error_is_unknown_not_healthy() {
        let evaluator = SelfMonitorEvaluator::new(Arc::new(StubAlertSource { result: Err(()) }));

        let verdict = evaluator.evaluate("pipeline", SignalType::Logs).await;
        assert_eq!(verdict, FlowHealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn verdicts_are_independent_per_pipeline() {
        let evaluator = SelfMonitorEvaluator::new(Arc::new(StubAlertSource {
            result: Ok(vec![alert("LogAgentBufferInUse", Some("impaired"))]),
        }));

        let impaired = evaluator.evaluate("impaired", SignalType::Logs).await;
        let healthy = evaluator.evaluate("healthy", SignalType::Logs).await;

        assert_eq!(impaired, FlowHealthVerdict::Degraded(FlowProblem::BufferFillingUp));
        assert_eq!(healthy, FlowHealthVerdict::Healthy);
    }
}
