pub mod logparser;
pub mod logpipeline;
pub mod metricpipeline;
pub mod tracepipeline;

use chrono::{DateTime, Utc};
use kube::client::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};

use crate::prober::{ClusterWorkloadProber, WorkloadProber};
use crate::selfmonitor::client::PrometheusAlertClient;
use crate::selfmonitor::flow_health::SelfMonitorEvaluator;
use crate::selfmonitor::{FleetOverview, SelfMonitorCoordinator};
use crate::util::config::OperatorConfig;
use crate::util::errors::{Error, ErrorWithRequeue};
use crate::util::metrics::Metrics;

/// State shared between the controllers and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconcilers
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    /// Metrics registered against the registry, shared by all controllers
    metrics: Metrics,
    /// Operator configuration from the environment
    config: OperatorConfig,
    /// Flow-health coordinator shared by all pipeline controllers
    self_monitor: Arc<SelfMonitorCoordinator>,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(config: OperatorConfig) -> Self {
        let registry = prometheus::Registry::default();
        let metrics = Metrics::default().register(&registry).unwrap();
        let alert_client = Arc::new(PrometheusAlertClient::new(
            &config.self_monitor_url,
            config.self_monitor_timeout,
        ));
        let self_monitor = Arc::new(SelfMonitorCoordinator::new(Arc::new(
            SelfMonitorEvaluator::new(alert_client),
        )));
        Self {
            diagnostics: Arc::new(RwLock::new(Diagnostics::default())),
            registry,
            metrics,
            config,
            self_monitor,
        }
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    /// Fleet-wide flow-health snapshot
    pub async fn overview(&self) -> FleetOverview {
        self.self_monitor.overview().await
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client: client.clone(),
            diagnostics: self.diagnostics.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            prober: Arc::new(ClusterWorkloadProber::new(client)),
            self_monitor: self.self_monitor.clone(),
        })
    }
}

// Context for our reconcilers
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Operator configuration
    pub config: OperatorConfig,
    /// Workload readiness prober
    pub prober: Arc<dyn WorkloadProber>,
    /// Flow-health coordinator
    pub self_monitor: Arc<SelfMonitorCoordinator>,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
        }
    }
}

/// Marks a standard error as retryable with the given backoff.
pub(crate) fn retryable(error: Error, duration: Duration) -> Error {
    match error {
        Error::StdError(e) => Error::ErrorWithRequeue(ErrorWithRequeue::new(e, duration)),
        requeue => requeue,
    }
}
