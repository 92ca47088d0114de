use std::env;
use tokio::time::Duration;

use crate::prober::{WorkloadKind, WorkloadRef};

/// Operator configuration, read once from the environment in main and
/// threaded into constructors. There is no process-global state; everything
/// that varies per deployment lives here.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace holding the data-plane workloads and the self-monitor
    pub telemetry_namespace: String,
    /// Name of the log agent DaemonSet
    pub fluent_bit_daemon_set: String,
    /// Name of the metric gateway Deployment
    pub metric_gateway_deployment: String,
    /// Name of the trace gateway Deployment
    pub trace_gateway_deployment: String,
    /// Base URL of the self-monitor's Prometheus-compatible API
    pub self_monitor_url: String,
    /// Gates the flow-health path; readiness conditions are always managed
    pub self_monitor_enabled: bool,
    /// Request timeout for self-monitor queries
    pub self_monitor_timeout: Duration,
    /// Periodic resync interval for successful reconciles
    pub requeue_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            telemetry_namespace: "telemetry-system".to_string(),
            fluent_bit_daemon_set: "telemetry-fluent-bit".to_string(),
            metric_gateway_deployment: "telemetry-metric-gateway".to_string(),
            trace_gateway_deployment: "telemetry-trace-gateway".to_string(),
            self_monitor_url: "http://telemetry-self-monitor.telemetry-system:9090".to_string(),
            self_monitor_enabled: true,
            self_monitor_timeout: Duration::from_secs(5),
            requeue_interval: Duration::from_secs(60),
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            telemetry_namespace: env_or("TELEMETRY_NAMESPACE", defaults.telemetry_namespace),
            fluent_bit_daemon_set: env_or("FLUENT_BIT_DAEMON_SET", defaults.fluent_bit_daemon_set),
            metric_gateway_deployment: env_or(
                "METRIC_GATEWAY_DEPLOYMENT",
                defaults.metric_gateway_deployment,
            ),
            trace_gateway_deployment: env_or(
                "TRACE_GATEWAY_DEPLOYMENT",
                defaults.trace_gateway_deployment,
            ),
            self_monitor_url: env_or("SELF_MONITOR_URL", defaults.self_monitor_url),
            self_monitor_enabled: env_or_parse("SELF_MONITOR_ENABLED", defaults.self_monitor_enabled),
            self_monitor_timeout: Duration::from_secs(env_or_parse(
                "SELF_MONITOR_TIMEOUT_SECONDS",
                defaults.self_monitor_timeout.as_secs(),
            )),
            requeue_interval: Duration::from_secs(env_or_parse(
                "RECONCILE_INTERVAL_SECONDS",
                defaults.requeue_interval.as_secs(),
            )),
        }
    }

    pub fn fluent_bit_ref(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.telemetry_namespace.clone(),
            name: self.fluent_bit_daemon_set.clone(),
            kind: WorkloadKind::DaemonSet,
        }
    }

    pub fn metric_gateway_ref(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.telemetry_namespace.clone(),
            name: self.metric_gateway_deployment.clone(),
            kind: WorkloadKind::Deployment,
        }
    }

    pub fn trace_gateway_ref(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.telemetry_namespace.clone(),
            name: self.trace_gateway_deployment.clone(),
            kind: WorkloadKind::Deployment,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
