use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::time::Duration;
use tracing::error;

use crate::util::errors::{Error, Result, StdError};

/// An alert currently known to the self-monitor.
#[derive(Clone, Debug, Deserialize)]
pub struct FiringAlert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub state: String,
}

#[derive(Deserialize)]
struct AlertsResponse {
    status: String,
    data: AlertsData,
}

#[derive(Deserialize)]
struct AlertsData {
    alerts: Vec<FiringAlert>,
}

/// Source of currently-firing alerts. Swappable so tests can inject
/// deterministic alert sets.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn firing_alerts(&self) -> Result<Vec<FiringAlert>>;
}

/// Queries the self-monitor's Prometheus-compatible alerts endpoint.
pub struct PrometheusAlertClient {
    base_url: String,
    client: reqwest::Client,
}

impl PrometheusAlertClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build self-monitor http client"),
        }
    }
}

#[async_trait]
impl AlertSource for PrometheusAlertClient {
    async fn firing_alerts(&self) -> Result<Vec<FiringAlert>> {
        let url = format!("{}/api/v1/alerts", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Failed to connect to self-monitor: {}", e);
            Error::StdError(StdError::HttpError(format!("self-monitor request failed: {e}")))
        })?;

        if !response.status().is_success() {
            error!("Self-monitor returned error status: {}", response.status());
            return Err(Error::StdError(StdError::HttpError(format!(
                "self-monitor returned {}",
                response.status()
            ))));
        }

        let alerts: AlertsResponse = response.json().await.map_err(|e| {
            error!("Failed to parse self-monitor response: {}", e);
            Error::StdError(StdError::SerializationError(format!(
                "failed to parse alerts JSON: {e}"
            )))
        })?;

        if alerts.status != "success" {
            return Err(Error::StdError(StdError::HttpError(format!(
                "self-monitor alert query status: {}",
                alerts.status
            ))));
        }

        Ok(alerts
            .data
            .alerts
            .into_iter()
            .filter(|alert| alert.state == "firing")
            .collect())
    }
}
