//! Workload readiness probing.
//!
//! A pipeline is only reported as running when its backing data-plane
//! workload has enough live replicas. Lookup failures are errors, not
//! negative verdicts: callers requeue on `Err` and must never record an
//! infrastructure blip as "not ready".

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ListParams};
use kube::client::Client;
use tracing::debug;

use crate::util::errors::{Error, Result, StdError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    DaemonSet,
    Deployment,
}

/// A namespaced reference to a data-plane workload.
#[derive(Clone, Debug)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
}

#[async_trait]
pub trait WorkloadProber: Send + Sync {
    /// Returns whether the workload has at least as many ready pods as it
    /// desires. `Ok(false)` is a meaningful negative signal; `Err` means the
    /// workload or its pod set could not be retrieved.
    async fn is_ready(&self, workload: &WorkloadRef) -> Result<bool>;
}

/// Probes readiness against the live cluster.
pub struct ClusterWorkloadProber {
    client: Client,
}

impl ClusterWorkloadProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn daemon_set_ready(&self, workload: &WorkloadRef) -> Result<bool> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), &workload.namespace);
        let daemon_set = api
            .get_opt(&workload.name)
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;

        let Some(daemon_set) = daemon_set else {
            debug!("DaemonSet {}/{} does not exist", workload.namespace, workload.name);
            return Ok(false);
        };

        let desired = daemon_set
            .status
            .as_ref()
            .map(|s| s.desired_number_scheduled)
            .unwrap_or(0);
        let selector = daemon_set.spec.map(|s| s.selector).unwrap_or_default();

        self.enough_ready_pods(workload, &selector, desired).await
    }

    async fn deployment_ready(&self, workload: &WorkloadRef) -> Result<bool> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &workload.namespace);
        let deployment = api
            .get_opt(&workload.name)
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;

        let Some(deployment) = deployment else {
            debug!("Deployment {}/{} does not exist", workload.namespace, workload.name);
            return Ok(false);
        };

        let (desired, selector) = deployment
            .spec
            .map(|s| (s.replicas.unwrap_or(1), s.selector))
            .unwrap_or((0, LabelSelector::default()));

        self.enough_ready_pods(workload, &selector, desired).await
    }

    async fn enough_ready_pods(
        &self,
        workload: &WorkloadRef,
        selector: &LabelSelector,
        desired: i32,
    ) -> Result<bool> {
        if desired <= 0 {
            return Ok(false);
        }

        let label_selector = match &selector.match_labels {
            Some(labels) if !labels.is_empty() => labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
            _ => {
                return Err(Error::StdError(StdError::MetadataMissing(format!(
                    "workload {}/{} has no label selector",
                    workload.namespace, workload.name
                ))))
            }
        };

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &workload.namespace);
        let pod_list = pods
            .list(&ListParams::default().labels(&label_selector))
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;

        let ready = pod_list.items.iter().filter(|pod| is_pod_ready(pod)).count() as i32;

        debug!(
            "workload {}/{}: {}/{} pods ready",
            workload.namespace, workload.name, ready, desired
        );

        Ok(ready >= desired)
    }
}

fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

#[async_trait]
impl WorkloadProber for ClusterWorkloadProber {
    async fn is_ready(&self, workload: &WorkloadRef) -> Result<bool> {
        match workload.kind {
            WorkloadKind::DaemonSet => self.daemon_set_ready(workload).await,
            WorkloadKind::Deployment => self.deployment_ready(workload).await,
        }
    }
}
