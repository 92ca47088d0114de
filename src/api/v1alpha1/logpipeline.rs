use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::conditions_schema;

/// Generate the Kubernetes wrapper struct `LogPipeline` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "LogPipeline", group = "telemetry.opskit.io", version = "v1alpha1")]
#[kube(status = "LogPipelineStatus", shortname = "logpipeline")]
pub struct LogPipelineSpec {
    /// Selection of workloads whose logs are collected
    #[serde(default)]
    pub input: LogPipelineInput,
    pub output: LogPipelineOutput,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct LogPipelineInput {
    /// Namespaces to collect logs from; empty means all user namespaces
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Containers to collect logs from; empty means all containers
    #[serde(default)]
    pub containers: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
pub struct LogPipelineOutput {
    /// Ship logs to an HTTP backend
    pub http: Option<HttpOutput>,
    /// Raw fluent-bit output directive for backends without first-class support
    pub custom: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct HttpOutput {
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    pub uri: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

fn default_http_port() -> u16 {
    443
}

/// The status object of `LogPipeline`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct LogPipelineStatus {
    #[schemars(schema_with = "conditions_schema")]
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
