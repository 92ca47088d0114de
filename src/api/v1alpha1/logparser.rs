use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::conditions_schema;

/// Generate the Kubernetes wrapper struct `LogParser` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "LogParser", group = "telemetry.opskit.io", version = "v1alpha1")]
#[kube(status = "LogParserStatus", shortname = "logparser")]
pub struct LogParserSpec {
    /// Fluent-bit parser definition, passed through to the agent verbatim
    pub parser: String,
}

/// The status object of `LogParser`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct LogParserStatus {
    #[schemars(schema_with = "conditions_schema")]
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
