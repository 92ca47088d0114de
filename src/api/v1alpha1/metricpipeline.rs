use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::{conditions_schema, OtlpOutput};

/// Generate the Kubernetes wrapper struct `MetricPipeline` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "MetricPipeline", group = "telemetry.opskit.io", version = "v1alpha1")]
#[kube(status = "MetricPipelineStatus", shortname = "metricpipeline")]
pub struct MetricPipelineSpec {
    pub output: Option<OtlpOutput>,
}

/// The status object of `MetricPipeline`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct MetricPipelineStatus {
    #[schemars(schema_with = "conditions_schema")]
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
