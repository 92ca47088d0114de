use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::{Api, ListParams, PostParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

use crate::api::v1alpha1::logpipeline::{LogPipeline, LogPipelineStatus};
use crate::api::v1alpha1::SignalType;
use crate::conditions;
use crate::controllers::{retryable, Context, State};
use crate::util::errors::{is_conflict, Error, Result, StdError};
use crate::util::telemetry;

pub const CONTROLLER_NAME: &str = "logpipeline";

/// Folds the agent readiness and flow-health signals into the pipeline's
/// condition history and persists the result. Invoked on every reconcile
/// tick; idempotent given only the current observed state.
pub async fn update_status(ctx: &Context, name: &str) -> Result<()> {
    let api: Api<LogPipeline> = Api::all(ctx.client.clone());

    // Deleted between enqueue and processing: terminal success
    let Some(pipeline) = api
        .get_opt(name)
        .await
        .map_err(|e| Error::StdError(StdError::KubeError(e)))?
    else {
        debug!("LogPipeline {} not found, assuming deleted", name);
        ctx.self_monitor.forget(name, SignalType::Logs).await;
        return Ok(());
    };

    // A probe failure is retryable infrastructure trouble: the status keeps
    // its last-known-good value instead of regressing on every blip
    let ready = ctx
        .prober
        .is_ready(&ctx.config.fluent_bit_ref())
        .await
        .map_err(|e| retryable(e, Duration::from_secs(30)))?;

    let generation = pipeline.metadata.generation;
    let existing = pipeline
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let next = if ready {
        conditions::running(conditions::REASON_FLUENT_BIT_DS_READY, generation)
    } else {
        conditions::pending(conditions::REASON_FLUENT_BIT_DS_NOT_READY, generation)
    };
    let (mut new_conditions, mut changed) = conditions::apply_condition(&existing, next);

    if ready && ctx.config.self_monitor_enabled {
        let verdict = ctx.self_monitor.flow_health(name, SignalType::Logs).await;
        let (with_flow, flow_changed) = conditions::apply_condition(
            &new_conditions,
            conditions::flow_healthy(&verdict, generation),
        );
        new_conditions = with_flow;
        changed = changed || flow_changed;
    }

    if !changed {
        return Ok(());
    }

    // Single all-or-nothing status write; the snapshot's resourceVersion
    // detects concurrent writers, and a conflict aborts in favor of a fresh
    // read on the next delivery
    let mut updated = pipeline;
    updated.status = Some(LogPipelineStatus {
        conditions: new_conditions,
    });
    let data =
        serde_json::to_vec(&updated).map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;
    api.replace_status(name, &PostParams::default(), data)
        .await
        .map_err(|e| {
            if is_conflict(&e) {
                Error::retryable(e, Duration::from_secs(1))
            } else {
                Error::StdError(StdError::KubeError(e))
            }
        })?;

    info!("Updated LogPipeline {} status conditions", name);
    Ok(())
}

#[instrument(skip(ctx, pipeline), fields(trace_id))]
pub async fn reconcile(pipeline: Arc<LogPipeline>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.count_and_measure(CONTROLLER_NAME);
    ctx.diagnostics.write().await.last_event = Utc::now();

    let name = pipeline.name_any();
    info!("Reconciling LogPipeline \"{}\"", name);
    update_status(&ctx, &name).await?;

    Ok(Action::requeue(ctx.config.requeue_interval))
}

fn error_policy(pipeline: Arc<LogPipeline>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics
        .reconcile_failure(CONTROLLER_NAME, &pipeline.name_any(), error);
    match error {
        Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        _ => Action::requeue(Duration::from_secs(5 * 60)),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State) {
    let client = Client::try_default().await.expect("failed to create kube Client");

    let pipelines = Api::<LogPipeline>::all(client.clone());
    if let Err(e) = pipelines.list(&ListParams::default().limit(1)).await {
        error!("LogPipeline CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(pipelines, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{
        REASON_FLUENT_BIT_DS_READY, REASON_SELF_MONITOR_PROBING_FAILED, TYPE_FLOW_HEALTHY,
        TYPE_PENDING, TYPE_RUNNING,
    };
    use crate::fixtures::{self, StubProbe, StubVerdict};
    use crate::selfmonitor::alerts::FlowProblem;
    use assert_json_diff::assert_json_include;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

    fn pipeline_named(name: &str) -> LogPipeline {
        LogPipeline::new(name, crate::api::v1alpha1::logpipeline::LogPipelineSpec::default())
    }

    #[tokio::test]
    async fn sets_running_and_flow_healthy_when_agent_is_ready() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(true), StubVerdict::Healthy);

        let mut pipeline = pipeline_named("pipeline");
        pipeline.status = Some(LogPipelineStatus {
            conditions: vec![conditions::pending(
                conditions::REASON_FLUENT_BIT_DS_NOT_READY,
                None,
            )],
        });

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            "/apis/telemetry.opskit.io/v1alpha1/logpipelines/pipeline",
            serde_json::to_value(&pipeline).unwrap(),
        );

        update_status(&ctx, "pipeline").await.unwrap();

        let status = verifier.await.unwrap().expect("status written");
        let conditions: Vec<Condition> =
            serde_json::from_value(status["conditions"].clone()).unwrap();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0].type_, TYPE_PENDING);
        assert_eq!(conditions[1].type_, TYPE_RUNNING);
        assert_eq!(conditions[1].reason, REASON_FLUENT_BIT_DS_READY);
        assert_eq!(conditions[2].type_, TYPE_FLOW_HEALTHY);
        assert_eq!(conditions[2].status, "True");
    }

    #[tokio::test]
    async fn records_the_degraded_reason_when_flow_is_impaired() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(
            client,
            StubProbe::Ready(true),
            StubVerdict::Degraded(FlowProblem::AllDataDropped),
        );

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            "/apis/telemetry.opskit.io/v1alpha1/logpipelines/pipeline",
            serde_json::to_value(pipeline_named("pipeline")).unwrap(),
        );

        update_status(&ctx, "pipeline").await.unwrap();

        let status = verifier.await.unwrap().expect("status written");
        assert_json_include!(
            actual: status,
            expected: serde_json::json!({
                "conditions": [
                    { "type": "Running" },
                    { "type": "TelemetryFlowHealthy", "status": "False", "reason": "AllTelemetryDataDropped" },
                ]
            })
        );
    }

    #[tokio::test]
    async fn flow_health_is_unknown_when_the_self_monitor_is_unreachable() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(true), StubVerdict::Unknown);

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            "/apis/telemetry.opskit.io/v1alpha1/logpipelines/pipeline",
            serde_json::to_value(pipeline_named("pipeline")).unwrap(),
        );

        update_status(&ctx, "pipeline").await.unwrap();

        let status = verifier.await.unwrap().expect("status written");
        let conditions: Vec<Condition> =
            serde_json::from_value(status["conditions"].clone()).unwrap();
        let flow = conditions
            .iter()
            .find(|c| c.type_ == TYPE_FLOW_HEALTHY)
            .expect("flow condition");
        assert_eq!(flow.status, "Unknown");
        assert_eq!(flow.reason, REASON_SELF_MONITOR_PROBING_FAILED);
    }

    #[tokio::test]
    async fn unchanged_conditions_suppress_the_status_write() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(true), StubVerdict::Healthy);

        // Snapshot already holds exactly what this reconcile would derive
        let mut pipeline = pipeline_named("pipeline");
        let (conditions, _) = conditions::apply_condition(
            &[conditions::running(conditions::REASON_FLUENT_BIT_DS_READY, None)],
            conditions::flow_healthy(
                &crate::selfmonitor::flow_health::FlowHealthVerdict::Healthy,
                None,
            ),
        );
        pipeline.status = Some(LogPipelineStatus { conditions });

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            "/apis/telemetry.opskit.io/v1alpha1/logpipelines/pipeline",
            serde_json::to_value(&pipeline).unwrap(),
        );

        update_status(&ctx, "pipeline").await.unwrap();
        drop(ctx);

        // Only the GET was served; no PUT followed
        assert!(verifier.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn probe_errors_leave_status_untouched() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Fails, StubVerdict::Healthy);

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            "/apis/telemetry.opskit.io/v1alpha1/logpipelines/pipeline",
            serde_json::to_value(pipeline_named("pipeline")).unwrap(),
        );

        let error = update_status(&ctx, "pipeline").await.unwrap_err();
        drop(ctx);

        assert!(matches!(error, Error::ErrorWithRequeue(_)));
        assert!(verifier.await.unwrap().is_none());
    }
}
