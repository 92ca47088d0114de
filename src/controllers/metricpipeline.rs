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

use crate::api::v1alpha1::metricpipeline::{MetricPipeline, MetricPipelineStatus};
use crate::api::v1alpha1::SignalType;
use crate::conditions;
use crate::controllers::{retryable, Context, State};
use crate::util::errors::{is_conflict, Error, Result, StdError};
use crate::util::telemetry;

pub const CONTROLLER_NAME: &str = "metricpipeline";

pub async fn update_status(ctx: &Context, name: &str) -> Result<()> {
    let api: Api<MetricPipeline> = Api::all(ctx.client.clone());

    let Some(pipeline) = api
        .get_opt(name)
        .await
        .map_err(|e| Error::StdError(StdError::KubeError(e)))?
    else {
        debug!("MetricPipeline {} not found, assuming deleted", name);
        ctx.self_monitor.forget(name, SignalType::Metrics).await;
        return Ok(());
    };

    let ready = ctx
        .prober
        .is_ready(&ctx.config.metric_gateway_ref())
        .await
        .map_err(|e| retryable(e, Duration::from_secs(30)))?;

    let generation = pipeline.metadata.generation;
    let existing = pipeline
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let next = if ready {
        conditions::running(conditions::REASON_METRIC_GATEWAY_READY, generation)
    } else {
        conditions::pending(conditions::REASON_METRIC_GATEWAY_NOT_READY, generation)
    };
    let (mut new_conditions, mut changed) = conditions::apply_condition(&existing, next);

    if ready && ctx.config.self_monitor_enabled {
        let verdict = ctx.self_monitor.flow_health(name, SignalType::Metrics).await;
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

    let mut updated = pipeline;
    updated.status = Some(MetricPipelineStatus {
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

    info!("Updated MetricPipeline {} status conditions", name);
    Ok(())
}

#[instrument(skip(ctx, pipeline), fields(trace_id))]
pub async fn reconcile(pipeline: Arc<MetricPipeline>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.count_and_measure(CONTROLLER_NAME);
    ctx.diagnostics.write().await.last_event = Utc::now();

    let name = pipeline.name_any();
    info!("Reconciling MetricPipeline \"{}\"", name);
    update_status(&ctx, &name).await?;

    Ok(Action::requeue(ctx.config.requeue_interval))
}

fn error_policy(pipeline: Arc<MetricPipeline>, error: &Error, ctx: Arc<Context>) -> Action {
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

    let pipelines = Api::<MetricPipeline>::all(client.clone());
    if let Err(e) = pipelines.list(&ListParams::default().limit(1)).await {
        error!("MetricPipeline CRD is not queryable; {e:?}. Is the CRD installed?");
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
