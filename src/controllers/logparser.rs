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

use crate::api::v1alpha1::logparser::{LogParser, LogParserStatus};
use crate::conditions;
use crate::controllers::{retryable, Context, State};
use crate::util::errors::{is_conflict, Error, Result, StdError};
use crate::util::telemetry;

pub const CONTROLLER_NAME: &str = "logparser";

/// Parsers ride on the agent DaemonSet and have no data flow of their own,
/// so only the readiness history is managed here.
pub async fn update_status(ctx: &Context, name: &str) -> Result<()> {
    let api: Api<LogParser> = Api::all(ctx.client.clone());

    let Some(parser) = api
        .get_opt(name)
        .await
        .map_err(|e| Error::StdError(StdError::KubeError(e)))?
    else {
        debug!("LogParser {} not found, assuming deleted", name);
        return Ok(());
    };

    let ready = ctx
        .prober
        .is_ready(&ctx.config.fluent_bit_ref())
        .await
        .map_err(|e| retryable(e, Duration::from_secs(30)))?;

    let generation = parser.metadata.generation;
    let existing = parser
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let next = if ready {
        conditions::running(conditions::REASON_FLUENT_BIT_DS_READY, generation)
    } else {
        conditions::pending(conditions::REASON_FLUENT_BIT_DS_NOT_READY, generation)
    };
    let (new_conditions, changed) = conditions::apply_condition(&existing, next);

    if !changed {
        return Ok(());
    }

    let mut updated = parser;
    updated.status = Some(LogParserStatus {
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

    info!("Updated LogParser {} status conditions", name);
    Ok(())
}

#[instrument(skip(ctx, parser), fields(trace_id))]
pub async fn reconcile(parser: Arc<LogParser>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.count_and_measure(CONTROLLER_NAME);
    ctx.diagnostics.write().await.last_event = Utc::now();

    let name = parser.name_any();
    info!("Reconciling LogParser \"{}\"", name);
    update_status(&ctx, &name).await?;

    Ok(Action::requeue(ctx.config.requeue_interval))
}

fn error_policy(parser: Arc<LogParser>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics
        .reconcile_failure(CONTROLLER_NAME, &parser.name_any(), error);
    match error {
        Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        _ => Action::requeue(Duration::from_secs(5 * 60)),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State) {
    let client = Client::try_default().await.expect("failed to create kube Client");

    let parsers = Api::<LogParser>::all(client.clone());
    if let Err(e) = parsers.list(&ListParams::default().limit(1)).await {
        error!("LogParser CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(parsers, Config::default().any_semantic())
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
        REASON_FLUENT_BIT_DS_NOT_READY, REASON_FLUENT_BIT_DS_READY, TYPE_PENDING, TYPE_RUNNING,
    };
    use crate::fixtures::{self, StubProbe, StubVerdict};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

    const PARSER_PATH: &str = "/apis/telemetry.opskit.io/v1alpha1/logparsers/parser";

    fn parser_named(name: &str) -> LogParser {
        LogParser::new(name, crate::api::v1alpha1::logparser::LogParserSpec::default())
    }

    fn parser_with_conditions(name: &str, conditions: Vec<Condition>) -> LogParser {
        let mut parser = parser_named(name);
        parser.status = Some(LogParserStatus { conditions });
        parser
    }

    async fn written_conditions(
        verifier: tokio::task::JoinHandle<Option<serde_json::Value>>,
    ) -> Vec<Condition> {
        let status = verifier.await.unwrap().expect("status written");
        serde_json::from_value(status["conditions"].clone()).unwrap()
    }

    #[tokio::test]
    async fn adds_pending_condition_if_agent_is_not_ready() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(false), StubVerdict::Healthy);

        let verifier = fixtures::serve_get_then_put_status(
            handle,
            PARSER_PATH,
            serde_json::to_value(parser_named("parser")).unwrap(),
        );

        update_status(&ctx, "parser").await.unwrap();

        let conditions = written_conditions(verifier).await;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, TYPE_PENDING);
        assert_eq!(conditions[0].reason, REASON_FLUENT_BIT_DS_NOT_READY);
    }

    #[tokio::test]
    async fn adds_running_condition_if_agent_becomes_ready() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(true), StubVerdict::Healthy);

        let parser = parser_with_conditions(
            "parser",
            vec![conditions::pending(REASON_FLUENT_BIT_DS_NOT_READY, None)],
        );
        let verifier = fixtures::serve_get_then_put_status(
            handle,
            PARSER_PATH,
            serde_json::to_value(&parser).unwrap(),
        );

        update_status(&ctx, "parser").await.unwrap();

        let conditions = written_conditions(verifier).await;
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].type_, TYPE_PENDING);
        assert_eq!(conditions[0].reason, REASON_FLUENT_BIT_DS_NOT_READY);
        assert_eq!(conditions[1].type_, TYPE_RUNNING);
        assert_eq!(conditions[1].reason, REASON_FLUENT_BIT_DS_READY);
    }

    #[tokio::test]
    async fn resets_conditions_if_agent_becomes_not_ready_again() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(false), StubVerdict::Healthy);

        let parser = parser_with_conditions(
            "parser",
            vec![
                conditions::pending(REASON_FLUENT_BIT_DS_NOT_READY, None),
                conditions::running(REASON_FLUENT_BIT_DS_READY, None),
            ],
        );
        let verifier = fixtures::serve_get_then_put_status(
            handle,
            PARSER_PATH,
            serde_json::to_value(&parser).unwrap(),
        );

        update_status(&ctx, "parser").await.unwrap();

        let conditions = written_conditions(verifier).await;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, TYPE_PENDING);
        assert_eq!(conditions[0].reason, REASON_FLUENT_BIT_DS_NOT_READY);
    }

    #[tokio::test]
    async fn deleted_parser_is_a_no_op() {
        let (client, handle) = fixtures::mock_client();
        let ctx = fixtures::test_context(client, StubProbe::Ready(true), StubVerdict::Healthy);

        let verifier = fixtures::serve_not_found(handle, PARSER_PATH);

        update_status(&ctx, "parser").await.unwrap();
        verifier.await.unwrap();
    }
}
