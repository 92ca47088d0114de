//! Test doubles: a mock API server plus deterministic prober and evaluator
//! stubs for exercising the reconcilers without a cluster.

use async_trait::async_trait;
use http::{Request, Response};
use hyper::Body;
use kube::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::controllers::{Context, Diagnostics};
use crate::prober::{WorkloadProber, WorkloadRef};
use crate::selfmonitor::alerts::FlowProblem;
use crate::selfmonitor::flow_health::{FlowHealthEvaluator, FlowHealthVerdict};
use crate::selfmonitor::SelfMonitorCoordinator;
use crate::api::v1alpha1::SignalType;
use crate::util::config::OperatorConfig;
use crate::util::errors::{Error, Result, StdError};
use crate::util::metrics::Metrics;

pub type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// A kube client wired to an in-memory API server handle.
pub fn mock_client() -> (Client, ApiServerHandle) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(mock_service, "default"), handle)
}

/// Serves a GET for `path` with `object`, then waits for the status PUT and
/// echoes it back. Returns the written `status` object, or `None` when the
/// client finished without writing (the GET was the only request).
pub fn serve_get_then_put_status(
    mut handle: ApiServerHandle,
    path: &str,
    object: serde_json::Value,
) -> tokio::task::JoinHandle<Option<serde_json::Value>> {
    let path = path.to_string();
    tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), path);
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&object).unwrap()))
                .unwrap(),
        );

        let Some((request, send)) = handle.next_request().await else {
            return None;
        };
        assert_eq!(request.method(), http::Method::PUT);
        assert_eq!(request.uri().path(), format!("{path}/status"));
        let body = hyper::body::to_bytes(request.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).expect("status update is json");
        send.send_response(Response::builder().body(Body::from(body.to_vec())).unwrap());
        Some(json["status"].clone())
    })
}

/// Serves the GET for `path`, then rejects the status PUT with a 409
/// optimistic-concurrency conflict.
pub fn serve_get_then_conflict(
    mut handle: ApiServerHandle,
    path: &str,
    object: serde_json::Value,
) -> tokio::task::JoinHandle<()> {
    let path = path.to_string();
    tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), path);
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&object).unwrap()))
                .unwrap(),
        );

        let (request, send) = handle.next_request().await.expect("status update expected");
        assert_eq!(request.method(), http::Method::PUT);
        send.send_response(
            Response::builder()
                .status(409)
                .body(Body::from(
                    serde_json::to_vec(&serde_json::json!({
                        "kind": "Status",
                        "apiVersion": "v1",
                        "status": "Failure",
                        "message": "the object has been modified",
                        "reason": "Conflict",
                        "code": 409
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        );
    })
}

/// Serves a 404 for the GET on `path`.
pub fn serve_not_found(mut handle: ApiServerHandle, path: &str) -> tokio::task::JoinHandle<()> {
    let path = path.to_string();
    tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), path);
        send.send_response(
            Response::builder()
                .status(404)
                .body(Body::from(
                    serde_json::to_vec(&serde_json::json!({
                        "kind": "Status",
                        "apiVersion": "v1",
                        "status": "Failure",
                        "message": "not found",
                        "reason": "NotFound",
                        "code": 404
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        );
    })
}

/// Deterministic prober verdicts for tests.
#[derive(Clone, Copy)]
pub enum StubProbe {
    Ready(bool),
    Fails,
}

pub struct StubProber(StubProbe);

#[async_trait]
impl WorkloadProber for StubProber {
    async fn is_ready(&self, _workload: &WorkloadRef) -> Result<bool> {
        match self.0 {
            StubProbe::Ready(ready) => Ok(ready),
            StubProbe::Fails => Err(Error::StdError(StdError::HttpError(
                "workload lookup failed".to_string(),
            ))),
        }
    }
}

/// Deterministic flow-health verdicts for tests.
#[derive(Clone, Copy)]
pub enum StubVerdict {
    Healthy,
    Degraded(FlowProblem),
    Unknown,
}

pub struct StubEvaluator(StubVerdict);

#[async_trait]
impl FlowHealthEvaluator for StubEvaluator {
    async fn evaluate(&self, _pipeline_name: &str, _signal_type: SignalType) -> FlowHealthVerdict {
        match self.0 {
            StubVerdict::Healthy => FlowHealthVerdict::Healthy,
            StubVerdict::Degraded(problem) => FlowHealthVerdict::Degraded(problem),
            StubVerdict::Unknown => FlowHealthVerdict::Unknown,
        }
    }
}

/// A reconciler context backed by the given mock client and stubs.
pub fn test_context(client: Client, probe: StubProbe, verdict: StubVerdict) -> Arc<Context> {
    Arc::new(Context {
        client,
        diagnostics: Arc::new(RwLock::new(Diagnostics::default())),
        metrics: Metrics::default(),
        config: OperatorConfig {
            self_monitor_timeout: Duration::from_secs(1),
            ..OperatorConfig::default()
        },
        prober: Arc::new(StubProber(probe)),
        self_monitor: Arc::new(SelfMonitorCoordinator::new(Arc::new(StubEvaluator(verdict)))),
    })
}
