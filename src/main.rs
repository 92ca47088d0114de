#![allow(unused_imports, unused_variables)]
use actix_web::{get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder};

use controller::controllers::{self, State};
use controller::util::config::OperatorConfig;
use controller::util::telemetry;

use prometheus::{Encoder, TextEncoder};

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&metrics, &mut buffer).unwrap();
    HttpResponse::Ok().body(buffer)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let diagnostics = c.diagnostics().await;
    let flow_health = c.overview().await;
    HttpResponse::Ok().json(serde_json::json!({
        "diagnostics": diagnostics,
        "flow_health": flow_health,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    // Initialize Kubernetes controller state
    let state = State::new(OperatorConfig::from_env());
    let logpipeline_controller = controllers::logpipeline::run(state.clone());
    let logparser_controller = controllers::logparser::run(state.clone());
    let metricpipeline_controller = controllers::metricpipeline::run(state.clone());
    let tracepipeline_controller = controllers::tracepipeline::run(state.clone());

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind("0.0.0.0:8080")?
    .shutdown_timeout(5);

    // All runtimes implement graceful shutdown, so poll until all are done
    tokio::join!(
        logpipeline_controller,
        logparser_controller,
        metricpipeline_controller,
        tracepipeline_controller,
        server.run()
    )
    .4?;
    Ok(())
}
