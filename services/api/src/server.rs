use crate::cli::ServeArgs;
use crate::infra::{build_in_memory_pipeline, AppState};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use permit_flow::config::AppConfig;
use permit_flow::error::AppError;
use permit_flow::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let pipeline = build_in_memory_pipeline();
    if config.pipeline.seed_catalog_on_start {
        pipeline.catalog.ensure_seeded();
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        catalog: pipeline.catalog.clone(),
    };

    let app = with_pipeline_routes(pipeline.engine, pipeline.desk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "authorization request pipeline ready");

    axum::serve(listener, app).await?;
    Ok(())
}
