use crate::cli::ServeArgs;
use crate::infra::{build_engine, seed_from_roster, AppState};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shift_relief::config::AppConfig;
use shift_relief::error::AppError;
use shift_relief::telemetry;
use shift_relief::workflows::replacement::WorkflowState;
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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let engine = build_engine(&config.throttle);
    if let Some(path) = args.roster_csv.take() {
        let seeded = seed_from_roster(&engine, &path)?;
        info!(
            count = seeded.len(),
            roster = %path.display(),
            "seeded open replacement requests from planning export"
        );
    }

    let app = with_workflow_routes(WorkflowState {
        applications: engine.manager.clone(),
        assignments: engine.coordinator.clone(),
        store: engine.store.clone(),
    })
    .layer(Extension(app_state))
    .layer(Extension(engine))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "replacement workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
