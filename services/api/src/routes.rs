use crate::infra::{seed_requests, AppState, Engine};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;

use shift_relief::error::AppError;
use shift_relief::workflows::intake::RosterVacancyImporter;
use shift_relief::workflows::replacement::{
    replacement_router, NotificationGateway, ReplacementStore, WorkflowState,
};

pub(crate) fn with_workflow_routes<S, G>(state: WorkflowState<S, G>) -> axum::Router
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    replacement_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/replacements/import",
            axum::routing::post(import_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    pub(crate) roster_csv: String,
}

/// Bulk-creates open replacement requests from an inline planning export.
pub(crate) async fn import_endpoint(
    Extension(engine): Extension<Engine>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reader = Cursor::new(payload.roster_csv.into_bytes());
    let requests = RosterVacancyImporter::from_reader(reader, &engine.ids, engine.clock.as_ref())?;
    let seeded = seed_requests(&engine, requests)?;

    let views: Vec<_> = seeded.iter().map(|request| request.view(&[])).collect();
    Ok(Json(json!({ "success": true, "data": { "seeded": views } })))
}
