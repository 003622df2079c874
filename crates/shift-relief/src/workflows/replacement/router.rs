use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::applications::ApplicationManager;
use super::assignment::AssignmentCoordinator;
use super::domain::{ActingRole, ApplicationId, ReplacementId, UserId, WorkflowError};
use super::notify::NotificationGateway;
use super::store::ReplacementStore;

/// Shared state behind the workflow endpoints.
pub struct WorkflowState<S, G> {
    pub applications: Arc<ApplicationManager<S>>,
    pub assignments: Arc<AssignmentCoordinator<S, G>>,
    pub store: Arc<S>,
}

impl<S, G> Clone for WorkflowState<S, G> {
    fn clone(&self) -> Self {
        Self {
            applications: Arc::clone(&self.applications),
            assignments: Arc::clone(&self.assignments),
            store: Arc::clone(&self.store),
        }
    }
}

/// Router builder exposing the replacement workflow operations.
pub fn replacement_router<S, G>(state: WorkflowState<S, G>) -> Router
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/replacements/:replacement_id",
            get(replacement_view_handler::<S, G>),
        )
        .route(
            "/api/v1/replacements/:replacement_id/applications",
            post(apply_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            post(withdraw_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/:application_id/reactivate",
            post(reactivate_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/:application_id/unassign",
            post(unassign_handler::<S, G>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ApplyBody {
    applicant_id: String,
}

#[derive(Debug, Deserialize)]
struct AdminBody {
    actor_id: String,
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    actor_id: String,
    #[serde(default)]
    acting_role: Option<ActingRole>,
}

fn envelope(status: StatusCode, data: impl Serialize) -> Response {
    let payload = json!({ "success": true, "data": data });
    (status, axum::Json(payload)).into_response()
}

fn error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::RequestNotFound | WorkflowError::ApplicationNotFound => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        WorkflowError::Unauthorized(_) => StatusCode::FORBIDDEN,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut payload = json!({
        "success": false,
        "error": error.kind(),
        "message": error.to_string(),
    });
    if let WorkflowError::RateLimited { retry_after } = &error {
        payload["retry_after_ms"] = json!(retry_after.as_millis() as u64);
    }

    (status, axum::Json(payload)).into_response()
}

async fn replacement_view_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(replacement_id): Path<String>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let id = ReplacementId(replacement_id);
    let request = match state.store.request(&id) {
        Ok(Some(request)) => request,
        Ok(None) => return error_response(WorkflowError::RequestNotFound),
        Err(error) => return error_response(error.into()),
    };
    match state.store.applications_for(&id) {
        Ok(applications) => envelope(StatusCode::OK, request.view(&applications)),
        Err(error) => error_response(error.into()),
    }
}

async fn apply_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(replacement_id): Path<String>,
    axum::Json(body): axum::Json<ApplyBody>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let replacement_id = ReplacementId(replacement_id);
    let applicant_id = UserId(body.applicant_id);
    match state.applications.apply(&replacement_id, &applicant_id) {
        Ok(application) => envelope(StatusCode::ACCEPTED, application.view()),
        Err(error) => error_response(error),
    }
}

async fn withdraw_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let application_id = ApplicationId(application_id);
    match state.applications.withdraw(&application_id) {
        Ok(application) => envelope(StatusCode::OK, application.view()),
        Err(error) => error_response(error),
    }
}

async fn reactivate_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let application_id = ApplicationId(application_id);
    match state.applications.reactivate(&application_id) {
        Ok(application) => envelope(StatusCode::OK, application.view()),
        Err(error) => error_response(error),
    }
}

async fn reject_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<AdminBody>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let application_id = ApplicationId(application_id);
    let actor = UserId(body.actor_id);
    match state.applications.reject(&actor, &application_id) {
        Ok(application) => envelope(StatusCode::OK, application.view()),
        Err(error) => error_response(error),
    }
}

async fn approve_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<ApproveBody>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let application_id = ApplicationId(application_id);
    let actor = UserId(body.actor_id);
    match state
        .assignments
        .approve(&actor, &application_id, body.acting_role)
    {
        Ok(receipt) => envelope(StatusCode::OK, receipt),
        Err(error) => error_response(error),
    }
}

async fn unassign_handler<S, G>(
    State(state): State<WorkflowState<S, G>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<AdminBody>,
) -> Response
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    let application_id = ApplicationId(application_id);
    let actor = UserId(body.actor_id);
    match state.assignments.unassign(&actor, &application_id) {
        Ok(receipt) => envelope(StatusCode::OK, receipt),
        Err(error) => error_response(error),
    }
}
