use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::ApplicationId;
use super::events::{route_event, InboundEvent};
use super::lifecycle::{AdmissionLifecycle, LifecycleError};
use super::notify::NotificationDispatcher;
use super::store::ApplicationStore;

/// Router builder exposing the inbound event endpoint and application lookups.
pub fn admissions_router<S, D>(lifecycle: Arc<AdmissionLifecycle<S, D>>) -> Router
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/api/v1/events", post(event_handler::<S, D>))
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<S, D>),
        )
        .with_state(lifecycle)
}

pub(crate) async fn event_handler<S, D>(
    State(lifecycle): State<Arc<AdmissionLifecycle<S, D>>>,
    axum::Json(event): axum::Json<InboundEvent>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    match run_blocking(move || route_event(&lifecycle, &event)).await {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error) => {
            let status = error_status(&error);
            let reply = error.user_reply();
            let payload = json!({
                "error": error.to_string(),
                "reply": reply.reply,
                "actions": reply.actions,
            });
            (status, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_handler<S, D>(
    State(lifecycle): State<Arc<AdmissionLifecycle<S, D>>>,
    Path(application_id): Path<i64>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    match run_blocking(move || lifecycle.get(ApplicationId(application_id))).await {
        Ok(application) => {
            let view = application.status_view();
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => {
            let payload = json!({
                "application_id": application_id,
                "error": error.to_string(),
            });
            (error_status(&error), axum::Json(payload)).into_response()
        }
    }
}

/// Store and dispatcher calls block, so they run on tokio's blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, LifecycleError>
where
    F: FnOnce() -> Result<T, LifecycleError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| LifecycleError::Storage(format!("lifecycle task failed: {err}")))?
}

fn error_status(error: &LifecycleError) -> StatusCode {
    match error {
        LifecycleError::UnknownAction(_) => StatusCode::BAD_REQUEST,
        LifecycleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::IllegalTransition { .. } => StatusCode::CONFLICT,
        LifecycleError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
