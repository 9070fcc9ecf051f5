use crate::infra::AppState;
use admission_desk::workflows::admissions::{
    admissions_router, AdmissionLifecycle, ApplicationStore, NotificationDispatcher,
    OutboundMessage,
};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct OutboxResponse {
    pub(crate) messages: Vec<OutboundMessage>,
}

pub(crate) fn with_application_routes<S, D>(
    lifecycle: Arc<AdmissionLifecycle<S, D>>,
) -> axum::Router
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    admissions_router(lifecycle)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/outbox", axum::routing::get(outbox_endpoint))
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

/// Hand queued notifications to the chat transport.
pub(crate) async fn outbox_endpoint(Extension(state): Extension<AppState>) -> Json<OutboxResponse> {
    Json(OutboxResponse {
        messages: state.outbox.drain(),
    })
}
