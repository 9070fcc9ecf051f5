use crate::cli::ServeArgs;
use crate::infra::{AppState, OutboxDispatcher};
use crate::routes::with_application_routes;
use admission_desk::config::AppConfig;
use admission_desk::error::AppError;
use admission_desk::telemetry;
use admission_desk::workflows::admissions::{
    AdmissionLifecycle, ApplicationStore, SqliteApplicationStore, SubmissionValidator,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    info!(db_path = %config.storage.db_path.display(), "opening application store");
    let store = Arc::new(SqliteApplicationStore::open(&config.storage.db_path)?);
    info!(applications = store.count()?, "application store ready");

    let outbox = Arc::new(OutboxDispatcher::new(config.outbox.capacity));
    outbox.register_contact(config.review.reviewer.clone());

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        outbox: outbox.clone(),
    };

    let lifecycle = Arc::new(AdmissionLifecycle::with_validator(
        SubmissionValidator::new(config.review.exam_form.clone()),
        store,
        outbox,
        config.review.reviewer.clone(),
    ));

    let app = with_application_routes(lifecycle)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        reviewer = %config.review.reviewer,
        "admission desk gateway ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
