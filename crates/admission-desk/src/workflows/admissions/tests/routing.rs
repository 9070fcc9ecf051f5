use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::admissions::domain::{
    Application, ApplicationId, ApplicationStatus, Decision, ParticipantId, ValidatedApplication,
};
use crate::workflows::admissions::events::{
    render_application_list, route_event, ActionEvent, DecisionEvent, InboundEvent,
    ListRequestEvent, StartEvent,
};
use crate::workflows::admissions::lifecycle::{AdmissionLifecycle, LifecycleError};
use crate::workflows::admissions::notify::{
    NotificationKind, FILL_FORM_ACTION, MY_APPLICATIONS_ACTION,
};
use crate::workflows::admissions::store::{ApplicationStore, StoreError};
use crate::workflows::admissions::router::{admissions_router, status_handler};

#[test]
fn start_event_replies_with_main_menu() {
    let (lifecycle, _, dispatcher) = build_lifecycle();

    let response = route_event(
        &lifecycle,
        &InboundEvent::Start(StartEvent {
            participant_id: applicant(),
        }),
    )
    .expect("start always succeeds");

    assert!(response.reply.expect("welcome text").contains("admissions"));
    let names: Vec<_> = response.actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec![FILL_FORM_ACTION, MY_APPLICATIONS_ACTION]);
    assert_eq!(dispatcher.observed(), vec![applicant()]);
}

#[test]
fn submission_event_is_answered_through_notifications() {
    let (lifecycle, _, dispatcher) = build_lifecycle();

    let response = route_event(
        &lifecycle,
        &InboundEvent::Submission(submission_event(&valid_payload())),
    )
    .expect("submission accepted");

    assert!(response.reply.is_none());
    assert_eq!(dispatcher.sent().len(), 2);
}

#[test]
fn list_event_renders_own_applications_newest_first() {
    let (lifecycle, _, _) = build_lifecycle();
    let mut payload = valid_payload();
    lifecycle
        .submit(&submission_event(&payload))
        .expect("first submission");
    payload["direction"] = json!("Law");
    lifecycle
        .submit(&submission_event(&payload))
        .expect("second submission");

    let response = route_event(
        &lifecycle,
        &InboundEvent::List(ListRequestEvent {
            applicant_id: applicant(),
        }),
    )
    .expect("list succeeds");

    let reply = response.reply.expect("listing text");
    assert!(reply.starts_with("Your applications:"));
    let law = reply.find("№2: Law").expect("second application listed");
    let cs = reply.find("№1: CS").expect("first application listed");
    assert!(law < cs);
}

#[test]
fn empty_listing_has_friendly_text() {
    assert_eq!(
        render_application_list(&[]),
        "You have not submitted any applications yet."
    );
}

#[test]
fn decision_event_confirms_to_reviewer() {
    let (lifecycle, _, _) = build_lifecycle();
    let submitted = lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted")
        .application;

    let response = route_event(
        &lifecycle,
        &InboundEvent::Decision(DecisionEvent {
            requester_id: reviewer(),
            application_id: submitted.id,
            decision: Decision::Reject,
        }),
    )
    .expect("decision applies");

    let reply = response.reply.expect("reviewer confirmation");
    assert!(reply.contains("Rejected"));
    assert!(reply.contains("has been notified"));
}

#[test]
fn error_replies_match_the_failure() {
    let missing = LifecycleError::Validation(
        crate::workflows::admissions::intake::ValidationError::MissingField("fullName"),
    );
    assert!(missing
        .user_reply()
        .reply
        .expect("explanation")
        .contains("Full name"));

    let storage = LifecycleError::Storage("disk full".to_string());
    assert!(storage
        .user_reply()
        .reply
        .expect("explanation")
        .contains("admissions office"));

    let decided = LifecycleError::IllegalTransition {
        id: ApplicationId(3),
        current: crate::workflows::admissions::domain::ApplicationStatus::Approved,
    };
    assert!(decided.user_reply().reply.is_none());
}

#[test]
fn inbound_events_deserialize_from_tagged_json() {
    let event: InboundEvent = serde_json::from_value(json!({
        "kind": "decision",
        "requester_id": "900",
        "application_id": 7,
        "decision": "approve",
    }))
    .expect("tagged decision event");

    assert_eq!(
        event,
        InboundEvent::Decision(DecisionEvent {
            requester_id: ParticipantId::new("900"),
            application_id: ApplicationId(7),
            decision: Decision::Approve,
        })
    );
}

#[tokio::test]
async fn events_route_accepts_submissions() {
    let (lifecycle, store, _) = build_lifecycle();
    let router = admissions_router(Arc::new(lifecycle));

    let body = json!({
        "kind": "submission",
        "applicant_id": "42",
        "applicant_handle": "ab_student",
        "raw_payload": valid_payload().to_string(),
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert!(payload.get("reply").map_or(true, |reply| reply.is_null()));
    assert_eq!(
        crate::workflows::admissions::store::ApplicationStore::count(store.as_ref())
            .expect("count"),
        1
    );
}

#[tokio::test]
async fn events_route_rejects_unauthorized_decisions() {
    let (lifecycle, _, dispatcher) = build_lifecycle();
    let submitted = lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted")
        .application;
    let before = dispatcher.sent().len();
    let router = admissions_router(Arc::new(lifecycle));

    let body = json!({
        "kind": "decision",
        "requester_id": "13",
        "application_id": submitted.id,
        "decision": "approve",
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert!(payload["reply"]
        .as_str()
        .unwrap_or_default()
        .contains("Only the admissions reviewer"));
    assert_eq!(dispatcher.sent().len(), before);
}

#[tokio::test]
async fn events_route_maps_validation_errors() {
    let (lifecycle, _, _) = build_lifecycle();
    let router = admissions_router(Arc::new(lifecycle));

    let body = json!({
        "kind": "submission",
        "applicant_id": "42",
        "raw_payload": "{not json",
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn status_handler_returns_views_and_not_found() {
    let (lifecycle, _, _) = build_lifecycle();
    let submitted = lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted")
        .application;
    let lifecycle = Arc::new(lifecycle);

    let response = status_handler::<MemoryStore, RecordingDispatcher>(
        State(lifecycle.clone()),
        Path(submitted.id.0),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("New"));
    assert_eq!(payload["application_id"], json!(submitted.id.0));

    let missing =
        status_handler::<MemoryStore, RecordingDispatcher>(State(lifecycle), Path(404)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[test]
fn decision_actions_from_the_summary_route_back_to_decisions() {
    let (lifecycle, store, dispatcher) = build_lifecycle();
    lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted");
    let summary = dispatcher
        .sent_to(&reviewer())
        .into_iter()
        .find(|message| message.kind == NotificationKind::NewApplicationSummary)
        .expect("reviewer summary");
    let approve = summary.actions[0].name.clone();
    assert_eq!(approve, "approve:1");

    let response = route_event(
        &lifecycle,
        &InboundEvent::Action(ActionEvent {
            requester_id: reviewer(),
            action: approve,
        }),
    )
    .expect("approve action applies");

    assert!(response.reply.expect("reviewer confirmation").contains("Approved"));
    assert_eq!(
        store.get(ApplicationId(1)).expect("stored").status,
        ApplicationStatus::Approved
    );
    assert_eq!(
        dispatcher.sent_to(&applicant()).last().map(|message| message.kind),
        Some(NotificationKind::Approved)
    );
}

#[test]
fn my_applications_action_lists_own_applications() {
    let (lifecycle, _, _) = build_lifecycle();
    lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted");

    let response = route_event(
        &lifecycle,
        &InboundEvent::Action(ActionEvent {
            requester_id: applicant(),
            action: MY_APPLICATIONS_ACTION.to_string(),
        }),
    )
    .expect("listing");

    assert!(response.reply.expect("listing text").contains("№1: CS"));
}

#[test]
fn unknown_actions_are_rejected_with_the_menu() {
    let (lifecycle, store, _) = build_lifecycle();
    lifecycle
        .submit(&submission_event(&valid_payload()))
        .expect("submitted");

    let err = route_event(
        &lifecycle,
        &InboundEvent::Action(ActionEvent {
            requester_id: reviewer(),
            action: "archive:1".to_string(),
        }),
    )
    .expect_err("unknown action");

    assert_eq!(err, LifecycleError::UnknownAction("archive:1".to_string()));
    assert_eq!(err.user_reply().actions.len(), 2);
    assert_eq!(
        store.get(ApplicationId(1)).expect("stored").status,
        ApplicationStatus::New
    );
}

#[tokio::test]
async fn events_route_accepts_numeric_chat_ids() {
    let (lifecycle, store, dispatcher) = build_lifecycle();
    let router = admissions_router(Arc::new(lifecycle));

    let submission = json!({
        "kind": "submission",
        "applicant_id": 42,
        "raw_payload": valid_payload().to_string(),
    });
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(submission.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.get(ApplicationId(1)).expect("stored").applicant_id, applicant());

    let decision = json!({
        "kind": "decision",
        "requester_id": 900,
        "application_id": 1,
        "decision": "approve",
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(decision.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert!(payload["reply"]
        .as_str()
        .unwrap_or_default()
        .contains("Approved"));
    assert_eq!(
        dispatcher.sent_to(&applicant()).last().map(|message| message.kind),
        Some(NotificationKind::Approved)
    );
}

#[tokio::test]
async fn events_route_maps_unknown_actions_to_bad_request() {
    let (lifecycle, _, _) = build_lifecycle();
    let router = admissions_router(Arc::new(lifecycle));

    let body = json!({
        "kind": "action",
        "requester_id": 900,
        "action": "approve",
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["actions"].as_array().map(Vec::len), Some(2));
}

/// Store whose lookups wait until the test opens the gate.
struct GatedStore {
    inner: MemoryStore,
    gate: Mutex<Receiver<()>>,
}

impl ApplicationStore for GatedStore {
    fn create(&self, application: ValidatedApplication) -> Result<Application, StoreError> {
        self.inner.create(application)
    }

    fn get(&self, id: ApplicationId) -> Result<Application, StoreError> {
        self.gate
            .lock()
            .expect("gate mutex poisoned")
            .recv()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        self.inner.get(id)
    }

    fn list_by_applicant(
        &self,
        applicant: &ParticipantId,
    ) -> Result<Vec<Application>, StoreError> {
        self.inner.list_by_applicant(applicant)
    }

    fn set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, StoreError> {
        self.inner.set_status(id, status)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }
}

// Single-threaded runtime: a lookup that blocked the worker would never see the gate open.
#[tokio::test(flavor = "current_thread")]
async fn slow_lookups_leave_the_runtime_free() {
    let (open_gate, gate) = channel();
    let store = Arc::new(GatedStore {
        inner: MemoryStore::default(),
        gate: Mutex::new(gate),
    });
    store
        .create(validated(APPLICANT, "CS"))
        .expect("seeded application");
    let lifecycle = Arc::new(AdmissionLifecycle::new(
        store,
        Arc::new(RecordingDispatcher::default()),
        reviewer(),
    ));

    let lookup = tokio::spawn(status_handler::<GatedStore, RecordingDispatcher>(
        State(lifecycle),
        Path(1),
    ));
    tokio::task::yield_now().await;
    open_gate.send(()).expect("gate opens");

    let response = lookup.await.expect("lookup task completes");
    assert_eq!(response.status(), StatusCode::OK);
}
