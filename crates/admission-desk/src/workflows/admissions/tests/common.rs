use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Value};

use crate::workflows::admissions::domain::{
    Application, ApplicationId, ApplicationStatus, ParticipantId, ValidatedApplication,
};
use crate::workflows::admissions::events::SubmissionEvent;
use crate::workflows::admissions::lifecycle::AdmissionLifecycle;
use crate::workflows::admissions::notify::{
    DeliveryError, NotificationDispatcher, OutboundMessage,
};
use crate::workflows::admissions::store::{ApplicationStore, StoreError};

pub(super) const REVIEWER: &str = "900";
pub(super) const APPLICANT: &str = "42";

pub(super) fn reviewer() -> ParticipantId {
    ParticipantId::new(REVIEWER)
}

pub(super) fn applicant() -> ParticipantId {
    ParticipantId::new(APPLICANT)
}

pub(super) fn valid_payload() -> Value {
    json!({
        "fullName": "A B",
        "birthDate": "2000-01-01",
        "email": "a@b.com",
        "level": "Bachelor",
        "direction": "CS",
        "docType": "",
    })
}

pub(super) fn submission_event(payload: &Value) -> SubmissionEvent {
    SubmissionEvent {
        applicant_id: applicant(),
        applicant_handle: Some("ab_student".to_string()),
        raw_payload: payload.to_string(),
    }
}

pub(super) fn validated(applicant_id: &str, direction: &str) -> ValidatedApplication {
    ValidatedApplication {
        applicant_id: ParticipantId::new(applicant_id),
        applicant_handle: None,
        full_name: "A B".to_string(),
        birth_date: "2000-01-01".to_string(),
        email: "a@b.com".to_string(),
        document_type: String::new(),
        program_level: "Bachelor".to_string(),
        direction: direction.to_string(),
        exam_form: "Online entrance examination".to_string(),
    }
}

pub(super) fn build_lifecycle() -> (
    AdmissionLifecycle<MemoryStore, RecordingDispatcher>,
    Arc<MemoryStore>,
    Arc<RecordingDispatcher>,
) {
    let store = Arc::new(MemoryStore::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let lifecycle = AdmissionLifecycle::new(store.clone(), dispatcher.clone(), reviewer());
    (lifecycle, store, dispatcher)
}

#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<Vec<Application>>,
}

impl ApplicationStore for MemoryStore {
    fn create(&self, application: ValidatedApplication) -> Result<Application, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let id = ApplicationId(guard.len() as i64 + 1);
        let record = Application::from_validated(id, application, Utc::now());
        guard.push(record.clone());
        Ok(record)
    }

    fn get(&self, id: ApplicationId) -> Result<Application, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        guard
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn list_by_applicant(
        &self,
        applicant: &ParticipantId,
    ) -> Result<Vec<Application>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|record| &record.applicant_id == applicant)
            .cloned()
            .collect())
    }

    fn set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if !record.status.can_transition_to(status) {
            return Err(StoreError::IllegalTransition {
                id,
                current: record.status,
                requested: status,
            });
        }
        record.status = status;
        Ok(record.clone())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().expect("store mutex poisoned").len())
    }
}

pub(super) struct UnavailableStore;

impl ApplicationStore for UnavailableStore {
    fn create(&self, _application: ValidatedApplication) -> Result<Application, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn get(&self, _id: ApplicationId) -> Result<Application, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_by_applicant(
        &self,
        _applicant: &ParticipantId,
    ) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn set_status(
        &self,
        _id: ApplicationId,
        _status: ApplicationStatus,
    ) -> Result<Application, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Records every message; recipients listed in `unreachable` fail delivery.
#[derive(Default)]
pub(super) struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
    observed: Mutex<Vec<ParticipantId>>,
}

impl RecordingDispatcher {
    pub(super) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }

    pub(super) fn sent_to(&self, recipient: &ParticipantId) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|message| &message.recipient == recipient)
            .collect()
    }

    pub(super) fn make_unreachable(&self, participant: ParticipantId) {
        self.unreachable
            .lock()
            .expect("dispatcher mutex poisoned")
            .insert(participant);
    }

    pub(super) fn observed(&self) -> Vec<ParticipantId> {
        self.observed
            .lock()
            .expect("dispatcher mutex poisoned")
            .clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let unreachable = self.unreachable.lock().expect("dispatcher mutex poisoned");
        if unreachable.contains(&message.recipient) {
            return Err(DeliveryError::Failed {
                recipient: message.recipient.clone(),
                reason: "chat not found".to_string(),
            });
        }
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(message.clone());
        Ok(())
    }

    fn observe_sender(&self, participant: &ParticipantId) {
        self.observed
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(participant.clone());
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
