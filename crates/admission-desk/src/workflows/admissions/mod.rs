//! Admission application intake, review lifecycle, and notification delivery.
//!
//! Submissions flow through the validator into the store; the lifecycle engine owns
//! the `New -> Approved | Rejected` transitions and decides which party is notified.

pub mod domain;
pub mod events;
pub mod intake;
pub mod lifecycle;
pub mod notify;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationStatusView, Decision,
    DecisionCommand, ParticipantId, ValidatedApplication,
};
pub use events::{
    route_event, ActionEvent, DecisionEvent, EventResponse, InboundEvent, ListRequestEvent,
    StartEvent, SubmissionEvent,
};
pub use intake::{parse_payload, RawSubmission, SubmissionValidator, ValidationError};
pub use lifecycle::{AdmissionLifecycle, DecisionReceipt, LifecycleError, SubmissionReceipt};
pub use notify::{
    Audience, DeliveryError, DeliveryOutcome, DeliveryReport, MessageAction, Notification,
    NotificationDispatcher, NotificationKind, OutboundMessage,
};
pub use router::admissions_router;
pub use store::{ApplicationStore, SqliteApplicationStore, StoreError};
