use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Application, ApplicationId, ApplicationStatus, Decision, ParticipantId};
use super::events::{DecisionEvent, SubmissionEvent};
use super::intake::{SubmissionValidator, ValidationError};
use super::notify::{deliver, DeliveryReport, Notification, NotificationDispatcher};
use super::store::{ApplicationStore, StoreError};

/// Lifecycle engine composing the validator, store, and notification dispatcher.
///
/// Status changes are authoritative: a failed notification is reported in the
/// receipt but never retried and never rolls back the transition.
pub struct AdmissionLifecycle<S, D> {
    validator: SubmissionValidator,
    store: Arc<S>,
    dispatcher: Arc<D>,
    reviewer: ParticipantId,
}

impl<S, D> AdmissionLifecycle<S, D>
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<D>, reviewer: ParticipantId) -> Self {
        Self::with_validator(SubmissionValidator::default(), store, dispatcher, reviewer)
    }

    pub fn with_validator(
        validator: SubmissionValidator,
        store: Arc<S>,
        dispatcher: Arc<D>,
        reviewer: ParticipantId,
    ) -> Self {
        Self {
            validator,
            store,
            dispatcher,
            reviewer,
        }
    }

    pub fn reviewer(&self) -> &ParticipantId {
        &self.reviewer
    }

    pub(crate) fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Validate and persist a submission, then notify the applicant and the reviewer.
    pub fn submit(&self, event: &SubmissionEvent) -> Result<SubmissionReceipt, LifecycleError> {
        let validated = self
            .validator
            .validate_text(
                &event.raw_payload,
                &event.applicant_id,
                event.applicant_handle.as_deref(),
            )
            .inspect_err(|err| {
                info!(applicant = %event.applicant_id, reason = %err, "submission rejected");
            })?;

        let application = self.store.create(validated).inspect_err(|err| {
            warn!(applicant = %event.applicant_id, error = %err, "failed to persist application");
        })?;

        info!(
            application_id = %application.id,
            applicant = %application.applicant_id,
            "application submitted"
        );

        let deliveries = vec![
            self.notify(Notification::Confirmation(&application)),
            self.notify(Notification::NewApplicationSummary(&application)),
        ];

        Ok(SubmissionReceipt {
            application,
            deliveries,
        })
    }

    /// Apply a reviewer decision to a `New` application.
    pub fn decide(&self, event: &DecisionEvent) -> Result<DecisionReceipt, LifecycleError> {
        if event.requester_id != self.reviewer {
            warn!(
                requester = %event.requester_id,
                application_id = %event.application_id,
                "decision attempt from unauthorized participant"
            );
            return Err(LifecycleError::Unauthorized {
                requester: event.requester_id.clone(),
            });
        }

        let target = event.decision.target_status();
        match self.store.set_status(event.application_id, target) {
            Ok(application) => {
                info!(
                    application_id = %application.id,
                    status = application.status.label(),
                    "decision applied"
                );
                let notification = match event.decision {
                    Decision::Approve => Notification::Approved(&application),
                    Decision::Reject => Notification::Rejected(&application),
                };
                let delivery = self.notify(notification);
                Ok(DecisionReceipt {
                    application,
                    decision: event.decision,
                    delivery,
                })
            }
            Err(StoreError::IllegalTransition { id, current, .. }) => {
                info!(
                    application_id = %id,
                    status = current.label(),
                    "application already decided"
                );
                self.notify(Notification::AlreadyDecided {
                    id,
                    status: current,
                });
                Err(LifecycleError::IllegalTransition { id, current })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Applications submitted by `applicant`, most recent first.
    pub fn applications_for(
        &self,
        applicant: &ParticipantId,
    ) -> Result<Vec<Application>, LifecycleError> {
        Ok(self.store.list_by_applicant(applicant)?)
    }

    pub fn get(&self, id: ApplicationId) -> Result<Application, LifecycleError> {
        Ok(self.store.get(id)?)
    }

    fn notify(&self, notification: Notification<'_>) -> DeliveryReport {
        let message = notification.render(&self.reviewer);
        deliver(self.dispatcher.as_ref(), &message)
    }
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub application: Application,
    pub deliveries: Vec<DeliveryReport>,
}

/// Outcome of an applied decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReceipt {
    pub application: Application,
    pub decision: Decision,
    pub delivery: DeliveryReport,
}

/// Error raised by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application {id} has already been decided ({current})")]
    IllegalTransition {
        id: ApplicationId,
        current: ApplicationStatus,
    },
    #[error("participant {requester} is not authorized to review applications")]
    Unauthorized { requester: ParticipantId },
    #[error("unrecognized action '{0}'")]
    UnknownAction(String),
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(reason) => Self::Storage(reason),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::IllegalTransition { id, current, .. } => {
                Self::IllegalTransition { id, current }
            }
        }
    }
}
