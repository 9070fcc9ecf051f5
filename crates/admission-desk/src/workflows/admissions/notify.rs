use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Decision, DecisionCommand, ParticipantId,
};

/// Action name that opens the intake form.
pub const FILL_FORM_ACTION: &str = "fill_form";
/// Action name that lists the applicant's own applications.
pub const MY_APPLICATIONS_ACTION: &str = "my_applications";

/// Party a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Applicant,
    Reviewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    NewApplicationSummary,
    Approved,
    Rejected,
    AlreadyDecided,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::NewApplicationSummary => "new_application_summary",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AlreadyDecided => "already_decided",
        }
    }
}

/// Named interactive control; the transport decides how to present it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    pub name: String,
    pub label: String,
}

impl MessageAction {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Actions attached to every applicant-facing reply.
pub fn main_menu_actions() -> Vec<MessageAction> {
    vec![
        MessageAction::new(FILL_FORM_ACTION, "Fill in the application form"),
        MessageAction::new(MY_APPLICATIONS_ACTION, "My applications"),
    ]
}

/// Approve/reject controls embedded in the reviewer summary.
pub fn decision_actions(id: ApplicationId) -> Vec<MessageAction> {
    [(Decision::Approve, "Approve"), (Decision::Reject, "Reject")]
        .into_iter()
        .map(|(decision, label)| {
            let command = DecisionCommand {
                decision,
                application_id: id,
            };
            MessageAction::new(command.to_string(), label)
        })
        .collect()
}

/// Rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: ParticipantId,
    pub audience: Audience,
    pub kind: NotificationKind,
    pub application_id: ApplicationId,
    pub text: String,
    pub actions: Vec<MessageAction>,
}

/// Outbound delivery hook. Each call is independent of every other call.
pub trait NotificationDispatcher: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;

    /// Record that `participant` has contacted us; some transports can only
    /// reach participants that spoke first.
    fn observe_sender(&self, _participant: &ParticipantId) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery to {recipient} failed: {reason}")]
    Failed {
        recipient: ParticipantId,
        reason: String,
    },
}

/// Notification events emitted by the lifecycle.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    Confirmation(&'a Application),
    NewApplicationSummary(&'a Application),
    Approved(&'a Application),
    Rejected(&'a Application),
    AlreadyDecided {
        id: ApplicationId,
        status: ApplicationStatus,
    },
}

impl Notification<'_> {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Confirmation(_) => NotificationKind::Confirmation,
            Self::NewApplicationSummary(_) => NotificationKind::NewApplicationSummary,
            Self::Approved(_) => NotificationKind::Approved,
            Self::Rejected(_) => NotificationKind::Rejected,
            Self::AlreadyDecided { .. } => NotificationKind::AlreadyDecided,
        }
    }

    pub fn audience(&self) -> Audience {
        match self {
            Self::Confirmation(_) | Self::Approved(_) | Self::Rejected(_) => Audience::Applicant,
            Self::NewApplicationSummary(_) | Self::AlreadyDecided { .. } => Audience::Reviewer,
        }
    }

    fn application_id(&self) -> ApplicationId {
        match self {
            Self::Confirmation(app)
            | Self::NewApplicationSummary(app)
            | Self::Approved(app)
            | Self::Rejected(app) => app.id,
            Self::AlreadyDecided { id, .. } => *id,
        }
    }

    /// Render the message for its recipient. Reviewer-bound messages go to `reviewer`.
    pub fn render(&self, reviewer: &ParticipantId) -> OutboundMessage {
        let recipient = match self {
            Self::Confirmation(app) | Self::Approved(app) | Self::Rejected(app) => {
                app.applicant_id.clone()
            }
            Self::NewApplicationSummary(_) | Self::AlreadyDecided { .. } => reviewer.clone(),
        };

        let (text, actions) = match self {
            Self::Confirmation(app) => (confirmation_text(app), main_menu_actions()),
            Self::NewApplicationSummary(app) => (summary_text(app), decision_actions(app.id)),
            Self::Approved(app) => (
                format!(
                    "🎉 Your application №{} has been approved.\n\n\
                     Access to the personal account for the entrance examinations \
                     ({}) will be sent to you shortly.",
                    app.id, app.exam_form
                ),
                main_menu_actions(),
            ),
            Self::Rejected(app) => (
                format!(
                    "Unfortunately, your application №{} has been rejected.\n\n\
                     Please contact the admissions office if you have any questions.",
                    app.id
                ),
                main_menu_actions(),
            ),
            Self::AlreadyDecided { id, status } => (
                format!("Application №{id} has already been decided: {status}."),
                Vec::new(),
            ),
        };

        OutboundMessage {
            recipient,
            audience: self.audience(),
            kind: self.kind(),
            application_id: self.application_id(),
            text,
            actions,
        }
    }
}

fn confirmation_text(app: &Application) -> String {
    format!(
        "✅ Your application №{} for the entrance examinations has been received.\n\n\
         Submitted details:\n\
         • Full name: {}\n\
         • Date of birth: {}\n\
         • Email: {}\n\
         • Education document: {}\n\
         • Level: {}\n\
         • Direction: {}\n\n\
         Once the application is processed you will receive access to the personal \
         account for the entrance examinations.",
        app.id,
        app.full_name,
        app.birth_date,
        app.email,
        display_or_dash(&app.document_type),
        app.program_level,
        app.direction,
    )
}

fn summary_text(app: &Application) -> String {
    let handle = app
        .applicant_handle
        .as_deref()
        .map(|handle| format!("@{handle}"))
        .unwrap_or_else(|| "—".to_string());

    format!(
        "📥 New application for the entrance examinations\n\n\
         № {}\n\n\
         👤 Applicant: {}\n\
         Chat: {} (id: {})\n\n\
         📄 Document: {}\n\
         🎓 Level: {}\n\
         📚 Direction: {}\n\
         📝 Exam form: {}\n\
         📧 Email: {}\n\
         📅 Date of birth: {}",
        app.id,
        app.full_name,
        handle,
        app.applicant_id,
        display_or_dash(&app.document_type),
        app.program_level,
        app.direction,
        app.exam_form,
        app.email,
        app.birth_date,
    )
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "—"
    } else {
        value
    }
}

/// Observable result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub kind: NotificationKind,
    pub audience: Audience,
    pub recipient: ParticipantId,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered)
    }
}

/// Attempt a single delivery. Failures are logged and reported, never retried.
pub fn deliver<D>(dispatcher: &D, message: &OutboundMessage) -> DeliveryReport
where
    D: NotificationDispatcher + ?Sized,
{
    let outcome = match dispatcher.send(message) {
        Ok(()) => {
            debug!(
                recipient = %message.recipient,
                kind = message.kind.label(),
                application_id = %message.application_id,
                "notification delivered"
            );
            DeliveryOutcome::Delivered
        }
        Err(err) => {
            warn!(
                recipient = %message.recipient,
                kind = message.kind.label(),
                application_id = %message.application_id,
                error = %err,
                "notification delivery failed"
            );
            DeliveryOutcome::Failed(err.to_string())
        }
    };

    DeliveryReport {
        kind: message.kind,
        audience: message.audience,
        recipient: message.recipient.clone(),
        outcome,
    }
}
