//! Inbound event kinds and the router that maps each kind to its lifecycle handler.

use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationId, Decision, DecisionCommand, ParticipantId};
use super::intake::ValidationError;
use super::lifecycle::{AdmissionLifecycle, LifecycleError};
use super::notify::{
    main_menu_actions, MessageAction, NotificationDispatcher, MY_APPLICATIONS_ACTION,
};
use super::store::ApplicationStore;

/// Raw intake-form submission from an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub applicant_id: ParticipantId,
    #[serde(default)]
    pub applicant_handle: Option<String>,
    pub raw_payload: String,
}

/// Reviewer verdict request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub requester_id: ParticipantId,
    pub application_id: ApplicationId,
    pub decision: Decision,
}

/// "My applications" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequestEvent {
    pub applicant_id: ParticipantId,
}

/// Press of a named action attached to an earlier message, e.g. `approve:7`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub requester_id: ParticipantId,
    pub action: String,
}

/// First contact / greeting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Start(StartEvent),
    Submission(SubmissionEvent),
    Decision(DecisionEvent),
    List(ListRequestEvent),
    Action(ActionEvent),
}

impl InboundEvent {
    pub fn sender(&self) -> &ParticipantId {
        match self {
            Self::Start(event) => &event.participant_id,
            Self::Submission(event) => &event.applicant_id,
            Self::Decision(event) => &event.requester_id,
            Self::List(event) => &event.applicant_id,
            Self::Action(event) => &event.requester_id,
        }
    }
}

/// Rendering-agnostic reply to the sender of an event.
///
/// `reply` is `None` when the sender was already reached through a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub reply: Option<String>,
    #[serde(default)]
    pub actions: Vec<MessageAction>,
}

impl EventResponse {
    pub fn text(reply: impl Into<String>, actions: Vec<MessageAction>) -> Self {
        Self {
            reply: Some(reply.into()),
            actions,
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }
}

pub const WELCOME_TEXT: &str = "Hello! 👋\n\n\
    This is the admissions office assistant for entrance examination sign-up.\n\n\
    Press \"Fill in the application form\", complete the form and send your application.\n\
    Once it is processed you will receive access to the personal account for the \
    entrance examinations.";

/// Route one inbound event to its handler.
pub fn route_event<S, D>(
    lifecycle: &AdmissionLifecycle<S, D>,
    event: &InboundEvent,
) -> Result<EventResponse, LifecycleError>
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    lifecycle.dispatcher().observe_sender(event.sender());

    match event {
        InboundEvent::Start(_) => Ok(EventResponse::text(WELCOME_TEXT, main_menu_actions())),
        InboundEvent::Submission(event) => {
            lifecycle.submit(event)?;
            Ok(EventResponse::silent())
        }
        InboundEvent::Decision(event) => decision_reply(lifecycle, event),
        InboundEvent::List(event) => listing_reply(lifecycle, &event.applicant_id),
        InboundEvent::Action(event) => action_reply(lifecycle, event),
    }
}

fn decision_reply<S, D>(
    lifecycle: &AdmissionLifecycle<S, D>,
    event: &DecisionEvent,
) -> Result<EventResponse, LifecycleError>
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    let receipt = lifecycle.decide(event)?;
    let follow_up = if receipt.delivery.delivered() {
        "The applicant has been notified."
    } else {
        "The applicant could not be notified."
    };
    Ok(EventResponse::text(
        format!(
            "Application №{} marked {}. {follow_up}",
            receipt.application.id, receipt.application.status
        ),
        Vec::new(),
    ))
}

fn listing_reply<S, D>(
    lifecycle: &AdmissionLifecycle<S, D>,
    applicant: &ParticipantId,
) -> Result<EventResponse, LifecycleError>
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    let applications = lifecycle.applications_for(applicant)?;
    Ok(EventResponse::text(
        render_application_list(&applications),
        main_menu_actions(),
    ))
}

/// Decode an action name back into the event it stands for.
fn action_reply<S, D>(
    lifecycle: &AdmissionLifecycle<S, D>,
    event: &ActionEvent,
) -> Result<EventResponse, LifecycleError>
where
    S: ApplicationStore + 'static,
    D: NotificationDispatcher + 'static,
{
    let action = event.action.trim();
    if action == MY_APPLICATIONS_ACTION {
        return listing_reply(lifecycle, &event.requester_id);
    }

    let command: DecisionCommand = action
        .parse()
        .map_err(|_| LifecycleError::UnknownAction(action.to_string()))?;
    decision_reply(
        lifecycle,
        &DecisionEvent {
            requester_id: event.requester_id.clone(),
            application_id: command.application_id,
            decision: command.decision,
        },
    )
}

pub fn render_application_list(applications: &[Application]) -> String {
    if applications.is_empty() {
        return "You have not submitted any applications yet.".to_string();
    }

    let lines: Vec<String> = applications
        .iter()
        .map(|app| {
            format!(
                "• №{}: {} — {} — {}",
                app.id, app.direction, app.program_level, app.status
            )
        })
        .collect();

    format!("Your applications:\n\n{}", lines.join("\n"))
}

impl LifecycleError {
    /// Explanatory reply for the sender of the event that failed.
    pub fn user_reply(&self) -> EventResponse {
        match self {
            Self::Validation(ValidationError::MalformedPayload(_)) => EventResponse::text(
                "We could not read your application data. Please try again a little later.",
                main_menu_actions(),
            ),
            Self::Validation(ValidationError::MissingField(field)) => EventResponse::text(
                format!(
                    "Your application is incomplete: the field \"{}\" is required. \
                     Please fill in the form again.",
                    field_label(field)
                ),
                main_menu_actions(),
            ),
            Self::Storage(_) => EventResponse::text(
                "Something went wrong while saving your request. Please try again later \
                 or contact the admissions office directly.",
                main_menu_actions(),
            ),
            Self::NotFound(id) => {
                EventResponse::text(format!("Application №{id} was not found."), Vec::new())
            }
            // The soft denial already went out through the dispatcher.
            Self::IllegalTransition { .. } => EventResponse::silent(),
            Self::Unauthorized { .. } => EventResponse::text(
                "Only the admissions reviewer can make decisions on applications.",
                Vec::new(),
            ),
            Self::UnknownAction(_) => EventResponse::text(
                "This button is no longer available. Please use the menu below.",
                main_menu_actions(),
            ),
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "fullName" => "Full name",
        "birthDate" => "Date of birth",
        "email" => "Email",
        "level" => "Level",
        "direction" => "Direction",
        other => other,
    }
}
