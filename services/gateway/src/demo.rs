use crate::infra::OutboxDispatcher;
use admission_desk::config::StorageConfig;
use admission_desk::error::AppError;
use admission_desk::workflows::admissions::events::render_application_list;
use admission_desk::workflows::admissions::{
    route_event, ActionEvent, AdmissionLifecycle, Application, ApplicationId, ApplicationStore,
    Decision, DecisionEvent, EventResponse, InboundEvent, ListRequestEvent, ParticipantId,
    SqliteApplicationStore, StartEvent, SubmissionEvent,
};
use clap::{Args, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub(crate) enum ApplicationsCommand {
    /// List one applicant's applications, most recent first
    List(ListArgs),
    /// Show a single application
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Applicant chat id
    #[arg(long)]
    pub(crate) applicant: String,
    /// Database file (defaults to DB_PATH)
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ShowArgs {
    /// Application number
    pub(crate) id: i64,
    /// Database file (defaults to DB_PATH)
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Reviewer chat id used for the scenarios
    #[arg(long, default_value = "900")]
    pub(crate) reviewer: String,
    /// Applicant chat id used for the scenarios
    #[arg(long, default_value = "42")]
    pub(crate) applicant: String,
}

pub(crate) fn run_applications(command: ApplicationsCommand) -> Result<(), AppError> {
    match command {
        ApplicationsCommand::List(args) => {
            let store = open_store(args.db)?;
            let applications = store.list_by_applicant(&ParticipantId::new(args.applicant))?;
            println!("{}", render_application_list(&applications));
        }
        ApplicationsCommand::Show(args) => {
            let store = open_store(args.db)?;
            let application = store.get(ApplicationId(args.id))?;
            render_application(&application);
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let reviewer = ParticipantId::new(args.reviewer);
    let applicant = ParticipantId::new(args.applicant);

    let store = Arc::new(SqliteApplicationStore::open_in_memory()?);
    let outbox = Arc::new(OutboxDispatcher::new(64));
    outbox.register_contact(reviewer.clone());
    let lifecycle = AdmissionLifecycle::new(store.clone(), outbox.clone(), reviewer.clone());

    println!("Admission desk demo");

    let events = [
        (
            "Applicant opens the chat",
            InboundEvent::Start(StartEvent {
                participant_id: applicant.clone(),
            }),
        ),
        (
            "Applicant submits a complete form",
            InboundEvent::Submission(SubmissionEvent {
                applicant_id: applicant.clone(),
                applicant_handle: Some("ab_student".to_string()),
                raw_payload: json!({
                    "fullName": "A B",
                    "birthDate": "2000-01-01",
                    "email": "a@b.com",
                    "level": "Bachelor",
                    "direction": "CS",
                    "docType": "",
                })
                .to_string(),
            }),
        ),
        (
            "Applicant submits a form without a name",
            InboundEvent::Submission(SubmissionEvent {
                applicant_id: applicant.clone(),
                applicant_handle: None,
                raw_payload: json!({
                    "fullName": "",
                    "birthDate": "2000-01-01",
                    "email": "a@b.com",
                    "level": "Bachelor",
                    "direction": "CS",
                })
                .to_string(),
            }),
        ),
        (
            "Someone other than the reviewer tries to approve",
            InboundEvent::Decision(DecisionEvent {
                requester_id: applicant.clone(),
                application_id: ApplicationId(1),
                decision: Decision::Approve,
            }),
        ),
        (
            "Reviewer approves application №1",
            InboundEvent::Decision(DecisionEvent {
                requester_id: reviewer.clone(),
                application_id: ApplicationId(1),
                decision: Decision::Approve,
            }),
        ),
        (
            "Reviewer presses \"Approve\" on application №1 again",
            InboundEvent::Action(ActionEvent {
                requester_id: reviewer.clone(),
                action: "approve:1".to_string(),
            }),
        ),
        (
            "Applicant asks for their applications",
            InboundEvent::List(ListRequestEvent {
                applicant_id: applicant.clone(),
            }),
        ),
    ];

    for (title, event) in events {
        println!("\n== {title}");
        match route_event(&lifecycle, &event) {
            Ok(response) => render_response("reply", &response),
            Err(err) => {
                println!("error: {err}");
                render_response("reply", &err.user_reply());
            }
        }

        for message in outbox.drain() {
            println!(
                "-> {} ({:?}, {}): {}",
                message.recipient,
                message.audience,
                message.kind.label(),
                message.text.replace('\n', "\n   ")
            );
            for action in &message.actions {
                println!("   [{}] {}", action.name, action.label);
            }
        }
    }

    println!("\nStored applications: {}", store.count()?);
    Ok(())
}

fn render_response(prefix: &str, response: &EventResponse) {
    if let Some(reply) = &response.reply {
        println!("{prefix}: {}", reply.replace('\n', "\n   "));
    }
    if !response.actions.is_empty() {
        let names: Vec<&str> = response
            .actions
            .iter()
            .map(|action| action.label.as_str())
            .collect();
        println!("actions: {}", names.join(" | "));
    }
}

fn render_application(application: &Application) {
    println!("Application №{}", application.id);
    println!("Status: {}", application.status);
    println!(
        "Applicant: {} ({})",
        application.applicant_id,
        application
            .applicant_handle
            .as_deref()
            .map(|handle| format!("@{handle}"))
            .unwrap_or_else(|| "—".to_string())
    );
    println!("Full name: {}", application.full_name);
    println!("Date of birth: {}", application.birth_date);
    println!("Email: {}", application.email);
    println!("Education document: {}", application.document_type);
    println!("Level: {}", application.program_level);
    println!("Direction: {}", application.direction);
    println!("Exam form: {}", application.exam_form);
    println!("Submitted: {}", application.created_at.to_rfc3339());
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteApplicationStore, AppError> {
    let path = db.unwrap_or_else(|| StorageConfig::load().db_path);
    Ok(SqliteApplicationStore::open(path)?)
}
