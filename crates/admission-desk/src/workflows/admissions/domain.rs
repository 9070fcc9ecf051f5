use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier for a submitted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque chat identity of an applicant or of the reviewer, stable across sessions.
///
/// Serialized as a string; chat transports that send numeric ids are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawParticipantId {
    Text(String),
    Numeric(i64),
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match RawParticipantId::deserialize(deserializer)? {
            RawParticipantId::Text(value) => Self(value),
            RawParticipantId::Numeric(value) => Self::from(value),
        })
    }
}

impl ParticipantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ParticipantId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review status of an application. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    New,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Stable lowercase key used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }

    /// Only `New -> Approved` and `New -> Rejected` are legal.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        matches!(self, Self::New) && next.is_terminal()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown application status: {other}")),
        }
    }
}

/// Submission that passed intake validation and is ready to be persisted.
///
/// Applicant identity comes from the transport's sender metadata, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedApplication {
    pub applicant_id: ParticipantId,
    pub applicant_handle: Option<String>,
    pub full_name: String,
    pub birth_date: String,
    pub email: String,
    pub document_type: String,
    pub program_level: String,
    pub direction: String,
    pub exam_form: String,
}

/// Persisted application. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: ParticipantId,
    pub applicant_handle: Option<String>,
    pub full_name: String,
    pub birth_date: String,
    pub email: String,
    pub document_type: String,
    pub program_level: String,
    pub direction: String,
    pub exam_form: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub(crate) fn from_validated(
        id: ApplicationId,
        validated: ValidatedApplication,
        created_at: DateTime<Utc>,
    ) -> Self {
        let ValidatedApplication {
            applicant_id,
            applicant_handle,
            full_name,
            birth_date,
            email,
            document_type,
            program_level,
            direction,
            exam_form,
        } = validated;

        Self {
            id,
            applicant_id,
            applicant_handle,
            full_name,
            birth_date,
            email,
            document_type,
            program_level,
            direction,
            exam_form,
            status: ApplicationStatus::New,
            created_at,
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id,
            status: self.status.label(),
            direction: self.direction.clone(),
            program_level: self.program_level.clone(),
            created_at: self.created_at,
        }
    }
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    pub direction: String,
    pub program_level: String,
    pub created_at: DateTime<Utc>,
}

/// Reviewer verdict on a `New` application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> ApplicationStatus {
        match self {
            Self::Approve => ApplicationStatus::Approved,
            Self::Reject => ApplicationStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Decision encoded as an interactive action name, e.g. `approve:7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionCommand {
    pub decision: Decision,
    pub application_id: ApplicationId,
}

impl fmt::Display for DecisionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.decision.as_str(), self.application_id)
    }
}

impl FromStr for DecisionCommand {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (verb, id) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("decision action '{value}' is missing an application id"))?;

        let decision = match verb {
            "approve" => Decision::Approve,
            "reject" => Decision::Reject,
            other => return Err(format!("unknown decision '{other}'")),
        };
        let application_id = id
            .parse::<i64>()
            .map(ApplicationId)
            .map_err(|err| format!("invalid application id '{id}' ({err})"))?;

        Ok(Self {
            decision,
            application_id,
        })
    }
}
