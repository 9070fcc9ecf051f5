use std::collections::BTreeMap;

use serde_json::Value;

use super::domain::{ParticipantId, ValidatedApplication};

/// Exam form stamped on applications when none is configured.
pub const DEFAULT_EXAM_FORM: &str = "Online entrance examination";

/// Untyped key/value payload produced by the intake form.
pub type RawSubmission = BTreeMap<String, String>;

/// Validation errors raised while turning a raw payload into an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("submission payload is not a structured object: {0}")]
    MalformedPayload(String),
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

struct FieldAliases {
    canonical: &'static str,
    aliases: &'static [&'static str],
}

// Older form revisions used the short keys; newer ones send camelCase.
const FULL_NAME: FieldAliases = FieldAliases {
    canonical: "fullName",
    aliases: &["fullName", "full_name", "fio"],
};
const BIRTH_DATE: FieldAliases = FieldAliases {
    canonical: "birthDate",
    aliases: &["birthDate", "birth_date", "birth"],
};
const EMAIL: FieldAliases = FieldAliases {
    canonical: "email",
    aliases: &["email"],
};
const LEVEL: FieldAliases = FieldAliases {
    canonical: "level",
    aliases: &["level", "programLevel", "program_level"],
};
const DIRECTION: FieldAliases = FieldAliases {
    canonical: "direction",
    aliases: &["direction"],
};
const DOCUMENT_TYPE: FieldAliases = FieldAliases {
    canonical: "docType",
    aliases: &["docType", "documentType", "doc_type", "document_type"],
};

/// Parse the serialized form payload into an untyped key/value map.
///
/// `null` values are dropped, scalars are kept in their text form, and nested
/// arrays or objects make the whole payload malformed.
pub fn parse_payload(raw: &str) -> Result<RawSubmission, ValidationError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(ValidationError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let mut payload = RawSubmission::new();
    for (key, value) in fields {
        let text = match value {
            Value::Null => continue,
            Value::String(text) => text,
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ValidationError::MalformedPayload(format!(
                    "field `{key}` must be a scalar value"
                )))
            }
        };
        payload.insert(key, text);
    }

    Ok(payload)
}

/// Pure validator converting intake payloads into `ValidatedApplication` values.
#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    exam_form: String,
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_EXAM_FORM)
    }
}

impl SubmissionValidator {
    pub fn new(exam_form: impl Into<String>) -> Self {
        let exam_form = exam_form.into();
        let exam_form = if exam_form.trim().is_empty() {
            DEFAULT_EXAM_FORM.to_string()
        } else {
            exam_form.trim().to_string()
        };
        Self { exam_form }
    }

    pub fn exam_form(&self) -> &str {
        &self.exam_form
    }

    /// Validate a payload, reporting the first missing required field in form order.
    pub fn validate(
        &self,
        payload: &RawSubmission,
        applicant_id: &ParticipantId,
        applicant_handle: Option<&str>,
    ) -> Result<ValidatedApplication, ValidationError> {
        let full_name = required(payload, &FULL_NAME)?;
        let birth_date = required(payload, &BIRTH_DATE)?;
        let email = required(payload, &EMAIL)?;
        let program_level = required(payload, &LEVEL)?;
        let direction = required(payload, &DIRECTION)?;
        let document_type = lookup(payload, &DOCUMENT_TYPE).unwrap_or_default();

        let applicant_handle = applicant_handle
            .map(|handle| handle.trim().trim_start_matches('@').to_string())
            .filter(|handle| !handle.is_empty());

        Ok(ValidatedApplication {
            applicant_id: applicant_id.clone(),
            applicant_handle,
            full_name,
            birth_date,
            email,
            document_type,
            program_level,
            direction,
            exam_form: self.exam_form.clone(),
        })
    }

    /// Parse and validate the raw text of an inbound submission event.
    pub fn validate_text(
        &self,
        raw: &str,
        applicant_id: &ParticipantId,
        applicant_handle: Option<&str>,
    ) -> Result<ValidatedApplication, ValidationError> {
        let payload = parse_payload(raw)?;
        self.validate(&payload, applicant_id, applicant_handle)
    }
}

fn lookup(payload: &RawSubmission, field: &FieldAliases) -> Option<String> {
    field
        .aliases
        .iter()
        .filter_map(|alias| payload.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(payload: &RawSubmission, field: &FieldAliases) -> Result<String, ValidationError> {
    lookup(payload, field).ok_or(ValidationError::MissingField(field.canonical))
}
