mod sqlite;

pub use sqlite::SqliteApplicationStore;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, ParticipantId, ValidatedApplication,
};

/// Durable storage for application records.
///
/// Implementations assign ids, stamp `created_at`, and guarantee that the status
/// check-then-set in `set_status` is atomic per application.
pub trait ApplicationStore: Send + Sync {
    /// Insert a new record with status `New` and return it with its assigned id.
    fn create(&self, application: ValidatedApplication) -> Result<Application, StoreError>;
    fn get(&self, id: ApplicationId) -> Result<Application, StoreError>;
    /// Applications of one applicant, most recent first.
    fn list_by_applicant(&self, applicant: &ParticipantId)
        -> Result<Vec<Application>, StoreError>;
    /// Move a `New` application to a terminal status.
    fn set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, StoreError>;
    fn count(&self) -> Result<usize, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("application store unavailable: {0}")]
    Unavailable(String),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application {id} is {current} and cannot become {requested}")]
    IllegalTransition {
        id: ApplicationId,
        current: ApplicationStatus,
        requested: ApplicationStatus,
    },
}
