use thiserror::Error;

/// Errors raised by the customer store and its collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
    /// Status change aimed at an identifier the collection does not hold
    #[error("customer not found: {0}")]
    NotFound(u32),

    /// Status string outside New / Contract Sent / Contract Signed
    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    /// Seed list repeats an identifier
    #[error("duplicate customer id in seed: {0}")]
    DuplicateId(u32),

    /// Persistence collaborator rejected an update
    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CrmError {
    /// Stable machine-readable code used by the JSON API
    pub fn code(&self) -> &'static str {
        match self {
            CrmError::NotFound(_) => "not_found",
            CrmError::InvalidStatus(_) => "invalid_status",
            CrmError::DuplicateId(_) => "duplicate_id",
            CrmError::Backend(_) => "backend",
            CrmError::Config(_) => "config",
        }
    }
}

pub type CrmResult<T> = std::result::Result<T, CrmError>;
