use thiserror::Error;

/// Errors surfaced by the chat exchange pipeline.
///
/// `Timeout` and `Initialization` are absorbed at the orchestration boundary
/// and converted into canned assistant messages; `NotFound` and `Validation`
/// map to client errors; `Unexpected` rolls the exchange back.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("semantic engine was not ready in time")]
    Timeout,

    #[error("semantic engine initialization failed: {0}")]
    Initialization(String),

    #[error("conversation not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepositoryError> for ChatError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Unexpected(other.to_string()),
        }
    }
}

/// Errors from the semantic engine collaborator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("engine processing failed: {0}")]
    Processing(String),
}

/// Errors from repository operations (used by trait definitions in moneta-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
