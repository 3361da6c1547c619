use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("PRECONDITION: {0}")]
    PreconditionViolation(String),
    #[error("INVALID_DATE: {0}")]
    InvalidDate(String),
    #[error("STALE_WRITE: {0}")]
    StaleWrite(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORAGE: {0}")]
    Storage(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
