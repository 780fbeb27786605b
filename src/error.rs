/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Document store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
