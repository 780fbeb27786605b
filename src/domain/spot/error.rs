use crate::domain::serialization::CodecError;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum SpotServiceError {
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("spot not found")]
    NotFound,
    #[error("spot name already taken")]
    NameConflict,
    #[error("spot id is required for this operation")]
    MissingId,
    #[error("spot left partially written: {0}")]
    PartialWrite(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for SpotServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => SpotServiceError::Invalid(msg),
            AppError::NotFound(_) => SpotServiceError::NotFound,
            AppError::Conflict(_) => SpotServiceError::NameConflict,
            _ => SpotServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<CodecError> for SpotServiceError {
    fn from(err: CodecError) -> Self {
        SpotServiceError::Invalid(err.to_string())
    }
}

impl From<SpotServiceError> for AppError {
    fn from(err: SpotServiceError) -> Self {
        match err {
            SpotServiceError::Invalid(msg) => AppError::BadRequest(msg),
            SpotServiceError::NotFound => AppError::NotFound("Spot not found".to_string()),
            SpotServiceError::NameConflict => {
                AppError::Conflict("Spot name already exists".to_string())
            }
            SpotServiceError::MissingId => {
                AppError::BadRequest("Spot id is required".to_string())
            }
            SpotServiceError::PartialWrite(msg) => AppError::Internal(msg),
            SpotServiceError::Dependency(msg) => AppError::Internal(msg),
            SpotServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
