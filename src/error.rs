use crate::models::Category;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Statistical classifier used before a trained artifact was loaded
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Trained artifact could not be located at startup
    #[error("Model artifact missing: {0}")]
    ModelArtifactMissing(String),

    /// Training corpus is unusable (empty, no surviving terms, bad rows)
    #[error("Invalid training data: {0}")]
    InvalidTrainingData(String),

    /// A category has too few examples for a stratified split
    #[error("Insufficient examples for category '{category}': {count} (need at least 2)")]
    InsufficientClassRepresentation { category: Category, count: usize },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::ModelNotLoaded => "MODEL_NOT_LOADED",
            AppError::ModelArtifactMissing(_) => "MODEL_ARTIFACT_MISSING",
            AppError::InvalidTrainingData(_) => "INVALID_TRAINING_DATA",
            AppError::InsufficientClassRepresentation { .. } => {
                "INSUFFICIENT_CLASS_REPRESENTATION"
            }
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors that make it impossible to start serving classifications
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ModelArtifactMissing(_) | AppError::Configuration(_)
        )
    }

    /// Errors raised only by an offline training run
    pub fn is_training_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidTrainingData(_) | AppError::InsufficientClassRepresentation { .. }
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
