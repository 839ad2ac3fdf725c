//! Error types for profile onboarding.

use std::time::Duration;

use crate::onboarding::extract::RejectReason;
use crate::onboarding::model::Field;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Generation is disabled")]
    Disabled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Onboarding flow errors.
///
/// None of these is fatal to a session: the resolver and orchestrator turn
/// each one into a localized message and, at worst, repeat a question.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Invalid value for {field}: {reason:?}")]
    Validation { field: Field, reason: RejectReason },

    #[error("Display name already taken: {0}")]
    UniquenessConflict(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Cannot set {0} before consent is given")]
    ConsentRequired(Field),

    #[error("Unknown field key: {0}")]
    UnknownField(String),

    #[error("No onboarding session for user {0}")]
    SessionNotFound(String),
}

impl DatabaseError {
    /// Whether the error is a unique-constraint violation on the display name.
    pub fn is_display_name_conflict(&self) -> bool {
        match self {
            Self::Constraint(msg) => msg.contains("display_name"),
            _ => false,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
