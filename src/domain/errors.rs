//! Errors raised by the story model

/// Failure of a domain operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A value broke one of the model's invariants
    #[error("Validation error: {0}")]
    Validation(String),
    /// A lookup by key found nothing
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
