use crate::domain::tenants::DenialKind;

/// Failure of a use case, carrying the message shown to the caller.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Locked(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{what} not found"))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    pub fn insufficient_permissions() -> Self {
        ServiceError::Forbidden("Insufficient permissions".into())
    }

    pub fn from_denial(kind: DenialKind, message: &str) -> Self {
        match kind {
            DenialKind::Gone => ServiceError::Gone(message.to_string()),
            DenialKind::Forbidden => ServiceError::Forbidden(message.to_string()),
            DenialKind::PaymentRequired => ServiceError::PaymentRequired(message.to_string()),
        }
    }
}
