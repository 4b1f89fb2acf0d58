//! Error taxonomy shared by every service operation.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::models::UnknownVariant;

/// Outcome class used when turning a result into a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Read or update succeeded.
    Ok,
    /// A new row was stored.
    Created,
    /// Input failed validation.
    BadRequest,
    /// Credentials or identity could not be established.
    Unauthorized,
    /// The actor lacks the required role or ownership.
    Forbidden,
    /// The target row does not exist or is hidden from the actor.
    NotFound,
    /// A uniqueness constraint would be violated.
    Conflict,
    /// Storage or infrastructure failure.
    ServerError,
}

impl StatusKind {
    /// HTTP status code conventionally associated with this outcome.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ServerError => 500,
        }
    }
}

/// Errors raised by service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input was missing or malformed, or the state machine forbids the move.
    #[error("{0}")]
    Validation(String),
    /// Credentials were rejected.
    #[error("{0}")]
    Authentication(String),
    /// The actor is not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),
    /// The referenced row does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A row with the same unique key already exists.
    #[error("{0}")]
    Conflict(String),
    /// The database reported a failure.
    #[error("database error: {0}")]
    Store(DieselError),
    /// A pooled connection could not be obtained.
    #[error("connection pool error: {0}")]
    Pool(String),
    /// Password hashing failed.
    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Validation`].
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    /// Shorthand for [`ServiceError::NotFound`].
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

    /// Shorthand for [`ServiceError::Forbidden`].
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }

    /// Shorthand for [`ServiceError::Conflict`].
    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }

    /// Outcome class for this error.
    #[must_use]
    pub const fn status(&self) -> StatusKind {
        match self {
            Self::Validation(_) => StatusKind::BadRequest,
            Self::Authentication(_) => StatusKind::Unauthorized,
            Self::Forbidden(_) => StatusKind::Forbidden,
            Self::NotFound(_) => StatusKind::NotFound,
            Self::Conflict(_) => StatusKind::Conflict,
            Self::Store(_) | Self::Pool(_) | Self::Hashing(_) => StatusKind::ServerError,
        }
    }

    /// Stable machine-readable error category.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failure",
            Self::Authentication(_) => "authentication_failure",
            Self::Forbidden(_) => "authorization_failure",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store(_) | Self::Pool(_) | Self::Hashing(_) => "store_failure",
        }
    }

    /// Whether this error reflects an infrastructure fault rather than a
    /// caller mistake.
    #[must_use]
    pub const fn is_internal(&self) -> bool { matches!(self.status(), StatusKind::ServerError) }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("Resource not found".to_owned()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(format!("Duplicate entry: {}", info.message()))
            }
            other => Self::Store(other),
        }
    }
}

impl From<UnknownVariant> for ServiceError {
    fn from(err: UnknownVariant) -> Self { Self::Validation(err.to_string()) }
}

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;
