use serde_json::Value;
use thiserror::Error;

use crate::status::StatusCode;

/// Errors raised while handling a REST call.
///
/// Every variant is caught at the dispatch boundary and turned into a JSON
/// envelope; none of them escape [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field-level validation failed for a submitted resource.
    #[error("Resource validation error for {resource}")]
    Validation {
        /// Name the validation details are reported under
        resource: String,
        /// Per-field details, rendered verbatim
        errors: Value,
        /// Status to answer with (400 unless overridden)
        status: StatusCode,
    },

    /// A business rule rejected the call with an explicit status.
    #[error("{message}")]
    Domain {
        /// Status chosen by the raising site
        status: StatusCode,
        /// Message shown to the caller
        message: String,
    },

    /// Anything the action did not anticipate.
    ///
    /// Always logged; its detail only reaches the caller in development.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`ApiError::Validation`]
    Validation,
    /// See [`ApiError::Domain`]
    Domain,
    /// See [`ApiError::Unexpected`]
    Unexpected,
}

impl ApiError {
    /// Creates a domain error with an explicit status.
    pub fn domain(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Domain {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 validation error reported under `resource`.
    pub fn validation(resource: impl Into<String>, errors: impl Into<Value>) -> Self {
        ApiError::Validation {
            resource: resource.into(),
            errors: errors.into(),
            status: StatusCode::BadRequest,
        }
    }

    /// Wraps any error as an unexpected failure.
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Unexpected(err.into())
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::BadRequest, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::Forbidden, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::NotFound, message)
    }

    /// 405 Method Not Allowed.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::MethodNotAllowed, message)
    }

    /// 501 Not Implemented.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::NotImplemented, message)
    }

    /// Replaces the status of a validation or domain error.
    ///
    /// Unexpected errors always answer 500 and are returned unchanged.
    pub fn with_status(mut self, new_status: StatusCode) -> Self {
        match &mut self {
            ApiError::Validation { status, .. } | ApiError::Domain { status, .. } => {
                *status = new_status;
            }
            ApiError::Unexpected(_) => {}
        }
        self
    }

    /// Returns the HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { status, .. } | ApiError::Domain { status, .. } => *status,
            ApiError::Unexpected(_) => StatusCode::InternalError,
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Domain { .. } => ErrorKind::Domain,
            ApiError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Unexpected(err.into())
    }
}
