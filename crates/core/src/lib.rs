//! Shared primitives for all Rust crates in Fieldlens.

#![forbid(unsafe_code)]

/// Session and org-domain primitives shared across services.
pub mod auth;

use thiserror::Error;

pub use auth::{OrgDomain, SessionToken};

/// Result type used across Fieldlens crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation collides with another in-flight operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No session token could be obtained for the org.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Remote call failed at the transport level or with a non-success status.
    #[error("{}", format_network_error(*status, body))]
    Network {
        /// HTTP status code when the server answered.
        status: Option<u16>,
        /// Response body or transport error description.
        body: String,
    },

    /// Remote payload did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Creates a network error for a non-success HTTP status.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            body: body.into(),
        }
    }

    /// Creates a network error for a request that never got a response.
    #[must_use]
    pub fn transport(body: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            body: body.into(),
        }
    }
}

fn format_network_error(status: Option<u16>, body: &str) -> String {
    match status {
        Some(status) => format!("network error: request failed with status {status}: {body}"),
        None => format!("network error: {body}"),
    }
}
