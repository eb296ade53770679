use std::fmt::{Debug, Display, Formatter};

use crate::{AppError, AppResult};

const PRESENTATION_SUFFIX: &str = ".lightning.force.com";
const API_SUFFIX: &str = ".my.salesforce.com";

/// Session token exchanged for one org domain.
///
/// The token value never appears in `Debug` output so it cannot leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Creates a session token, rejecting blank values.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Unauthorized(
                "session token must not be empty".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the raw token for building authorization headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for SessionToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SessionToken(<redacted>)")
    }
}

/// Canonical API host of an org, as addressed by token exchange and REST calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgDomain(String);

impl OrgDomain {
    /// Derives the API host from the host observed in the browser.
    ///
    /// Presentation hosts (`*.lightning.force.com`) are rewritten to the
    /// `*.my.salesforce.com` API host; any other host is kept as-is.
    pub fn from_presentation_host(host: &str) -> AppResult<Self> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty()
            || host
                .chars()
                .any(|character| !(character.is_ascii_alphanumeric() || matches!(character, '.' | '-')))
        {
            return Err(AppError::Validation(format!(
                "'{host}' is not a bare hostname"
            )));
        }

        match host.strip_suffix(PRESENTATION_SUFFIX) {
            Some(org) if !org.is_empty() => Ok(Self(format!("{org}{API_SUFFIX}"))),
            Some(_) => Err(AppError::Validation(format!(
                "'{host}' is missing the org subdomain"
            ))),
            None => Ok(Self(host)),
        }
    }

    /// Returns the bare hostname.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for OrgDomain {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
