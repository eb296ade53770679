use async_trait::async_trait;
use fieldlens_core::{AppResult, OrgDomain, SessionToken};
use serde_json::Value;

/// Port for exchanging an org domain for a session token.
#[async_trait]
pub trait SessionTokenProvider: Send + Sync {
    /// Returns a session token for the org API domain.
    ///
    /// Implementations return [`fieldlens_core::AppError::Unauthorized`] when
    /// no token is available.
    async fn session_token(&self, domain: &OrgDomain) -> AppResult<SessionToken>;
}

/// Port for the org REST API.
///
/// Every call is authenticated with the provided token. Non-success statuses
/// surface as [`fieldlens_core::AppError::Network`] carrying the status code.
#[async_trait]
pub trait OrgRestTransport: Send + Sync {
    /// Runs a read-only query and returns the parsed response body.
    async fn query(&self, domain: &OrgDomain, token: &SessionToken, soql: &str)
    -> AppResult<Value>;

    /// Patches fields of an existing record.
    async fn update_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        record_id: &str,
        body: Value,
    ) -> AppResult<()>;

    /// Creates a record and returns the parsed response body.
    async fn create_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        body: Value,
    ) -> AppResult<Value>;
}
