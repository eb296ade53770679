use std::sync::Arc;

use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use fieldlens_domain::Mutation;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::soql::FIELD_PERMISSIONS_SOBJECT;
use crate::{OrgRestTransport, SessionTokenProvider, parse_records};

/// Authenticated access to one org's REST API through the configured ports.
///
/// A fresh token is requested for every call, so a token that expires between
/// calls is picked up without restarting the session.
#[derive(Clone)]
pub struct OrgGateway {
    tokens: Arc<dyn SessionTokenProvider>,
    transport: Arc<dyn OrgRestTransport>,
}

impl OrgGateway {
    /// Creates a gateway from port implementations.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn SessionTokenProvider>,
        transport: Arc<dyn OrgRestTransport>,
    ) -> Self {
        Self { tokens, transport }
    }

    /// Runs a query and decodes its rows.
    pub async fn query_records<T: DeserializeOwned>(
        &self,
        domain: &OrgDomain,
        soql: &str,
    ) -> AppResult<Vec<T>> {
        let token = self.token(domain).await?;
        debug!(domain = %domain, soql, "running query");
        let body = self.transport.query(domain, &token, soql).await?;

        parse_records(body)
    }

    /// Writes one field permission mutation.
    pub async fn apply_mutation(&self, domain: &OrgDomain, mutation: &Mutation) -> AppResult<()> {
        let token = self.token(domain).await?;

        match mutation {
            Mutation::Update { record_id, access } => {
                debug!(domain = %domain, record_id = %record_id, "updating field permission");
                self.transport
                    .update_record(
                        domain,
                        &token,
                        FIELD_PERMISSIONS_SOBJECT,
                        record_id.as_str(),
                        json!({
                            "PermissionsRead": access.read(),
                            "PermissionsEdit": access.edit(),
                        }),
                    )
                    .await
            }
            Mutation::Create {
                parent_id,
                field,
                access,
            } => {
                debug!(domain = %domain, parent_id, field = %field, "creating field permission");
                self.transport
                    .create_record(
                        domain,
                        &token,
                        FIELD_PERMISSIONS_SOBJECT,
                        json!({
                            "ParentId": parent_id,
                            "Field": field.as_str(),
                            "SObjectType": field.object_type(),
                            "PermissionsRead": access.read(),
                            "PermissionsEdit": access.edit(),
                        }),
                    )
                    .await
                    .map(|_| ())
            }
        }
    }

    async fn token(&self, domain: &OrgDomain) -> AppResult<SessionToken> {
        self.tokens
            .session_token(domain)
            .await
            .map_err(|error| match error {
                AppError::Unauthorized(_) => error,
                other => AppError::Unauthorized(format!(
                    "failed to obtain a session token for '{domain}': {other}"
                )),
            })
    }
}
