use fieldlens_core::{AppResult, OrgDomain};
use fieldlens_domain::{FieldIdentity, PermissionGrid, QualifiedFieldName};
use tracing::info;

use crate::soql::{field_permissions_query, permission_set_catalog_query};
use crate::{FieldPermissionRecord, OrgGateway, PermissionSetCatalogEntry, ingest_records};

/// Sparse permission data fetched for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPermissions {
    /// Field the rows belong to.
    pub field: QualifiedFieldName,
    /// Deduplicated grid built from the fetched rows only.
    pub grid: PermissionGrid,
    /// Rows exactly as returned, kept to route later create mutations.
    pub records: Vec<FieldPermissionRecord>,
}

/// Reads field permission rows and the permission set catalog.
#[derive(Clone)]
pub struct PermissionFetcher {
    gateway: OrgGateway,
}

impl PermissionFetcher {
    /// Creates a fetcher on top of an org gateway.
    #[must_use]
    pub fn new(gateway: OrgGateway) -> Self {
        Self { gateway }
    }

    /// Fetches and ingests the field permission rows for one field.
    ///
    /// The catalog is not merged here; see [`crate::merge_catalog`].
    pub async fn fetch(
        &self,
        identity: &FieldIdentity,
        domain: &OrgDomain,
    ) -> AppResult<FetchedPermissions> {
        let field = identity.qualified_name()?;
        let records: Vec<FieldPermissionRecord> = self
            .gateway
            .query_records(domain, field_permissions_query(&field).as_str())
            .await?;
        let grid = ingest_records(&records);

        info!(
            field = %field,
            rows = records.len(),
            profiles = grid.profiles().len(),
            permission_sets = grid.permission_sets().len(),
            "fetched field permissions"
        );

        Ok(FetchedPermissions {
            field,
            grid,
            records,
        })
    }

    /// Fetches every standalone permission set in the org.
    pub async fn fetch_catalog(&self, domain: &OrgDomain) -> AppResult<Vec<PermissionSetCatalogEntry>> {
        self.gateway
            .query_records(domain, permission_set_catalog_query())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
    use fieldlens_domain::FieldIdentity;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use crate::{OrgGateway, OrgRestTransport, SessionTokenProvider};

    use super::PermissionFetcher;

    struct FixedTokens(Option<&'static str>);

    #[async_trait]
    impl SessionTokenProvider for FixedTokens {
        async fn session_token(&self, domain: &OrgDomain) -> AppResult<SessionToken> {
            match self.0 {
                Some(token) => SessionToken::new(token),
                None => Err(AppError::Unauthorized(format!("no session for '{domain}'"))),
            }
        }
    }

    struct ScriptedTransport {
        response: AppResult<Value>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(response: AppResult<Value>) -> Self {
            Self {
                response,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OrgRestTransport for ScriptedTransport {
        async fn query(&self, _: &OrgDomain, _: &SessionToken, soql: &str) -> AppResult<Value> {
            self.queries.lock().await.push(soql.to_owned());
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(AppError::Network { status, body }) => Err(AppError::Network {
                    status: *status,
                    body: body.clone(),
                }),
                Err(other) => Err(AppError::Internal(other.to_string())),
            }
        }

        async fn update_record(
            &self,
            _: &OrgDomain,
            _: &SessionToken,
            _: &str,
            _: &str,
            _: Value,
        ) -> AppResult<()> {
            Err(AppError::Internal("unexpected update".to_owned()))
        }

        async fn create_record(
            &self,
            _: &OrgDomain,
            _: &SessionToken,
            _: &str,
            _: Value,
        ) -> AppResult<Value> {
            Err(AppError::Internal("unexpected create".to_owned()))
        }
    }

    fn domain() -> OrgDomain {
        OrgDomain::from_presentation_host("acme.lightning.force.com")
            .unwrap_or_else(|_| unreachable!("static host is valid"))
    }

    #[tokio::test]
    async fn fetch_ingests_rows_for_one_field() {
        let transport = Arc::new(ScriptedTransport::new(Ok(json!({
            "records": [{
                "Id": "01k5g00000AbCdEfGH",
                "Field": "WorkOrder.Status",
                "PermissionsRead": true,
                "PermissionsEdit": true,
                "Parent": { "Id": "0PS1", "Name": "Dispatcher", "Type": "Regular" }
            }]
        }))));
        let fetcher = PermissionFetcher::new(OrgGateway::new(
            Arc::new(FixedTokens(Some("token"))),
            transport.clone(),
        ));

        let fetched = fetcher
            .fetch(&FieldIdentity::new("WorkOrder", "Status"), &domain())
            .await;

        assert!(fetched.is_ok());
        let fetched = fetched.unwrap_or_else(|_| unreachable!());
        assert_eq!(fetched.field.as_str(), "WorkOrder.Status");
        assert_eq!(fetched.grid.permission_sets().len(), 1);
        assert_eq!(fetched.records.len(), 1);

        let queries = transport.queries.lock().await;
        assert!(queries.iter().any(|query| query.contains("'WorkOrder.Status'")));
    }

    #[tokio::test]
    async fn fetch_without_token_is_an_auth_failure() {
        let fetcher = PermissionFetcher::new(OrgGateway::new(
            Arc::new(FixedTokens(None)),
            Arc::new(ScriptedTransport::new(Ok(json!({ "records": [] })))),
        ));

        let result = fetcher
            .fetch(&FieldIdentity::new("WorkOrder", "Status"), &domain())
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_failure() {
        let fetcher = PermissionFetcher::new(OrgGateway::new(
            Arc::new(FixedTokens(Some("token"))),
            Arc::new(ScriptedTransport::new(Err(AppError::status(401, "INVALID_SESSION_ID")))),
        ));

        let result = fetcher
            .fetch(&FieldIdentity::new("WorkOrder", "Status"), &domain())
            .await;

        assert!(matches!(result, Err(AppError::Network { status: Some(401), .. })));
    }

    #[tokio::test]
    async fn unsafe_identity_never_reaches_the_transport() {
        let transport = Arc::new(ScriptedTransport::new(Ok(json!({ "records": [] }))));
        let fetcher = PermissionFetcher::new(OrgGateway::new(
            Arc::new(FixedTokens(Some("token"))),
            transport.clone(),
        ));

        let result = fetcher
            .fetch(&FieldIdentity::new("WorkOrder", "Status' OR Field != '"), &domain())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(transport.queries.lock().await.is_empty());
    }
}
