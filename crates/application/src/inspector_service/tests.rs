use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use fieldlens_domain::{
    AccessColumn, FieldIdentity, Mutation, PendingEdits, PermissionKind,
    PermissionRow, RowKey,
};

use crate::{OrgRestTransport, SessionTokenProvider};

use super::{BatchOutcome, BusyGuard, InspectorService};

const PAGE_HOST: &str = "acme.lightning.force.com";

struct FakeTokens;

#[async_trait]
impl SessionTokenProvider for FakeTokens {
    async fn session_token(&self, domain: &OrgDomain) -> AppResult<SessionToken> {
        if domain.as_str() == "acme.my.salesforce.com" {
            SessionToken::new("00Dxx!session")
        } else {
            Err(AppError::Unauthorized(format!("no session for '{domain}'")))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RecordedWrite {
    Update { record_id: String, body: Value },
    Create { body: Value },
}

#[derive(Default)]
struct FakeTransport {
    field_permissions: Value,
    catalog: Value,
    users: Value,
    rejected_records: HashSet<String>,
    queries: Mutex<Vec<String>>,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl FakeTransport {
    fn seeded() -> Self {
        Self {
            field_permissions: json!({
                "records": [
                    {
                        "Id": "01k5g00000PrOfIlEA",
                        "Field": "WorkOrder.Status",
                        "PermissionsRead": true,
                        "PermissionsEdit": false,
                        "Parent": {
                            "Id": "0PS5g0000000PRFAAA",
                            "Name": "X00e5g000000abc",
                            "Type": "Profile",
                            "Profile": { "Name": "Standard User" }
                        }
                    },
                    {
                        "Id": "01k5g00000SuPpOrTA",
                        "Field": "WorkOrder.Status",
                        "PermissionsRead": true,
                        "PermissionsEdit": true,
                        "Parent": { "Id": "0PS5g0000000SUPAAA", "Name": "Support PS", "Type": "Regular" }
                    },
                    {
                        "Id": "000000000000000000",
                        "Field": "WorkOrder.Status",
                        "PermissionsRead": false,
                        "PermissionsEdit": false,
                        "Parent": { "Id": "0PS5g0000000DSPAAA", "Name": "Dispatch PS", "Type": "Regular" }
                    }
                ]
            }),
            catalog: json!({
                "records": [
                    { "Id": "0PS5g0000000SUPAAA", "Name": "Support PS" },
                    { "Id": "0PS5g0000000DSPAAA", "Name": "Dispatch PS" },
                    { "Id": "0PS5g0000000SLSAAA", "Name": "Sales PS" }
                ]
            }),
            users: json!({
                "records": [{
                    "Id": "0055g00000AbCdEAAZ",
                    "Name": "Dana Field",
                    "Username": "dana@acme.example",
                    "Profile": { "Name": "Standard User" },
                    "PermissionSetAssignments": {
                        "records": [{ "PermissionSetId": "0PS5g0000000SUPAAA" }]
                    }
                }]
            }),
            ..Self::default()
        }
    }

    fn rejecting(mut self, record_id: &str) -> Self {
        self.rejected_records.insert(record_id.to_owned());
        self
    }
}

#[async_trait]
impl OrgRestTransport for FakeTransport {
    async fn query(&self, _domain: &OrgDomain, _token: &SessionToken, soql: &str) -> AppResult<Value> {
        self.queries.lock().await.push(soql.to_owned());

        if soql.contains("FROM FieldPermissions") {
            Ok(self.field_permissions.clone())
        } else if soql.contains("FROM PermissionSet WHERE") {
            Ok(self.catalog.clone())
        } else if soql.contains("FROM User") {
            Ok(self.users.clone())
        } else {
            Err(AppError::status(400, "MALFORMED_QUERY"))
        }
    }

    async fn update_record(
        &self,
        _domain: &OrgDomain,
        _token: &SessionToken,
        _sobject: &str,
        record_id: &str,
        body: Value,
    ) -> AppResult<()> {
        if self.rejected_records.contains(record_id) {
            return Err(AppError::status(400, "FIELD_INTEGRITY_EXCEPTION"));
        }

        self.writes.lock().await.push(RecordedWrite::Update {
            record_id: record_id.to_owned(),
            body,
        });
        Ok(())
    }

    async fn create_record(
        &self,
        _domain: &OrgDomain,
        _token: &SessionToken,
        _sobject: &str,
        body: Value,
    ) -> AppResult<Value> {
        self.writes.lock().await.push(RecordedWrite::Create { body });
        Ok(json!({ "id": "01k5g00000NeWrOwAA", "success": true }))
    }
}

fn service(transport: Arc<FakeTransport>) -> InspectorService {
    InspectorService::new(Arc::new(FakeTokens), transport)
}

fn work_order_status() -> FieldIdentity {
    FieldIdentity::new("WorkOrder", "Status")
}

fn row_index(rows: &[PermissionRow], name: &str) -> usize {
    rows.iter()
        .position(|row| row.name() == name)
        .unwrap_or_else(|| panic!("row '{name}' should exist"))
}

#[tokio::test]
async fn load_merges_catalog_into_fetched_rows() {
    let transport = Arc::new(FakeTransport::seeded());
    let view = service(transport.clone())
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await;

    assert!(view.is_ok());
    let view = view.unwrap_or_else(|_| unreachable!());
    let names: Vec<&str> = view.grid.permission_sets().iter().map(PermissionRow::name).collect();
    assert_eq!(names, vec!["Dispatch PS", "Sales PS", "Support PS"]);
    assert_eq!(view.grid.profiles().len(), 1);
    assert_eq!(view.records.len(), 3);
    assert_eq!(transport.queries.lock().await.len(), 2);
}

#[tokio::test]
async fn load_rejects_incomplete_identity_before_any_request() {
    let transport = Arc::new(FakeTransport::seeded());
    let result = service(transport.clone())
        .load_field_permissions(PAGE_HOST, &FieldIdentity::new("", "Status"))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(transport.queries.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_host_is_an_auth_failure() {
    let result = service(Arc::new(FakeTransport::seeded()))
        .load_field_permissions("other.lightning.force.com", &work_order_status())
        .await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn save_routes_updates_and_creates_in_edit_order() {
    let transport = Arc::new(FakeTransport::seeded());
    let service = service(transport.clone());
    let view = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await
        .unwrap_or_else(|error| panic!("load should succeed: {error}"));

    let sets = view.grid.permission_sets();
    let mut edits = PendingEdits::new();
    edits.record(
        &view.grid,
        RowKey::new(PermissionKind::PermissionSet, row_index(sets, "Dispatch PS")),
        AccessColumn::Edit,
        true,
    );
    edits.record(
        &view.grid,
        RowKey::new(PermissionKind::Profile, 0),
        AccessColumn::Read,
        false,
    );

    let report = service.save_edits(PAGE_HOST, &view, &mut edits).await;

    assert!(report.is_ok());
    let report = report.unwrap_or_else(|_| unreachable!());
    assert_eq!(report.outcome, BatchOutcome::AllSucceeded);
    assert_eq!(report.succeeded_count(), 2);
    assert!(edits.is_empty());

    let writes = transport.writes.lock().await;
    assert_eq!(
        *writes,
        vec![
            RecordedWrite::Create {
                body: json!({
                    "ParentId": "0PS5g0000000DSPAAA",
                    "Field": "WorkOrder.Status",
                    "SObjectType": "WorkOrder",
                    "PermissionsRead": true,
                    "PermissionsEdit": true,
                }),
            },
            RecordedWrite::Update {
                record_id: "01k5g00000PrOfIlEA".to_owned(),
                body: json!({ "PermissionsRead": false, "PermissionsEdit": false }),
            },
        ]
    );
}

#[tokio::test]
async fn failed_write_does_not_stop_the_batch() {
    let transport = Arc::new(FakeTransport::seeded().rejecting("01k5g00000SuPpOrTA"));
    let service = service(transport.clone());
    let view = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await
        .unwrap_or_else(|error| panic!("load should succeed: {error}"));

    let mut edits = PendingEdits::new();
    edits.record(
        &view.grid,
        RowKey::new(
            PermissionKind::PermissionSet,
            row_index(view.grid.permission_sets(), "Support PS"),
        ),
        AccessColumn::Edit,
        false,
    );
    edits.record(
        &view.grid,
        RowKey::new(PermissionKind::Profile, 0),
        AccessColumn::Edit,
        true,
    );

    let report = service
        .save_edits(PAGE_HOST, &view, &mut edits)
        .await
        .unwrap_or_else(|error| panic!("save should report per row: {error}"));

    assert_eq!(report.outcome, BatchOutcome::Partial);
    assert_eq!(report.failed().count(), 1);
    assert!(report
        .failed()
        .all(|outcome| matches!(&outcome.mutation, Mutation::Update { record_id, .. } if record_id.as_str() == "01k5g00000SuPpOrTA")));
    assert_eq!(edits.len(), 2);
    assert_eq!(transport.writes.lock().await.len(), 1);
}

#[tokio::test]
async fn catalog_only_rows_are_skipped_and_edits_kept() {
    let transport = Arc::new(FakeTransport::seeded());
    let service = service(transport.clone());
    let view = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await
        .unwrap_or_else(|error| panic!("load should succeed: {error}"));

    let mut edits = PendingEdits::new();
    edits.record(
        &view.grid,
        RowKey::new(
            PermissionKind::PermissionSet,
            row_index(view.grid.permission_sets(), "Sales PS"),
        ),
        AccessColumn::Read,
        true,
    );

    let report = service
        .save_edits(PAGE_HOST, &view, &mut edits)
        .await
        .unwrap_or_else(|error| panic!("save should report skips: {error}"));

    assert_eq!(report.outcome, BatchOutcome::NothingToSave);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(edits.len(), 1);
    assert!(transport.writes.lock().await.is_empty());
}

#[tokio::test]
async fn empty_edit_set_is_nothing_to_save() {
    let service = service(Arc::new(FakeTransport::seeded()));
    let view = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await
        .unwrap_or_else(|error| panic!("load should succeed: {error}"));

    let report = service
        .save_edits(PAGE_HOST, &view, &mut PendingEdits::new())
        .await;

    assert!(report.is_ok_and(|report| report.outcome == BatchOutcome::NothingToSave));
}

#[tokio::test]
async fn check_user_reports_profile_and_permission_set_grants() {
    let service = service(Arc::new(FakeTransport::seeded()));
    let view = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await
        .unwrap_or_else(|error| panic!("load should succeed: {error}"));

    let verdict = service
        .check_user_access(PAGE_HOST, "0055g00000AbCdEAAZ", &view.grid)
        .await
        .unwrap_or_else(|error| panic!("check should succeed: {error}"));

    assert!(verdict.has_access);
    assert!(verdict.via_profile);
    assert_eq!(verdict.via_permission_sets, vec!["Support PS".to_owned()]);
}

#[tokio::test]
async fn check_user_without_match_is_not_found() {
    let transport = Arc::new(FakeTransport {
        users: json!({ "records": [] }),
        ..FakeTransport::seeded()
    });

    let result = service(transport)
        .check_user_access(PAGE_HOST, "0055g00000AbCdEAAZ", &Default::default())
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn list_active_users_uses_configured_limit() {
    let transport = Arc::new(FakeTransport::seeded());
    let users = service(transport.clone())
        .with_user_lookup_limit(5)
        .list_active_users(PAGE_HOST)
        .await
        .unwrap_or_else(|error| panic!("lookup should succeed: {error}"));

    assert_eq!(users.len(), 1);
    assert_eq!(users.first().map(|user| user.username.as_str()), Some("dana@acme.example"));
    assert!(transport
        .queries
        .lock()
        .await
        .iter()
        .any(|query| query.ends_with("LIMIT 5")));
}

#[tokio::test]
async fn concurrent_operation_is_rejected_until_the_first_finishes() {
    let service = service(Arc::new(FakeTransport::seeded()));

    let guard = BusyGuard::acquire(&service.busy);
    assert!(guard.is_ok());

    let blocked = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    drop(guard);
    let released = service
        .load_field_permissions(PAGE_HOST, &work_order_status())
        .await;
    assert!(released.is_ok());
}

#[tokio::test]
async fn busy_flag_is_released_after_a_failure() {
    let service = service(Arc::new(FakeTransport::seeded()));

    let failed = service
        .load_field_permissions("other.lightning.force.com", &work_order_status())
        .await;
    assert!(failed.is_err());

    let users = service.list_active_users(PAGE_HOST).await;
    assert!(users.is_ok());
}
