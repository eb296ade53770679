//! Application services and ports.

#![forbid(unsafe_code)]

mod field_resolver;
mod inspector_service;
mod mutation_mapper;
mod org_gateway;
mod org_ports;
mod page_scanner;
mod permission_fetcher;
mod permission_reconciler;
mod permission_records;
mod soql;
mod user_access;

pub use field_resolver::resolve_field_identity;
pub use inspector_service::{
    BatchOutcome, FieldPermissionView, InspectorService, MutationOutcome, SaveReport,
};
pub use mutation_mapper::{MutationPlan, PlannedMutation, SkipReason, SkippedEdit, map_edits};
pub use org_gateway::OrgGateway;
pub use org_ports::{OrgRestTransport, SessionTokenProvider};
pub use page_scanner::{FieldAnchor, ScanState, scan_page};
pub use permission_fetcher::{FetchedPermissions, PermissionFetcher};
pub use permission_reconciler::{ingest_records, merge_catalog};
pub use permission_records::{
    FieldPermissionRecord, NamedReference, ParentReference, PermissionSetCatalogEntry, RecordAttributes,
    parse_records,
};
pub use user_access::{AssignmentRows, PermissionSetAssignment, UserRecord, evaluate_user_access};
