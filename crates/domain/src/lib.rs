//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod edit;
mod field;
mod page;
mod permission;
mod user;

pub use edit::{AccessColumn, Mutation, PendingEdit, PendingEdits, RowKey};
pub use field::{EXCLUDED_FIELD_NAMES, FieldIdentity, QualifiedFieldName, is_identifier_safe};
pub use page::{DomElement, DomTree, NodeId, PageContext};
pub use permission::{
    AccessFlags, PermissionGrid, PermissionKind, PermissionRow, RecordId, RecordIdShape,
    compare_display_names,
};
pub use user::{OrgUser, UserAccessProfile, UserAccessVerdict};
