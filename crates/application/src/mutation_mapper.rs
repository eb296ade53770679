use std::fmt::{Display, Formatter};

use fieldlens_domain::{
    AccessFlags, Mutation, PendingEdit, PendingEdits, PermissionGrid, PermissionRow,
    QualifiedFieldName, RecordId, RecordIdShape, RowKey,
};
use serde::Serialize;
use tracing::warn;

use crate::FieldPermissionRecord;

/// Mutation planned for one edited row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMutation {
    /// Row the mutation came from.
    pub row_key: RowKey,
    /// Write to perform.
    pub mutation: Mutation,
}

/// Why an edit produced no mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The row had no record id when it was edited.
    MissingRecordId,
    /// The record id matches neither the real nor the virtual shape.
    UnrecognizedRecordId(String),
    /// No fetched row carries the virtual id.
    OriginalRecordNotFound(String),
    /// The fetched row lacks a parent id or a usable field name.
    MissingParentOrField(String),
}

impl Display for SkipReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRecordId => formatter.write_str("row has no record id"),
            Self::UnrecognizedRecordId(id) => write!(formatter, "record id '{id}' has an unknown shape"),
            Self::OriginalRecordNotFound(id) => {
                write!(formatter, "no fetched row matches virtual id '{id}'")
            }
            Self::MissingParentOrField(id) => {
                write!(formatter, "fetched row '{id}' lacks a parent id or field name")
            }
        }
    }
}

/// Edit dropped during mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEdit {
    /// Row the edit belonged to.
    pub row_key: RowKey,
    /// Why it was dropped.
    pub reason: SkipReason,
}

/// Ordered result of mapping a set of pending edits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MutationPlan {
    /// Mutations in edit insertion order.
    pub mutations: Vec<PlannedMutation>,
    /// Edits that produced no mutation.
    pub skipped: Vec<SkippedEdit>,
}

impl MutationPlan {
    /// Returns whether nothing is to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Translates pending edits into update or create mutations.
///
/// Each edit's record id decides the route: real ids become updates, virtual
/// ids become creates for the parent and field of the fetched row carrying
/// that id. Anything else is skipped with a warning.
#[must_use]
pub fn map_edits(
    edits: &PendingEdits,
    grid: &PermissionGrid,
    records: &[FieldPermissionRecord],
) -> MutationPlan {
    let mut plan = MutationPlan::default();

    for (row_key, edit) in edits.iter() {
        let current = grid
            .row(row_key.kind, row_key.index)
            .map_or(AccessFlags::NONE, PermissionRow::access);

        match map_edit(edit, edit.resolve(current), records) {
            Ok(mutation) => plan.mutations.push(PlannedMutation { row_key, mutation }),
            Err(reason) => {
                warn!(row = %row_key, reason = %reason, "skipping pending edit");
                plan.skipped.push(SkippedEdit { row_key, reason });
            }
        }
    }

    plan
}

fn map_edit(
    edit: &PendingEdit,
    access: AccessFlags,
    records: &[FieldPermissionRecord],
) -> Result<Mutation, SkipReason> {
    let Some(record_id) = edit.record_id.as_ref() else {
        return Err(SkipReason::MissingRecordId);
    };

    match record_id.shape() {
        RecordIdShape::Real => Ok(Mutation::Update {
            record_id: record_id.clone(),
            access,
        }),
        RecordIdShape::Virtual => {
            let record = find_original(records, record_id, edit.parent_id.as_deref())
                .ok_or_else(|| SkipReason::OriginalRecordNotFound(record_id.to_string()))?;
            let parent_id = record.resolved_parent_id();
            let field = record
                .field
                .as_deref()
                .and_then(|value| QualifiedFieldName::parse(value).ok());

            match (parent_id, field) {
                (Some(parent_id), Some(field)) => Ok(Mutation::Create {
                    parent_id: parent_id.to_owned(),
                    field,
                    access,
                }),
                _ => Err(SkipReason::MissingParentOrField(record_id.to_string())),
            }
        }
        RecordIdShape::Unrecognized => Err(SkipReason::UnrecognizedRecordId(record_id.to_string())),
    }
}

// Placeholder ids are not unique, so a row owned by the edited parent wins.
fn find_original<'a>(
    records: &'a [FieldPermissionRecord],
    record_id: &RecordId,
    parent_id: Option<&str>,
) -> Option<&'a FieldPermissionRecord> {
    let mut candidates = records
        .iter()
        .filter(|record| record.id.as_deref() == Some(record_id.as_str()));

    let first = candidates.clone().next();
    parent_id
        .and_then(|parent_id| candidates.find(|record| record.resolved_parent_id() == Some(parent_id)))
        .or(first)
}
