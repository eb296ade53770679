use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AccessFlags, PermissionGrid, PermissionKind, PermissionRow, QualifiedFieldName, RecordId};

/// Position of a rendered grid row, stable for the lifetime of one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    /// List the row belongs to.
    pub kind: PermissionKind,
    /// Index inside that list.
    pub index: usize,
}

impl RowKey {
    /// Creates a row key.
    #[must_use]
    pub fn new(kind: PermissionKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl Display for RowKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}-{}", self.kind.as_str(), self.index)
    }
}

/// Checkbox column in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessColumn {
    /// Read checkbox.
    Read,
    /// Edit checkbox.
    Edit,
}

/// Unsaved changes for one grid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    /// Record id of the row when it was first touched.
    pub record_id: Option<RecordId>,
    /// Parent id of the row when it was first touched.
    pub parent_id: Option<String>,
    /// New read value, if changed.
    pub read: Option<bool>,
    /// New edit value, if changed.
    pub edit: Option<bool>,
}

impl PendingEdit {
    fn for_row(row: Option<&PermissionRow>) -> Self {
        Self {
            record_id: row.and_then(|value| value.id().cloned()),
            parent_id: row.and_then(|value| value.parent_id().map(str::to_owned)),
            read: None,
            edit: None,
        }
    }

    /// Returns the value shown in `column`, falling back to `current`.
    #[must_use]
    pub fn displayed(&self, column: AccessColumn, current: AccessFlags) -> bool {
        match column {
            AccessColumn::Read => self.read.unwrap_or(current.read()),
            AccessColumn::Edit => self.edit.unwrap_or(current.edit()),
        }
    }

    /// Resolves the final access to persist, with `edit => read` enforced.
    #[must_use]
    pub fn resolve(&self, current: AccessFlags) -> AccessFlags {
        AccessFlags::new(
            self.displayed(AccessColumn::Read, current),
            self.displayed(AccessColumn::Edit, current),
        )
    }
}

/// Insertion-ordered set of pending edits for one open grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingEdits {
    entries: Vec<(RowKey, PendingEdit)>,
}

impl PendingEdits {
    /// Creates an empty edit set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a checkbox change for one row.
    pub fn record(&mut self, grid: &PermissionGrid, key: RowKey, column: AccessColumn, value: bool) {
        let edit = self.entry(grid, key);
        match column {
            AccessColumn::Read => edit.read = Some(value),
            AccessColumn::Edit => edit.edit = Some(value),
        }
    }

    /// Sets one column for every row of a list, touching only rows whose
    /// displayed value differs.
    pub fn set_column(
        &mut self,
        grid: &PermissionGrid,
        kind: PermissionKind,
        column: AccessColumn,
        value: bool,
    ) {
        for (index, row) in grid.rows(kind).iter().enumerate() {
            let key = RowKey::new(kind, index);
            let displayed = self
                .get(key)
                .map(|edit| edit.displayed(column, row.access()))
                .unwrap_or(match column {
                    AccessColumn::Read => row.access().read(),
                    AccessColumn::Edit => row.access().edit(),
                });

            if displayed != value {
                self.record(grid, key, column, value);
            }
        }
    }

    /// Returns the pending edit for a row.
    #[must_use]
    pub fn get(&self, key: RowKey) -> Option<&PendingEdit> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, edit)| edit)
    }

    /// Iterates over edits in the order rows were first touched.
    pub fn iter(&self) -> impl Iterator<Item = (RowKey, &PendingEdit)> + '_ {
        self.entries.iter().map(|(key, edit)| (*key, edit))
    }

    /// Returns the number of touched rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no row was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending edit.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry(&mut self, grid: &PermissionGrid, key: RowKey) -> &mut PendingEdit {
        let position = match self.entries.iter().position(|(candidate, _)| *candidate == key) {
            Some(position) => position,
            None => {
                let row = grid.row(key.kind, key.index);
                self.entries.push((key, PendingEdit::for_row(row)));
                self.entries.len().saturating_sub(1)
            }
        };

        &mut self.entries[position].1
    }
}

/// Write operation derived from one pending edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Mutation {
    /// Patch an existing field permission record.
    Update {
        /// Target record id.
        record_id: RecordId,
        /// Final access.
        access: AccessFlags,
    },
    /// Create a field permission record for a parent that has none.
    Create {
        /// Owning profile or permission set id.
        parent_id: String,
        /// Field the grant applies to.
        field: QualifiedFieldName,
        /// Final access.
        access: AccessFlags,
    },
}

impl Mutation {
    /// Returns the access written by this mutation.
    #[must_use]
    pub fn access(&self) -> AccessFlags {
        match self {
            Self::Update { access, .. } | Self::Create { access, .. } => *access,
        }
    }

    /// Returns the object type a create targets.
    #[must_use]
    pub fn sobject_type(&self) -> Option<&str> {
        match self {
            Self::Update { .. } => None,
            Self::Create { field, .. } => Some(field.object_type()),
        }
    }
}
