use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static REAL_RECORD_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^01k.{15,17}$").ok());
static VIRTUAL_RECORD_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^000.{15,17}$").ok());

/// Read/edit access pair with `edit => read` enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawAccessFlags")]
pub struct AccessFlags {
    read: bool,
    edit: bool,
}

#[derive(Deserialize)]
struct RawAccessFlags {
    read: bool,
    edit: bool,
}

impl From<RawAccessFlags> for AccessFlags {
    fn from(value: RawAccessFlags) -> Self {
        Self::new(value.read, value.edit)
    }
}

impl AccessFlags {
    /// No access at all.
    pub const NONE: Self = Self {
        read: false,
        edit: false,
    };

    /// Normalizes a raw pair: edit implies read, and no read implies no edit.
    #[must_use]
    pub fn new(read: bool, edit: bool) -> Self {
        let read = read || edit;
        let edit = edit && read;
        Self { read, edit }
    }

    /// Returns read access.
    #[must_use]
    pub fn read(self) -> bool {
        self.read
    }

    /// Returns edit access.
    #[must_use]
    pub fn edit(self) -> bool {
        self.edit
    }

    /// Returns whether any access is granted.
    #[must_use]
    pub fn any(self) -> bool {
        self.read || self.edit
    }
}

/// Whether a row belongs to a profile or to a standalone permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// Profile-owned permission set.
    Profile,
    /// Standalone permission set.
    PermissionSet,
}

impl PermissionKind {
    /// Returns a stable key used in rendered row identifiers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profiles",
            Self::PermissionSet => "permissionSets",
        }
    }

    /// Classifies the parent's `Type` value.
    #[must_use]
    pub fn from_parent_type(value: &str) -> Self {
        if value == "Profile" {
            Self::Profile
        } else {
            Self::PermissionSet
        }
    }
}

/// Opaque identifier of a field permission record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

/// Shape class of a [`RecordId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIdShape {
    /// An existing record that can be updated in place.
    Real,
    /// A placeholder for a grant that has no record yet.
    Virtual,
    /// Anything else; never turned into a mutation.
    Unrecognized,
}

impl RecordId {
    /// Wraps a raw identifier, rejecting blank values.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// Classifies the identifier without interpreting its contents.
    #[must_use]
    pub fn shape(&self) -> RecordIdShape {
        let matches = |pattern: &LazyLock<Option<Regex>>| {
            pattern
                .as_ref()
                .is_some_and(|regex| regex.is_match(self.0.as_str()))
        };

        if matches(&REAL_RECORD_ID) {
            RecordIdShape::Real
        } else if matches(&VIRTUAL_RECORD_ID) {
            RecordIdShape::Virtual
        } else {
            RecordIdShape::Unrecognized
        }
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RecordId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// One profile's or permission set's access to the inspected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRow {
    id: Option<RecordId>,
    parent_id: Option<String>,
    name: String,
    access: AccessFlags,
    kind: PermissionKind,
}

impl PermissionRow {
    /// Creates a row backed by a fetched record.
    #[must_use]
    pub fn new(
        kind: PermissionKind,
        id: Option<RecordId>,
        parent_id: Option<String>,
        name: impl Into<String>,
        access: AccessFlags,
    ) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            access,
            kind,
        }
    }

    /// Creates a zero-access placeholder for a parent with no grant record.
    #[must_use]
    pub fn virtual_row(
        kind: PermissionKind,
        parent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            parent_id: Some(parent_id.into()),
            name: name.into(),
            access: AccessFlags::NONE,
            kind,
        }
    }

    /// Returns the field permission record id, if one exists.
    #[must_use]
    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    /// Returns the owning profile or permission set id.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the granted access.
    #[must_use]
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// Returns the row kind.
    #[must_use]
    pub fn kind(&self) -> PermissionKind {
        self.kind
    }

    /// Returns whether the row has no concrete record behind it.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.id
            .as_ref()
            .is_none_or(|id| id.shape() == RecordIdShape::Virtual)
    }
}

/// Complete, sorted access grid for one field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionGrid {
    profiles: Vec<PermissionRow>,
    permission_sets: Vec<PermissionRow>,
}

impl PermissionGrid {
    /// Builds a grid, sorting each list by display name.
    #[must_use]
    pub fn from_rows(
        mut profiles: Vec<PermissionRow>,
        mut permission_sets: Vec<PermissionRow>,
    ) -> Self {
        profiles.sort_by(|left, right| compare_display_names(left.name(), right.name()));
        permission_sets.sort_by(|left, right| compare_display_names(left.name(), right.name()));

        Self {
            profiles,
            permission_sets,
        }
    }

    /// Returns profile rows.
    #[must_use]
    pub fn profiles(&self) -> &[PermissionRow] {
        self.profiles.as_slice()
    }

    /// Returns permission set rows.
    #[must_use]
    pub fn permission_sets(&self) -> &[PermissionRow] {
        self.permission_sets.as_slice()
    }

    /// Returns the rows of one kind.
    #[must_use]
    pub fn rows(&self, kind: PermissionKind) -> &[PermissionRow] {
        match kind {
            PermissionKind::Profile => self.profiles(),
            PermissionKind::PermissionSet => self.permission_sets(),
        }
    }

    /// Returns one rendered row.
    #[must_use]
    pub fn row(&self, kind: PermissionKind, index: usize) -> Option<&PermissionRow> {
        self.rows(kind).get(index)
    }

    /// Returns whether a row for `parent_id` exists in the given list.
    #[must_use]
    pub fn contains_parent(&self, kind: PermissionKind, parent_id: &str) -> bool {
        self.rows(kind)
            .iter()
            .any(|row| row.parent_id() == Some(parent_id))
    }

    /// Splits the grid into its profile and permission set lists.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PermissionRow>, Vec<PermissionRow>) {
        (self.profiles, self.permission_sets)
    }
}

/// Orders display names the way a user-facing list expects.
///
/// Names compare case-insensitively first; on a tie lower case sorts before
/// upper case, then raw code points decide.
#[must_use]
pub fn compare_display_names(left: &str, right: &str) -> Ordering {
    let folded = left
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase));

    folded.then_with(|| {
        left.chars()
            .map(char::is_uppercase)
            .cmp(right.chars().map(char::is_uppercase))
            .then_with(|| left.cmp(right))
    })
}
