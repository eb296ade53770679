use fieldlens_domain::{OrgUser, PermissionGrid, UserAccessProfile, UserAccessVerdict};
use serde::{Deserialize, Serialize};

use crate::permission_records::NamedReference;

/// `User` row returned by the assignment query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserRecord {
    /// User id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Profile relationship.
    #[serde(default)]
    pub profile: Option<NamedReference>,
    /// Child assignment rows.
    #[serde(default)]
    pub permission_set_assignments: Option<AssignmentRows>,
}

/// Child relationship that arrives either as a bare array or as a nested
/// query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssignmentRows {
    /// Bare array of assignments.
    List(Vec<PermissionSetAssignment>),
    /// Nested `{ "records": [...] }` result.
    Nested {
        /// Assignment rows.
        #[serde(default)]
        records: Vec<PermissionSetAssignment>,
    },
}

/// One `PermissionSetAssignment` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetAssignment {
    /// Assigned permission set id.
    #[serde(default)]
    pub permission_set_id: Option<String>,
}

impl AssignmentRows {
    fn rows(&self) -> &[PermissionSetAssignment] {
        match self {
            Self::List(records) | Self::Nested { records } => records.as_slice(),
        }
    }
}

impl From<UserRecord> for UserAccessProfile {
    fn from(record: UserRecord) -> Self {
        let permission_set_ids = record
            .permission_set_assignments
            .as_ref()
            .map(AssignmentRows::rows)
            .unwrap_or_default()
            .iter()
            .filter_map(|assignment| assignment.permission_set_id.clone())
            .collect();

        Self {
            name: record.name.unwrap_or_default(),
            profile_name: record
                .profile
                .and_then(|profile| profile.name)
                .filter(|name| !name.is_empty()),
            permission_set_ids,
            user_id: record.id,
        }
    }
}

/// `User` row returned by the active user lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ActiveUserRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl From<ActiveUserRecord> for OrgUser {
    fn from(record: ActiveUserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            username: record.username.unwrap_or_default(),
        }
    }
}

/// Decides whether a user can see or edit the field through their profile or
/// any assigned permission set.
#[must_use]
pub fn evaluate_user_access(user: &UserAccessProfile, grid: &PermissionGrid) -> UserAccessVerdict {
    let via_profile = user.profile_name.as_deref().is_some_and(|profile_name| {
        grid.profiles()
            .iter()
            .find(|row| row.name() == profile_name)
            .is_some_and(|row| row.access().any())
    });

    let via_permission_sets: Vec<String> = grid
        .permission_sets()
        .iter()
        .filter(|row| {
            row.parent_id()
                .is_some_and(|parent_id| user.permission_set_ids.iter().any(|id| id == parent_id))
                && row.access().any()
        })
        .map(|row| row.name().to_owned())
        .collect();

    UserAccessVerdict {
        has_access: via_profile || !via_permission_sets.is_empty(),
        via_profile,
        profile_name: via_profile.then(|| user.profile_name.clone()).flatten(),
        via_permission_sets,
    }
}
