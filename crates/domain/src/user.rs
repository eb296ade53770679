use serde::{Deserialize, Serialize};

/// Active org user offered in the access lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUser {
    /// User record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login username.
    pub username: String,
}

/// Profile and permission set assignments of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccessProfile {
    /// User record id.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Name of the user's profile, if visible.
    pub profile_name: Option<String>,
    /// Ids of every assigned permission set.
    pub permission_set_ids: Vec<String>,
}

/// Outcome of an effective-access check for one user and one field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserAccessVerdict {
    /// Whether any grant gives the user read or edit access.
    pub has_access: bool,
    /// Whether the user's profile grants access.
    pub via_profile: bool,
    /// Profile name when it grants access.
    pub profile_name: Option<String>,
    /// Names of granting permission sets, in grid order.
    pub via_permission_sets: Vec<String>,
}
