use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use fieldlens_application::{OrgRestTransport, SessionTokenProvider};
use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use fieldlens_domain::{AccessFlags, OrgUser, compare_display_names};
use regex::Regex;
use serde_json::{Value, json};
use tokio::sync::RwLock;

static FIELD_FILTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"WHERE Field = '([^']+)'").ok());
static USER_ID_FILTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"FROM User WHERE Id = '([^']+)'").ok());
static LIMIT_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"LIMIT (\d+)").ok());

const CREATED_ID_PREFIX: &str = "01k";
const CREATED_ID_LENGTH: usize = 18;
const PLACEHOLDER_ID_PREFIX: &str = "000";

#[derive(Debug, Clone)]
enum ParentKind {
    Profile { profile_name: String },
    PermissionSet,
}

#[derive(Debug, Clone)]
struct StoredParent {
    name: String,
    kind: ParentKind,
}

#[derive(Debug, Clone)]
struct StoredFieldPermission {
    id: String,
    parent_id: String,
    field: String,
    read: bool,
    edit: bool,
}

impl StoredFieldPermission {
    fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_ID_PREFIX)
    }
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: OrgUser,
    active: bool,
    profile_name: Option<String>,
    permission_set_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct OrgState {
    parents: BTreeMap<String, StoredParent>,
    field_permissions: Vec<StoredFieldPermission>,
    users: Vec<StoredUser>,
    created: usize,
}

/// Stateful single-org stand-in answering the queries and writes the
/// inspector issues.
///
/// Tokens other than the configured one are rejected with a 401, and grants
/// with edit but no read are rejected with a 400. Rows seeded with a `000`
/// id stand for implicit grants and are replaced when a real one is created.
#[derive(Debug)]
pub struct InMemoryOrg {
    domain: OrgDomain,
    token: SessionToken,
    state: RwLock<OrgState>,
}

impl InMemoryOrg {
    /// Creates an empty org reachable at `domain` with `token`.
    #[must_use]
    pub fn new(domain: OrgDomain, token: SessionToken) -> Self {
        Self {
            domain,
            token,
            state: RwLock::new(OrgState::default()),
        }
    }

    /// Adds a profile; `permission_set_id` is its profile-owned permission set.
    #[must_use]
    pub fn with_profile(
        mut self,
        permission_set_id: &str,
        permission_set_name: &str,
        profile_name: &str,
    ) -> Self {
        self.state.get_mut().parents.insert(
            permission_set_id.to_owned(),
            StoredParent {
                name: permission_set_name.to_owned(),
                kind: ParentKind::Profile {
                    profile_name: profile_name.to_owned(),
                },
            },
        );
        self
    }

    /// Adds a standalone permission set.
    #[must_use]
    pub fn with_permission_set(mut self, id: &str, name: &str) -> Self {
        self.state.get_mut().parents.insert(
            id.to_owned(),
            StoredParent {
                name: name.to_owned(),
                kind: ParentKind::PermissionSet,
            },
        );
        self
    }

    /// Adds a field permission record.
    #[must_use]
    pub fn with_field_permission(
        mut self,
        record_id: &str,
        parent_id: &str,
        field: &str,
        access: AccessFlags,
    ) -> Self {
        self.state.get_mut().field_permissions.push(StoredFieldPermission {
            id: record_id.to_owned(),
            parent_id: parent_id.to_owned(),
            field: field.to_owned(),
            read: access.read(),
            edit: access.edit(),
        });
        self
    }

    /// Adds a user with a profile and permission set assignments.
    #[must_use]
    pub fn with_user(
        mut self,
        user: OrgUser,
        active: bool,
        profile_name: Option<&str>,
        permission_set_ids: &[&str],
    ) -> Self {
        self.state.get_mut().users.push(StoredUser {
            user,
            active,
            profile_name: profile_name.map(str::to_owned),
            permission_set_ids: permission_set_ids.iter().map(|id| (*id).to_owned()).collect(),
        });
        self
    }

    /// Returns the stored access of one parent to one field.
    pub async fn field_access(&self, parent_id: &str, field: &str) -> Option<AccessFlags> {
        self.state
            .read()
            .await
            .field_permissions
            .iter()
            .find(|stored| stored.parent_id == parent_id && stored.field == field)
            .map(|stored| AccessFlags::new(stored.read, stored.edit))
    }

    fn authorize(&self, domain: &OrgDomain, token: &SessionToken) -> AppResult<()> {
        if domain != &self.domain {
            return Err(AppError::transport(format!("unknown host '{domain}'")));
        }
        if token != &self.token {
            return Err(AppError::status(401, "INVALID_SESSION_ID"));
        }

        Ok(())
    }
}

fn capture(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    pattern
        .as_ref()
        .and_then(|regex| regex.captures(text))
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_owned())
}

fn flag(body: &Value, key: &str) -> AppResult<bool> {
    body.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| AppError::status(400, format!("JSON_PARSER_ERROR: '{key}' must be a boolean")))
}

fn checked_access(body: &Value) -> AppResult<(bool, bool)> {
    let read = flag(body, "PermissionsRead")?;
    let edit = flag(body, "PermissionsEdit")?;
    if edit && !read {
        return Err(AppError::status(
            400,
            "FIELD_INTEGRITY_EXCEPTION: Edit requires Read",
        ));
    }

    Ok((read, edit))
}

impl OrgState {
    fn field_permission_rows(&self, field: &str) -> Value {
        let mut rows: Vec<(&StoredFieldPermission, &StoredParent)> = self
            .field_permissions
            .iter()
            .filter(|stored| stored.field == field)
            .filter_map(|stored| self.parents.get(&stored.parent_id).map(|parent| (stored, parent)))
            .collect();
        rows.sort_by(|(_, left), (_, right)| {
            parent_type(left)
                .cmp(parent_type(right))
                .then_with(|| left.name.cmp(&right.name))
        });

        let records: Vec<Value> = rows
            .into_iter()
            .map(|(stored, parent)| {
                let profile = match &parent.kind {
                    ParentKind::Profile { profile_name } => json!({ "Name": profile_name }),
                    ParentKind::PermissionSet => Value::Null,
                };
                json!({
                    "attributes": { "type": "FieldPermissions" },
                    "Id": stored.id,
                    "Field": stored.field,
                    "PermissionsRead": stored.read,
                    "PermissionsEdit": stored.edit,
                    "Parent": {
                        "Id": stored.parent_id,
                        "Name": parent.name,
                        "Type": parent_type(parent),
                        "Profile": profile,
                    },
                })
            })
            .collect();

        query_result(records)
    }

    fn permission_set_catalog(&self) -> Value {
        query_result(
            self.parents
                .iter()
                .filter(|(_, parent)| matches!(parent.kind, ParentKind::PermissionSet))
                .map(|(id, parent)| json!({ "Id": id, "Name": parent.name }))
                .collect(),
        )
    }

    fn active_users(&self, limit: usize) -> Value {
        let mut users: Vec<&StoredUser> = self.users.iter().filter(|stored| stored.active).collect();
        users.sort_by(|left, right| compare_display_names(&left.user.name, &right.user.name));

        query_result(
            users
                .into_iter()
                .take(limit)
                .map(|stored| {
                    json!({
                        "Id": stored.user.id,
                        "Name": stored.user.name,
                        "Username": stored.user.username,
                    })
                })
                .collect(),
        )
    }

    fn user_assignments(&self, user_id: &str) -> Value {
        query_result(
            self.users
                .iter()
                .filter(|stored| stored.user.id == user_id)
                .map(|stored| {
                    let assignments: Vec<Value> = stored
                        .permission_set_ids
                        .iter()
                        .map(|id| {
                            json!({
                                "PermissionSetId": id,
                                "PermissionSet": {
                                    "Name": self.parents.get(id).map(|parent| parent.name.as_str()),
                                },
                            })
                        })
                        .collect();
                    json!({
                        "Id": stored.user.id,
                        "Name": stored.user.name,
                        "Profile": stored.profile_name.as_ref().map(|name| json!({ "Name": name })),
                        "PermissionSetAssignments": query_result(assignments),
                    })
                })
                .collect(),
        )
    }
}

fn parent_type(parent: &StoredParent) -> &'static str {
    match parent.kind {
        ParentKind::Profile { .. } => "Profile",
        ParentKind::PermissionSet => "Regular",
    }
}

fn query_result(records: Vec<Value>) -> Value {
    json!({
        "totalSize": records.len(),
        "done": true,
        "records": records,
    })
}

#[async_trait]
impl SessionTokenProvider for InMemoryOrg {
    async fn session_token(&self, domain: &OrgDomain) -> AppResult<SessionToken> {
        if domain == &self.domain {
            Ok(self.token.clone())
        } else {
            Err(AppError::Unauthorized(format!("no session for '{domain}'")))
        }
    }
}

#[async_trait]
impl OrgRestTransport for InMemoryOrg {
    async fn query(&self, domain: &OrgDomain, token: &SessionToken, soql: &str) -> AppResult<Value> {
        self.authorize(domain, token)?;
        let state = self.state.read().await;

        if soql.contains("FROM FieldPermissions") {
            let field = capture(&FIELD_FILTER, soql)
                .ok_or_else(|| AppError::status(400, "MALFORMED_QUERY: missing Field filter"))?;
            return Ok(state.field_permission_rows(field.as_str()));
        }
        if soql.contains("FROM PermissionSet WHERE IsOwnedByProfile = false") {
            return Ok(state.permission_set_catalog());
        }
        if let Some(user_id) = capture(&USER_ID_FILTER, soql) {
            return Ok(state.user_assignments(user_id.as_str()));
        }
        if soql.contains("FROM User WHERE IsActive = true") {
            let limit = capture(&LIMIT_CLAUSE, soql)
                .and_then(|value| value.parse().ok())
                .unwrap_or(usize::MAX);
            return Ok(state.active_users(limit));
        }

        Err(AppError::status(400, format!("MALFORMED_QUERY: unsupported query '{soql}'")))
    }

    async fn update_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        record_id: &str,
        body: Value,
    ) -> AppResult<()> {
        self.authorize(domain, token)?;
        if sobject != "FieldPermissions" {
            return Err(AppError::status(404, format!("NOT_FOUND: sobject '{sobject}'")));
        }
        let (read, edit) = checked_access(&body)?;

        let mut state = self.state.write().await;
        let stored = state
            .field_permissions
            .iter_mut()
            .find(|stored| stored.id == record_id)
            .ok_or_else(|| AppError::status(404, format!("NOT_FOUND: '{record_id}'")))?;
        stored.read = read;
        stored.edit = edit;

        Ok(())
    }

    async fn create_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        body: Value,
    ) -> AppResult<Value> {
        self.authorize(domain, token)?;
        if sobject != "FieldPermissions" {
            return Err(AppError::status(404, format!("NOT_FOUND: sobject '{sobject}'")));
        }
        let (read, edit) = checked_access(&body)?;
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| AppError::status(400, format!("REQUIRED_FIELD_MISSING: {key}")))
        };
        let parent_id = text("ParentId")?;
        let field = text("Field")?;
        let sobject_type = text("SObjectType")?;

        if field.split_once('.').map(|(object, _)| object) != Some(sobject_type.as_str()) {
            return Err(AppError::status(
                400,
                format!("FIELD_INTEGRITY_EXCEPTION: '{field}' is not a field of '{sobject_type}'"),
            ));
        }

        let mut state = self.state.write().await;
        if !state.parents.contains_key(&parent_id) {
            return Err(AppError::status(400, format!("INVALID_CROSS_REFERENCE_KEY: '{parent_id}'")));
        }
        let same_grant =
            |stored: &StoredFieldPermission| stored.parent_id == parent_id && stored.field == field;
        if state
            .field_permissions
            .iter()
            .any(|stored| same_grant(stored) && !stored.is_placeholder())
        {
            return Err(AppError::status(400, "DUPLICATE_VALUE"));
        }
        state
            .field_permissions
            .retain(|stored| !(same_grant(stored) && stored.is_placeholder()));

        state.created = state.created.saturating_add(1);
        let suffix = state.created.to_string();
        let padding = CREATED_ID_LENGTH
            .saturating_sub(CREATED_ID_PREFIX.len())
            .saturating_sub(suffix.len());
        let id = format!("{CREATED_ID_PREFIX}{}{suffix}", "0".repeat(padding));

        state.field_permissions.push(StoredFieldPermission {
            id: id.clone(),
            parent_id,
            field,
            read,
            edit,
        });

        Ok(json!({ "id": id, "success": true, "errors": [] }))
    }
}
