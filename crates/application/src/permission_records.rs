use fieldlens_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record metadata block attached to every query row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordAttributes {
    /// Object type of the row.
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    /// REST path of the row; its last segment is the record id.
    #[serde(default)]
    pub url: Option<String>,
}

impl RecordAttributes {
    fn trailing_id(&self) -> Option<&str> {
        self.url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
    }
}

/// Name-only relationship, e.g. `Parent.Profile`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedReference {
    /// Display name.
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

/// Profile or permission set owning a field permission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParentReference {
    /// Record metadata.
    #[serde(rename = "attributes", default)]
    pub attributes: Option<RecordAttributes>,
    /// Explicit parent id, when selected.
    #[serde(default)]
    pub id: Option<String>,
    /// Permission set name.
    #[serde(default)]
    pub name: Option<String>,
    /// `Profile` for profile-owned permission sets.
    #[serde(rename = "Type", default)]
    pub parent_type: Option<String>,
    /// Linked profile for profile-owned permission sets.
    #[serde(default)]
    pub profile: Option<NamedReference>,
}

impl ParentReference {
    /// Returns the parent id, deriving it from the REST path when not selected.
    #[must_use]
    pub fn resolved_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|value| !value.is_empty())
            .or_else(|| self.attributes.as_ref().and_then(RecordAttributes::trailing_id))
    }

    /// Returns the linked profile name, if any.
    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.name.as_deref())
            .filter(|value| !value.is_empty())
    }
}

/// Raw `FieldPermissions` row as returned by the query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldPermissionRecord {
    /// Field permission record id.
    #[serde(default)]
    pub id: Option<String>,
    /// Qualified `Object.Field` name.
    #[serde(default)]
    pub field: Option<String>,
    /// Read flag.
    #[serde(default)]
    pub permissions_read: Option<bool>,
    /// Edit flag.
    #[serde(default)]
    pub permissions_edit: Option<bool>,
    /// Flat parent id, when selected.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Parent relationship.
    #[serde(default)]
    pub parent: Option<ParentReference>,
}

impl FieldPermissionRecord {
    /// Returns the owning parent id from any of the places it may appear.
    #[must_use]
    pub fn resolved_parent_id(&self) -> Option<&str> {
        self.parent
            .as_ref()
            .and_then(ParentReference::resolved_id)
            .or_else(|| self.parent_id.as_deref().filter(|value| !value.is_empty()))
    }
}

/// Entry of the org's permission set catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSetCatalogEntry {
    /// Permission set id.
    #[serde(rename = "Id")]
    pub id: String,
    /// Permission set name.
    #[serde(rename = "Name")]
    pub name: String,
}

/// Extracts and decodes the `records` array of a query response.
///
/// A body without `records` is an empty result; anything that is not a JSON
/// object, or rows that do not decode, is a parse failure.
pub fn parse_records<T: DeserializeOwned>(body: Value) -> AppResult<Vec<T>> {
    let Value::Object(mut object) = body else {
        return Err(AppError::Parse(
            "query response body must be a JSON object".to_owned(),
        ));
    };

    match object.remove("records") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(records @ Value::Array(_)) => serde_json::from_value(records).map_err(|error| {
            AppError::Parse(format!("query response rows have an unexpected shape: {error}"))
        }),
        Some(_) => Err(AppError::Parse(
            "query response 'records' must be an array".to_owned(),
        )),
    }
}
