//! Query text for every read the inspector performs.
//!
//! The query API has no parameter binding, so every interpolated value is
//! validated before it reaches a query string.

use fieldlens_core::{AppError, AppResult};
use fieldlens_domain::QualifiedFieldName;

pub(crate) const FIELD_PERMISSIONS_SOBJECT: &str = "FieldPermissions";

pub(crate) fn field_permissions_query(field: &QualifiedFieldName) -> String {
    format!(
        "SELECT Id, Field, PermissionsEdit, PermissionsRead, Parent.Id, Parent.Name, \
         Parent.Type, Parent.Profile.Name FROM FieldPermissions WHERE Field = '{field}' \
         ORDER BY Parent.Type, Parent.Name"
    )
}

pub(crate) fn permission_set_catalog_query() -> &'static str {
    "SELECT Id, Name FROM PermissionSet WHERE IsOwnedByProfile = false"
}

pub(crate) fn active_users_query(limit: usize) -> String {
    format!("SELECT Id, Name, Username FROM User WHERE IsActive = true ORDER BY Name LIMIT {limit}")
}

pub(crate) fn user_access_query(user_id: &str) -> AppResult<String> {
    validate_record_id(user_id)?;

    Ok(format!(
        "SELECT Id, Name, ProfileId, Profile.Name, (SELECT PermissionSetId, \
         PermissionSet.Name FROM PermissionSetAssignments) FROM User WHERE Id = '{user_id}'"
    ))
}

fn validate_record_id(value: &str) -> AppResult<()> {
    let valid_length = matches!(value.len(), 15 | 18);
    if !valid_length || !value.chars().all(|character| character.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(format!(
            "'{value}' is not a 15 or 18 character record id"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use fieldlens_domain::QualifiedFieldName;

    use super::{field_permissions_query, user_access_query};

    #[test]
    fn field_query_filters_on_exactly_one_field() {
        let field = QualifiedFieldName::new("WorkOrder", "Status");
        let query = field.map(|field| field_permissions_query(&field));

        assert!(query.is_ok_and(|query| {
            query.contains("WHERE Field = 'WorkOrder.Status'")
                && query.ends_with("ORDER BY Parent.Type, Parent.Name")
        }));
    }

    #[test]
    fn user_query_rejects_non_identifiers() {
        assert!(user_access_query("005' OR Name != '").is_err());
        assert!(user_access_query("0055g00000AbCdE").is_ok());
        assert!(user_access_query("0055g00000AbCdEAAZ").is_ok());
    }
}
