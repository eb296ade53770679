use std::fmt::{Display, Formatter};

use fieldlens_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Standard fields whose access is always granted and never inspected.
pub const EXCLUDED_FIELD_NAMES: &[&str] = &[
    "Name",
    "CreatedById",
    "CreatedDate",
    "LastModifiedById",
    "LastModifiedDate",
    "OwnerId",
];

/// Best-effort `{object, field}` pair inferred from page markup.
///
/// Either part may be empty; an identity is only worth inspecting when
/// [`FieldIdentity::is_usable`] holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldIdentity {
    object_name: String,
    field_name: String,
}

impl FieldIdentity {
    /// Creates an identity from raw, possibly empty, names.
    #[must_use]
    pub fn new(object_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            field_name: field_name.into(),
        }
    }

    /// Returns the owning object API name.
    #[must_use]
    pub fn object_name(&self) -> &str {
        self.object_name.as_str()
    }

    /// Returns the field API name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.field_name.as_str()
    }

    /// Returns whether both names were resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.object_name.is_empty() && !self.field_name.is_empty()
    }

    /// Returns whether the field is always granted and should be skipped.
    #[must_use]
    pub fn is_excluded(&self) -> bool {
        EXCLUDED_FIELD_NAMES.contains(&self.field_name.as_str())
    }

    /// Returns whether this identity should get a permissions affordance.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_complete() && !self.is_excluded()
    }

    /// Builds the query-safe `Object.Field` name.
    pub fn qualified_name(&self) -> AppResult<QualifiedFieldName> {
        if !self.is_complete() {
            return Err(AppError::Validation(format!(
                "field identity '{}.{}' is incomplete",
                self.object_name, self.field_name
            )));
        }

        QualifiedFieldName::new(self.object_name.as_str(), self.field_name.as_str())
    }
}

/// Validated `Object.Field` name used in queries and create payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedFieldName(String);

impl QualifiedFieldName {
    /// Joins two identifier-safe names.
    pub fn new(object_name: &str, field_name: &str) -> AppResult<Self> {
        for (label, value) in [("object", object_name), ("field", field_name)] {
            if !is_identifier_safe(value) {
                return Err(AppError::Validation(format!(
                    "{label} name '{value}' contains characters that are not allowed in an API name"
                )));
            }
        }

        Ok(Self(format!("{object_name}.{field_name}")))
    }

    /// Parses an already qualified name such as `WorkOrder.Status`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let (object_name, field_name) = value.split_once('.').ok_or_else(|| {
            AppError::Validation(format!("qualified field name '{value}' has no object part"))
        })?;

        Self::new(object_name, field_name)
    }

    /// Returns the object-type portion preceding the separator.
    #[must_use]
    pub fn object_type(&self) -> &str {
        self.0
            .split_once('.')
            .map(|(object_name, _)| object_name)
            .unwrap_or(self.0.as_str())
    }

    /// Returns the full `Object.Field` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for QualifiedFieldName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for QualifiedFieldName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<QualifiedFieldName> for String {
    fn from(value: QualifiedFieldName) -> Self {
        value.0
    }
}

/// Returns whether `value` can be interpolated into a query as an API name.
///
/// Accepts an ASCII letter followed by ASCII letters, digits and underscores.
#[must_use]
pub fn is_identifier_safe(value: &str) -> bool {
    let mut characters = value.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic())
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

#[cfg(test)]
mod tests {
    use super::{FieldIdentity, QualifiedFieldName, is_identifier_safe};

    #[test]
    fn excluded_standard_fields_are_not_usable() {
        assert!(!FieldIdentity::new("Account", "OwnerId").is_usable());
        assert!(!FieldIdentity::new("Account", "").is_usable());
        assert!(!FieldIdentity::new("", "Industry").is_usable());
        assert!(FieldIdentity::new("Account", "Industry").is_usable());
    }

    #[test]
    fn qualified_name_rejects_quote_injection() {
        let identity = FieldIdentity::new("Account", "Name' OR Id != '");
        assert!(identity.qualified_name().is_err());
    }

    #[test]
    fn qualified_name_exposes_object_type() {
        let name = QualifiedFieldName::parse("WorkOrder.Status");
        assert_eq!(name.as_ref().map(QualifiedFieldName::object_type).ok(), Some("WorkOrder"));
    }

    #[test]
    fn custom_field_names_are_identifier_safe() {
        assert!(is_identifier_safe("Region__c"));
        assert!(!is_identifier_safe("9Lives"));
        assert!(!is_identifier_safe(""));
        assert!(!is_identifier_safe("Acct.Name"));
    }
}
