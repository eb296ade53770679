use std::env;

use fieldlens_core::{AppError, AppResult};

const DEFAULT_API_VERSION: &str = "58.0";

/// Runtime settings for org-bound commands.
#[derive(Clone)]
pub(crate) struct InspectorConfig {
    pub(crate) instance_host: String,
    pub(crate) api_version: String,
    pub(crate) session_token: Option<String>,
    pub(crate) http_timeout_seconds: u64,
    pub(crate) user_lookup_limit: usize,
}

impl std::fmt::Debug for InspectorConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InspectorConfig")
            .field("instance_host", &self.instance_host)
            .field("api_version", &self.api_version)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field("user_lookup_limit", &self.user_lookup_limit)
            .finish()
    }
}

impl InspectorConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let instance_host = read("FIELDLENS_INSTANCE_HOST").ok_or_else(|| {
            AppError::Validation("FIELDLENS_INSTANCE_HOST is required".to_owned())
        })?;
        let api_version =
            read("FIELDLENS_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_owned());
        let session_token = read("FIELDLENS_SESSION_TOKEN");
        let parsed = |name: &str| read(name).map(|value| (name.to_owned(), value));
        let http_timeout_seconds = parse_or(parsed("FIELDLENS_HTTP_TIMEOUT_SECONDS"), 15_u64)?;
        let user_lookup_limit = parse_or(parsed("FIELDLENS_USER_LOOKUP_LIMIT"), 50_usize)?;

        if !is_api_version(api_version.as_str()) {
            return Err(AppError::Validation(format!(
                "FIELDLENS_API_VERSION must look like '58.0', got '{api_version}'"
            )));
        }

        if http_timeout_seconds == 0 {
            return Err(AppError::Validation(
                "FIELDLENS_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if user_lookup_limit == 0 {
            return Err(AppError::Validation(
                "FIELDLENS_USER_LOOKUP_LIMIT must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            instance_host,
            api_version,
            session_token,
            http_timeout_seconds,
            user_lookup_limit,
        })
    }

    pub(crate) fn require_session_token(&self) -> AppResult<&str> {
        self.session_token.as_deref().ok_or_else(|| {
            AppError::Unauthorized("FIELDLENS_SESSION_TOKEN is required for org commands".to_owned())
        })
    }
}

fn parse_or<T>(entry: Option<(String, String)>, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match entry {
        Some((name, value)) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn is_api_version(value: &str) -> bool {
    value.split_once('.').is_some_and(|(major, minor)| {
        !major.is_empty()
            && !minor.is_empty()
            && major.chars().all(|character| character.is_ascii_digit())
            && minor.chars().all(|character| character.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use fieldlens_core::AppError;

    use super::InspectorConfig;

    fn load(pairs: &[(&str, &str)]) -> Result<InspectorConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        InspectorConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_host_is_set() {
        let config = load(&[("FIELDLENS_INSTANCE_HOST", "acme.lightning.force.com")])
            .unwrap_or_else(|error| panic!("config should load: {error}"));

        assert_eq!(config.api_version, "58.0");
        assert_eq!(config.http_timeout_seconds, 15);
        assert_eq!(config.user_lookup_limit, 50);
        assert!(config.require_session_token().is_err());
    }

    #[test]
    fn missing_host_is_rejected() {
        assert!(matches!(load(&[]), Err(AppError::Validation(_))));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let host = ("FIELDLENS_INSTANCE_HOST", "acme.lightning.force.com");

        assert!(load(&[host, ("FIELDLENS_API_VERSION", "v58")]).is_err());
        assert!(load(&[host, ("FIELDLENS_HTTP_TIMEOUT_SECONDS", "0")]).is_err());
        assert!(load(&[host, ("FIELDLENS_USER_LOOKUP_LIMIT", "many")]).is_err());
    }

    #[test]
    fn session_token_is_redacted_in_debug_output() {
        let config = load(&[
            ("FIELDLENS_INSTANCE_HOST", "acme.lightning.force.com"),
            ("FIELDLENS_SESSION_TOKEN", "00Dxx!secret"),
        ])
        .unwrap_or_else(|error| panic!("config should load: {error}"));

        assert!(!format!("{config:?}").contains("secret"));
        assert_eq!(config.require_session_token().ok(), Some("00Dxx!secret"));
    }
}
