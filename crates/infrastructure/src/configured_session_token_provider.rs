use std::collections::HashMap;

use async_trait::async_trait;
use fieldlens_application::SessionTokenProvider;
use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use tokio::sync::RwLock;

/// Token provider backed by tokens handed over out of band, one per domain.
#[derive(Debug, Default)]
pub struct ConfiguredSessionTokenProvider {
    tokens: RwLock<HashMap<OrgDomain, SessionToken>>,
}

impl ConfiguredSessionTokenProvider {
    /// Creates a provider without any tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider holding a single token.
    #[must_use]
    pub fn with_token(domain: OrgDomain, token: SessionToken) -> Self {
        Self {
            tokens: RwLock::new(HashMap::from([(domain, token)])),
        }
    }

    /// Registers or replaces the token for a domain.
    pub async fn register(&self, domain: OrgDomain, token: SessionToken) {
        self.tokens.write().await.insert(domain, token);
    }
}

#[async_trait]
impl SessionTokenProvider for ConfiguredSessionTokenProvider {
    async fn session_token(&self, domain: &OrgDomain) -> AppResult<SessionToken> {
        self.tokens
            .read()
            .await
            .get(domain)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(format!("no session token for '{domain}'")))
    }
}

#[cfg(test)]
mod tests {
    use fieldlens_application::SessionTokenProvider;
    use fieldlens_core::{AppError, OrgDomain, SessionToken};

    use super::ConfiguredSessionTokenProvider;

    fn domain(host: &str) -> OrgDomain {
        OrgDomain::from_presentation_host(host)
            .unwrap_or_else(|error| panic!("host should parse: {error}"))
    }

    #[tokio::test]
    async fn returns_token_registered_for_the_api_domain() {
        let provider = ConfiguredSessionTokenProvider::new();
        let token = SessionToken::new("00Dxx!abc").unwrap_or_else(|error| panic!("{error}"));
        provider
            .register(domain("acme.my.salesforce.com"), token.clone())
            .await;

        let resolved = provider
            .session_token(&domain("acme.lightning.force.com"))
            .await;

        assert!(resolved.is_ok_and(|resolved| resolved == token));
    }

    #[tokio::test]
    async fn unknown_domain_is_unauthorized() {
        let provider = ConfiguredSessionTokenProvider::new();
        let result = provider.session_token(&domain("other.my.salesforce.com")).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
