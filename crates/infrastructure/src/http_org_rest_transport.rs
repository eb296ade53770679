use async_trait::async_trait;
use fieldlens_application::OrgRestTransport;
use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// REST transport against an org's `services/data` API.
///
/// Every call is a single attempt; non-success statuses surface as
/// [`AppError::Network`] with the response body attached.
pub struct HttpOrgRestTransport {
    http_client: reqwest::Client,
    api_version: String,
}

impl HttpOrgRestTransport {
    /// Creates a transport for one API version, e.g. `58.0`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, api_version: impl Into<String>) -> Self {
        Self {
            http_client,
            api_version: api_version.into(),
        }
    }

    fn endpoint(&self, domain: &OrgDomain, segments: &[&str]) -> AppResult<Url> {
        let raw = format!("https://{domain}/services/data/v{}", self.api_version);
        let mut url = Url::parse(raw.as_str())
            .map_err(|error| AppError::Validation(format!("invalid REST endpoint '{raw}': {error}")))?;

        url.path_segments_mut()
            .map_err(|()| AppError::Validation(format!("REST endpoint '{raw}' cannot take a path")))?
            .extend(segments);
        Ok(url)
    }

    fn query_url(&self, domain: &OrgDomain, soql: &str) -> AppResult<Url> {
        let mut url = self.endpoint(domain, &["query", ""])?;
        url.query_pairs_mut().append_pair("q", soql);
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, token: &SessionToken) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(token.expose())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<String> {
        let response = builder
            .send()
            .await
            .map_err(|error| AppError::transport(format!("REST request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());

        if status.is_success() {
            Ok(body)
        } else {
            Err(AppError::status(status.as_u16(), body))
        }
    }
}

fn parse_body(body: &str) -> AppResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(body)
        .map_err(|error| AppError::Parse(format!("REST response is not valid JSON: {error}")))
}

#[async_trait]
impl OrgRestTransport for HttpOrgRestTransport {
    async fn query(&self, domain: &OrgDomain, token: &SessionToken, soql: &str) -> AppResult<Value> {
        let url = self.query_url(domain, soql)?;
        debug!(url = %url, "GET query");

        let body = self
            .send(self.authorized(self.http_client.get(url), token))
            .await?;
        parse_body(body.as_str())
    }

    async fn update_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        record_id: &str,
        body: Value,
    ) -> AppResult<()> {
        let url = self.endpoint(domain, &["sobjects", sobject, record_id])?;
        debug!(url = %url, "PATCH record");

        self.send(self.authorized(self.http_client.patch(url), token).json(&body))
            .await
            .map(|_| ())
    }

    async fn create_record(
        &self,
        domain: &OrgDomain,
        token: &SessionToken,
        sobject: &str,
        body: Value,
    ) -> AppResult<Value> {
        let url = self.endpoint(domain, &["sobjects", sobject])?;
        debug!(url = %url, "POST record");

        let response = self
            .send(self.authorized(self.http_client.post(url), token).json(&body))
            .await?;
        parse_body(response.as_str())
    }
}
