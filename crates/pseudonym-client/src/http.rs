//! reqwest implementation of the pseudonymisation service client.
//!
//! Every call goes to the live service; nothing is cached here. The
//! cookbook requires `Content-Type: application/json` plus `From` and
//! `User-Agent` headers identifying the calling organisation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use pseudonym_core::{ClientError, ClientResult, PseudonymisationClient};

const DEFAULT_USER_AGENT: &str = concat!("pseudonym-client/", env!("CARGO_PKG_VERSION"));

pub struct HttpPseudonymisationClient {
    client: Client,
    base_url: String,
    from: Option<String>,
    user_agent: String,
}

impl HttpPseudonymisationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            from: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// `From` header value (see the service cookbook).
    pub fn from_header(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> ClientResult<String> {
        debug!(path, "GET pseudonymisation service");
        let request = self.decorate(self.client.get(self.url(path)));
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::read_body(response).await
    }

    async fn post(&self, path: &str, payload: &str) -> ClientResult<String> {
        debug!(path, "POST pseudonymisation service");
        let request = self
            .decorate(self.client.post(self.url(path)))
            .header("Content-Type", "application/json")
            .body(payload.to_string());
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::read_body(response).await
    }

    fn decorate(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request = request.header("User-Agent", self.user_agent.as_str());
        if let Some(from) = &self.from {
            request = request.header("From", from.as_str());
        }
        request
    }

    /// Client errors (4xx) carry problem JSON the core knows how to
    /// surface, so their bodies pass through; anything else non-2xx fails.
    async fn read_body(response: Response) -> ClientResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if status.is_success() || status.is_client_error() {
            Ok(body)
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl PseudonymisationClient for HttpPseudonymisationClient {
    async fn get_domain(&self, domain_key: &str) -> ClientResult<String> {
        self.get(&format!("/pseudo/v1/domains/{domain_key}")).await
    }

    async fn identify(&self, domain_key: &str, payload: &str) -> ClientResult<String> {
        self.post(&format!("/pseudo/v1/domains/{domain_key}/identify"), payload)
            .await
    }

    async fn identify_multiple(&self, domain_key: &str, payload: &str) -> ClientResult<String> {
        self.post(
            &format!("/pseudo/v1/domains/{domain_key}/identifyMultiple"),
            payload,
        )
        .await
    }

    async fn pseudonymize(&self, domain_key: &str, payload: &str) -> ClientResult<String> {
        self.post(
            &format!("/pseudo/v1/domains/{domain_key}/pseudonymize"),
            payload,
        )
        .await
    }

    async fn pseudonymize_multiple(
        &self,
        domain_key: &str,
        payload: &str,
    ) -> ClientResult<String> {
        self.post(
            &format!("/pseudo/v1/domains/{domain_key}/pseudonymizeMultiple"),
            payload,
        )
        .await
    }

    async fn convert_to(
        &self,
        from_domain_key: &str,
        to_domain_key: &str,
        payload: &str,
    ) -> ClientResult<String> {
        self.post(
            &format!("/pseudo/v1/domains/{from_domain_key}/convertTo/{to_domain_key}"),
            payload,
        )
        .await
    }

    async fn convert_multiple_to(
        &self,
        from_domain_key: &str,
        to_domain_key: &str,
        payload: &str,
    ) -> ClientResult<String> {
        self.post(
            &format!("/pseudo/v1/domains/{from_domain_key}/convertMultipleTo/{to_domain_key}"),
            payload,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = HttpPseudonymisationClient::new("https://api.example.org/");
        assert_eq!(
            client.url("/pseudo/v1/domains/uhmep_v1"),
            "https://api.example.org/pseudo/v1/domains/uhmep_v1"
        );
    }
}
