//! Contract for the remote pseudonymisation service.
//!
//! Implementations perform the HTTP calls; the core never caches through
//! this trait. Every method MUST hit the live service — only the domain
//! descriptor is cached, and that happens above this layer.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Client for the eHealth-style pseudonymisation REST service.
///
/// All payloads and responses are raw JSON strings; the core builds and
/// interprets them. Requests must carry `Content-Type: application/json`
/// plus the `From` and `User-Agent` headers the service cookbook requires.
#[async_trait]
pub trait PseudonymisationClient: Send + Sync {
    /// `GET /pseudo/v1/domains/{domainKey}`.
    ///
    /// Must never return a cached response.
    async fn get_domain(&self, domain_key: &str) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{domainKey}/identify`.
    async fn identify(&self, domain_key: &str, payload: &str) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{domainKey}/identifyMultiple`.
    async fn identify_multiple(&self, domain_key: &str, payload: &str) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{domainKey}/pseudonymize`.
    async fn pseudonymize(&self, domain_key: &str, payload: &str) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{domainKey}/pseudonymizeMultiple`.
    async fn pseudonymize_multiple(
        &self,
        domain_key: &str,
        payload: &str,
    ) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{fromDomainKey}/convertTo/{toDomainKey}`.
    async fn convert_to(
        &self,
        from_domain_key: &str,
        to_domain_key: &str,
        payload: &str,
    ) -> ClientResult<String>;

    /// `POST /pseudo/v1/domains/{fromDomainKey}/convertMultipleTo/{toDomainKey}`.
    async fn convert_multiple_to(
        &self,
        from_domain_key: &str,
        to_domain_key: &str,
        payload: &str,
    ) -> ClientResult<String>;
}
