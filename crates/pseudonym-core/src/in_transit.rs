//! A blinded pseudonym plus the encrypted metadata to unblind it.

use crate::domain::Domain;
use crate::error::CoreResult;
use crate::factory::{PseudonymFactory, PseudonymInTransitFactory};
use crate::pseudonym::Pseudonym;
use crate::transit_info::TransitInfo;
use crate::value::Value;

/// A pseudonym blinded for transmission, together with its transit info.
///
/// The exposed X/Y are the blinded coordinates; the true pseudonym only
/// exists again after [`at_rest`](Self::at_rest).
pub struct PseudonymInTransit {
    pseudonym: Pseudonym,
    transit_info: TransitInfo,
}

impl PseudonymInTransit {
    pub(crate) fn new(pseudonym: Pseudonym, transit_info: TransitInfo) -> Self {
        Self {
            pseudonym,
            transit_info,
        }
    }

    /// The blinded pseudonym as transmitted.
    pub fn pseudonym(&self) -> &Pseudonym {
        &self.pseudonym
    }

    pub fn transit_info(&self) -> &TransitInfo {
        &self.transit_info
    }

    pub fn domain(&self) -> &Domain {
        self.pseudonym.domain()
    }

    pub fn x(&self) -> String {
        self.pseudonym.x()
    }

    pub fn y(&self) -> String {
        self.pseudonym.y()
    }

    /// Decrypt the transit info and unblind, validating `iat`/`exp`.
    pub fn at_rest(&self) -> CoreResult<Pseudonym> {
        self.resolve(true)
    }

    /// Like [`at_rest`](Self::at_rest) but without the temporal checks.
    ///
    /// Only for recovering an expired pseudonym in transit; regular code
    /// must validate.
    pub fn at_rest_unvalidated(&self) -> CoreResult<Pseudonym> {
        self.resolve(false)
    }

    fn resolve(&self, validate: bool) -> CoreResult<Pseudonym> {
        let decrypted = self.transit_info.parse()?.decrypt()?;
        if validate {
            decrypted.validate()?;
        }
        // The point was stored divided by the scalar; multiply to restore.
        self.pseudonym.multiply(&decrypted.scalar()?)
    }

    /// Identify (de-pseudonymise) through the remote service.
    pub async fn identify(&self) -> CoreResult<Value> {
        let domain = self.pseudonym.domain();
        let client = domain.require_client()?;

        let random = domain.create_random();
        let blinded = self.pseudonym.point().multiply(&random)?;
        let payload = domain.request_payload(&blinded, Some(self.transit_info.as_str()));

        let response = client.identify(domain.key(), &payload).await?;
        let pseudonym =
            PseudonymFactory::new(domain.clone()).from_raw_response(&response, &random)?;
        Ok(pseudonym.as_value())
    }

    /// Convert into a pseudonym in transit of another domain.
    pub async fn convert_to(
        &self,
        to_domain: &Domain,
    ) -> CoreResult<PseudonymInTransit> {
        let domain = self.pseudonym.domain();
        let client = domain.require_client()?;

        let random = domain.create_random();
        let blinded = self.pseudonym.point().multiply(&random)?;
        let payload = domain.request_payload(&blinded, Some(self.transit_info.as_str()));

        let response = client
            .convert_to(domain.key(), to_domain.key(), &payload)
            .await?;
        PseudonymInTransitFactory::new(to_domain.clone())
            .from_raw_response(&response, &random)
    }

    /// `{uncompressed SEC1, Base64URL}:{compact JWE}`.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.pseudonym.as_string(), self.transit_info.as_str())
    }

    /// `{compressed SEC1, Base64URL}:{compact JWE}`.
    pub fn as_short_string(&self) -> String {
        format!(
            "{}:{}",
            self.pseudonym.as_short_string(),
            self.transit_info.as_str()
        )
    }
}

impl std::fmt::Debug for PseudonymInTransit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.pseudonym, f)
    }
}
