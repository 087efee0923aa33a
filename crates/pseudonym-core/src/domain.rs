//! Pseudonymisation domain: the configuration context every operation needs.
//!
//! A `Domain` is an immutable, cheaply clonable handle (`Arc` inside);
//! refreshing a domain means building a new one and swapping the handle,
//! never mutating in place. Points keep a non-owning clone of their domain,
//! so a domain outlives everything created from it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use p521::Scalar;
use serde_json::{json, Value};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::client::PseudonymisationClient;
use crate::curve::{self, CURVE_NAME, FIELD_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::factory::{PseudonymFactory, PseudonymInTransitFactory, ValueFactory};
use crate::point::Point;
use pseudonym_jose::ContentEncryption;

/// A 256-bit symmetric domain key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    pub fn new(bytes: Vec<u8>) -> CoreResult<Self> {
        if bytes.len() != 32 {
            return Err(CoreError::InvalidSecretKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

struct DomainInner {
    key: String,
    crv: String,
    audience: Option<String>,
    buffer_size: usize,
    secret_keys: HashMap<String, SecretKey>,
    active_kid: Option<String>,
    active_encryption: Option<ContentEncryption>,
    in_transit_ttl: Option<Duration>,
    client: Option<Arc<dyn PseudonymisationClient>>,
}

/// Shared handle to a pseudonymisation domain. Clones are cheap and refer
/// to the same instance.
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Domain {
    pub fn builder(key: impl Into<String>) -> DomainBuilder {
        DomainBuilder {
            key: key.into(),
            crv: CURVE_NAME.to_string(),
            audience: None,
            buffer_size: 0,
            secret_keys: HashMap::new(),
            active_kid: None,
            active_encryption: None,
            in_transit_ttl: None,
            client: None,
        }
    }

    /// The domain key, e.g. `uhmep_v1`.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn crv(&self) -> &str {
        &self.inner.crv
    }

    pub fn audience(&self) -> Option<&str> {
        self.inner.audience.as_deref()
    }

    /// Anti-collision margin reserved at the low end of packed values.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn secret_key(&self, kid: &str) -> Option<&SecretKey> {
        self.inner.secret_keys.get(kid)
    }

    pub fn active_kid(&self) -> Option<&str> {
        self.inner.active_kid.as_deref()
    }

    pub fn active_encryption(&self) -> Option<ContentEncryption> {
        self.inner.active_encryption
    }

    pub fn in_transit_ttl(&self) -> Option<Duration> {
        self.inner.in_transit_ttl
    }

    /// Largest payload `Value::from` can pack on this domain.
    pub fn max_value_size(&self) -> usize {
        FIELD_SIZE - self.inner.buffer_size - 1
    }

    /// Whether two handles refer to the same domain instance (a refresh
    /// produces a new instance under the same key).
    pub fn same_instance(&self, other: &Domain) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn values(&self) -> ValueFactory {
        ValueFactory::new(self.clone())
    }

    pub fn pseudonyms(&self) -> PseudonymFactory {
        PseudonymFactory::new(self.clone())
    }

    pub fn pseudonyms_in_transit(&self) -> PseudonymInTransitFactory {
        PseudonymInTransitFactory::new(self.clone())
    }

    pub(crate) fn require_client(&self) -> CoreResult<&Arc<dyn PseudonymisationClient>> {
        self.inner.client.as_ref().ok_or(CoreError::MissingClient)
    }

    /// Random blinding scalar, never 0 and never the curve order.
    pub(crate) fn create_random(&self) -> Scalar {
        curve::random_scalar()
    }

    /// Single-item request payload: `{"id","crv","x","y"[,"transitInfo"]}`.
    pub(crate) fn request_payload_value(
        &self,
        point: &Point,
        transit_info: Option<&str>,
    ) -> Value {
        let mut payload = json!({
            "id": Uuid::new_v4().to_string(),
            "crv": self.inner.crv,
            "x": point.x(),
            "y": point.y(),
        });
        if let Some(transit_info) = transit_info {
            payload["transitInfo"] = Value::String(transit_info.to_string());
        }
        payload
    }

    pub(crate) fn request_payload(&self, point: &Point, transit_info: Option<&str>) -> String {
        self.request_payload_value(point, transit_info).to_string()
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("key", &self.inner.key)
            .field("crv", &self.inner.crv)
            .field("audience", &self.inner.audience)
            .field("buffer_size", &self.inner.buffer_size)
            .field("kids", &self.inner.secret_keys.keys().collect::<Vec<_>>())
            .field("active_kid", &self.inner.active_kid)
            .finish_non_exhaustive()
    }
}

pub struct DomainBuilder {
    key: String,
    crv: String,
    audience: Option<String>,
    buffer_size: usize,
    secret_keys: HashMap<String, SecretKey>,
    active_kid: Option<String>,
    active_encryption: Option<ContentEncryption>,
    in_transit_ttl: Option<Duration>,
    client: Option<Arc<dyn PseudonymisationClient>>,
}

impl DomainBuilder {
    pub fn crv(mut self, crv: impl Into<String>) -> Self {
        self.crv = crv.into();
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn secret_key(mut self, kid: impl Into<String>, key: SecretKey) -> Self {
        self.secret_keys.insert(kid.into(), key);
        self
    }

    pub fn active_kid(mut self, kid: impl Into<String>) -> Self {
        self.active_kid = Some(kid.into());
        self
    }

    pub fn active_encryption(mut self, enc: ContentEncryption) -> Self {
        self.active_encryption = Some(enc);
        self
    }

    pub fn in_transit_ttl(mut self, ttl: Duration) -> Self {
        self.in_transit_ttl = Some(ttl);
        self
    }

    pub fn client(mut self, client: Arc<dyn PseudonymisationClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> CoreResult<Domain> {
        if self.crv != CURVE_NAME {
            return Err(CoreError::UnsupportedCurve(self.crv));
        }
        // The length byte must fit inside the field element.
        if self.buffer_size >= FIELD_SIZE - 1 {
            return Err(CoreError::InvalidValue(format!(
                "bufferSize {} leaves no room for a value",
                self.buffer_size
            )));
        }
        if let Some(active_kid) = &self.active_kid {
            if !self.secret_keys.contains_key(active_kid) {
                return Err(CoreError::InvalidSecretKey(format!(
                    "active kid `{active_kid}` has no registered secret key"
                )));
            }
        }

        Ok(Domain {
            inner: Arc::new(DomainInner {
                key: self.key,
                crv: self.crv,
                audience: self.audience,
                buffer_size: self.buffer_size,
                secret_keys: self.secret_keys,
                active_kid: self.active_kid,
                active_encryption: self.active_encryption,
                in_transit_ttl: self.in_transit_ttl,
                client: self.client,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_value_size_subtracts_buffer_and_length_byte() {
        let domain = Domain::builder("test").buffer_size(8).build().unwrap();
        assert_eq!(domain.max_value_size(), 57);
    }

    #[test]
    fn rejects_unknown_curve() {
        assert!(matches!(
            Domain::builder("test").crv("P-256").build(),
            Err(CoreError::UnsupportedCurve(_))
        ));
    }

    #[test]
    fn rejects_active_kid_without_key() {
        assert!(matches!(
            Domain::builder("test").active_kid("2022-12").build(),
            Err(CoreError::InvalidSecretKey(_))
        ));
    }

    #[test]
    fn secret_key_must_be_256_bits() {
        assert!(SecretKey::new(vec![0u8; 16]).is_err());
        assert!(SecretKey::new(vec![0u8; 32]).is_ok());
    }

    #[test]
    fn clones_share_the_instance() {
        let domain = Domain::builder("test").buffer_size(8).build().unwrap();
        assert!(domain.same_instance(&domain.clone()));

        let rebuilt = Domain::builder("test").buffer_size(8).build().unwrap();
        assert!(!domain.same_instance(&rebuilt));
    }
}
