//! Encrypted transit metadata attached to a pseudonym in transit.
//!
//! A transit info moves through explicit stages, each a pure transition:
//!
//! ```text
//! TransitInfo (raw compact JWE)
//!   └─ parse()    → ParsedTransitInfo     header checked: alg/enc/aud
//!        └─ decrypt()  → DecryptedTransitInfo  kid resolved, payload open
//!             └─ validate() / scalar()         iat/exp window, blinding scalar
//! ```
//!
//! Freshly created transit infos carry the blinding scalar encrypted under
//! the domain's active key; the serialized compact form is fixed at creation
//! time.


use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use p521::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::curve;
use crate::domain::Domain;
use crate::error::{CoreError, CoreResult};
use pseudonym_jose::compact::{self, CompactJwe, ALG_DIRECT};
use pseudonym_jose::b64;

/// Tolerated clock drift, per the eHealth specification.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

const RESERVED_PAYLOAD_KEYS: [&str; 3] = ["iat", "exp", "scalar"];
const RESERVED_HEADER_KEYS: [&str; 4] = ["kid", "aud", "iat", "exp"];
const FIXED_HEADER_KEYS: [&str; 3] = ["alg", "enc", "typ"];

/// Caller-supplied extension fields for the transit-info header and payload.
///
/// Reserved names are rejected at creation time; fixed header fields
/// (`alg`, `enc`, `typ`) silently keep their protocol values.
#[derive(Debug, Clone, Default)]
pub struct TransitInfoCustomizer {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
}

/// The decrypted payload of a transit info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitPayload {
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Encrypted transit metadata in its wire form.
pub struct TransitInfo {
    domain: Domain,
    raw: String,
}

impl TransitInfo {
    /// Wrap a raw compact JWE received from outside; nothing is parsed yet.
    pub(crate) fn from_raw(domain: Domain, raw: impl Into<String>) -> Self {
        Self {
            domain,
            raw: raw.into(),
        }
    }

    /// Build and encrypt a fresh transit info for the given blinding scalar.
    pub(crate) fn create(
        domain: &Domain,
        scalar: &Scalar,
        customizer: &TransitInfoCustomizer,
    ) -> CoreResult<Self> {
        Self::create_at(domain, scalar, customizer, Utc::now().timestamp())
    }

    pub(crate) fn create_at(
        domain: &Domain,
        scalar: &Scalar,
        customizer: &TransitInfoCustomizer,
        now: i64,
    ) -> CoreResult<Self> {
        let active_kid = domain.active_kid().ok_or_else(|| {
            CoreError::InvalidTransitInfo(format!(
                "domain `{}` has no active kid; it probably needs to be refreshed",
                domain.key()
            ))
        })?;
        let secret_key = domain.secret_key(active_kid).ok_or_else(|| {
            CoreError::InvalidTransitInfo(format!(
                "no secret key for active kid `{active_kid}`: is this client allowed to \
                 fetch secret keys of domain `{}`?",
                domain.key()
            ))
        })?;
        let encryption = domain.active_encryption().ok_or_else(|| {
            CoreError::InvalidTransitInfo("domain has no active encryption algorithm".into())
        })?;
        let ttl = domain.in_transit_ttl().ok_or_else(|| {
            CoreError::InvalidTransitInfo("domain has no in-transit TTL".into())
        })?;
        let audience = domain.audience().ok_or_else(|| {
            CoreError::InvalidTransitInfo("domain has no audience".into())
        })?;

        let iat = now;
        let exp = now + ttl.num_seconds();

        // Payload: fixed claims first, then customizer extras.
        for key in RESERVED_PAYLOAD_KEYS {
            if customizer.payload.contains_key(key) {
                return Err(CoreError::InvalidTransitInfo(format!(
                    "custom payload field `{key}` collides with a reserved claim"
                )));
            }
        }
        let payload = TransitPayload {
            iat,
            exp,
            scalar: Some(STANDARD.encode(curve::scalar_to_be_bytes(scalar))),
            extra: customizer.payload.clone(),
        };

        // Header: alg/enc/typ are fixed, kid/aud/iat/exp are ours to set.
        for key in RESERVED_HEADER_KEYS {
            if customizer.header.contains_key(key) {
                return Err(CoreError::InvalidTransitInfo(format!(
                    "custom header field `{key}` collides with a reserved parameter"
                )));
            }
        }
        let mut header = Map::new();
        header.insert("alg".into(), Value::String(ALG_DIRECT.into()));
        header.insert("enc".into(), Value::String(encryption.as_str().into()));
        header.insert("typ".into(), Value::String("JWT".into()));
        header.insert("kid".into(), Value::String(active_kid.into()));
        header.insert("aud".into(), Value::String(audience.into()));
        header.insert("iat".into(), Value::Number(iat.into()));
        header.insert("exp".into(), Value::Number(exp.into()));
        for (key, value) in &customizer.header {
            if !FIXED_HEADER_KEYS.contains(&key.as_str()) {
                header.insert(key.clone(), value.clone());
            }
        }

        let payload_json = serde_json::to_vec(&payload)?;
        let raw = compact::encrypt_direct(&header, &payload_json, secret_key.as_bytes())?;

        Ok(Self {
            domain: domain.clone(),
            raw,
        })
    }

    /// The compact JWE serialization.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parse and check the protected header.
    ///
    /// Requires `alg == "dir"`, a present `enc`, and a non-empty `aud`
    /// matching the domain's audience when one is configured.
    pub fn parse(&self) -> CoreResult<ParsedTransitInfo<'_>> {
        let jwe = CompactJwe::parse(&self.raw)
            .map_err(|e| CoreError::InvalidTransitInfo(e.to_string()))?;
        let header = jwe
            .header()
            .map_err(|e| CoreError::InvalidTransitInfo(e.to_string()))?;

        match header.get("alg").and_then(Value::as_str) {
            Some(ALG_DIRECT) => {}
            _ => {
                return Err(CoreError::InvalidTransitInfo(
                    "`alg` with value `dir` expected in header".into(),
                ))
            }
        }
        if header.get("enc").is_none() {
            return Err(CoreError::InvalidTransitInfo("missing `enc` in header".into()));
        }
        let aud = header
            .get("aud")
            .and_then(Value::as_str)
            .filter(|aud| !aud.is_empty())
            .ok_or_else(|| CoreError::InvalidTransitInfo("missing `aud` in header".into()))?;
        if let Some(expected) = self.domain.audience() {
            if aud != expected {
                return Err(CoreError::InvalidTransitInfo(format!(
                    "audience `{aud}` does not match the domain audience `{expected}`"
                )));
            }
        }

        Ok(ParsedTransitInfo {
            domain: &self.domain,
            jwe,
            header,
        })
    }

    /// Convenience copy of the parsed header.
    pub fn header(&self) -> CoreResult<Map<String, Value>> {
        Ok(self.parse()?.header().clone())
    }
}

impl std::fmt::Debug for TransitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Header-validated transit info; the payload is still sealed.
pub struct ParsedTransitInfo<'a> {
    domain: &'a Domain,
    jwe: CompactJwe,
    header: Map<String, Value>,
}

impl ParsedTransitInfo<'_> {
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    pub fn audience(&self) -> &str {
        // Presence was established by `parse`.
        self.header
            .get("aud")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kid(&self) -> CoreResult<&str> {
        self.header
            .get("kid")
            .and_then(Value::as_str)
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| {
                CoreError::InvalidTransitInfo("could not find `kid` in header".into())
            })
    }

    /// Look up the `kid`'s secret key and open the payload.
    pub fn decrypt(&self) -> CoreResult<DecryptedTransitInfo> {
        let kid = self.kid()?;
        let secret_key = self
            .domain
            .secret_key(kid)
            .ok_or_else(|| CoreError::UnknownKid(kid.to_string()))?;

        let plaintext = self
            .jwe
            .decrypt_direct(secret_key.as_bytes())
            .map_err(|e| CoreError::InvalidTransitInfo(format!("payload decryption failed: {e}")))?;
        let payload: TransitPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| CoreError::InvalidTransitInfo(format!("malformed payload: {e}")))?;

        Ok(DecryptedTransitInfo { payload })
    }
}

/// Decrypted transit info; the temporal claims are not yet checked.
#[derive(Debug)]
pub struct DecryptedTransitInfo {
    payload: TransitPayload,
}

impl DecryptedTransitInfo {
    pub fn payload(&self) -> &TransitPayload {
        &self.payload
    }

    /// Check `iat`/`exp` against the current time with ±60 s skew.
    pub fn validate(&self) -> CoreResult<()> {
        self.validate_at(Utc::now().timestamp())
    }

    pub fn validate_at(&self, now: i64) -> CoreResult<()> {
        if now + CLOCK_SKEW_SECONDS < self.payload.iat {
            return Err(CoreError::InvalidTransitInfo(
                "transit info not yet ready for use (iat > now)".into(),
            ));
        }
        if now - CLOCK_SKEW_SECONDS > self.payload.exp {
            return Err(CoreError::InvalidTransitInfo(
                "expired transit info (now > exp)".into(),
            ));
        }
        Ok(())
    }

    /// The blinding scalar carried in the payload.
    pub fn scalar(&self) -> CoreResult<Scalar> {
        let encoded = self.payload.scalar.as_deref().ok_or_else(|| {
            CoreError::InvalidTransitInfo("payload carries no `scalar` claim".into())
        })?;
        let bytes = b64::decode_lenient(encoded)
            .map_err(|e| CoreError::InvalidTransitInfo(format!("malformed scalar: {e}")))?;
        curve::scalar_from_be_bytes(&bytes)
    }
}
