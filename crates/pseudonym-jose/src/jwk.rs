//! JSON Web Key model.
//!
//! One permissive struct covers the three key families this client meets:
//! `oct` domain keys (`k`), RSA keystore keys (`n`/`e`/`d`/`p`/`q`) and EC
//! keys (`crv`/`x`/`y`/`d`). Extraction helpers validate the fields a given
//! use actually needs.

use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};

use crate::b64;
use crate::error::{JoseError, JoseResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    // EC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    // oct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    // RSA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// SHA-256 certificate thumbprint, the lookup key for private keys.
    #[serde(rename = "x5t#S256", default, skip_serializing_if = "Option::is_none")]
    pub x5t_s256: Option<String>,
}

impl Jwk {
    pub fn from_json(json: &str) -> JoseResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The raw symmetric key bytes of an `oct` key.
    pub fn symmetric_key(&self) -> JoseResult<Vec<u8>> {
        let k = self
            .k
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("JWK has no `k` property".into()))?;
        b64::decode_lenient(k)
    }

    /// Build an RSA private key from `n`/`e`/`d`/`p`/`q`.
    pub fn rsa_private_key(&self) -> JoseResult<RsaPrivateKey> {
        let n = self.biguint("n")?;
        let e = self.biguint("e")?;
        let d = self.biguint("d")?;
        let p = self.biguint("p")?;
        let q = self.biguint("q")?;

        RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| JoseError::InvalidKey(format!("invalid RSA components: {e}")))
    }

    fn biguint(&self, field: &str) -> JoseResult<BigUint> {
        let value = match field {
            "n" => &self.n,
            "e" => &self.e,
            "d" => &self.d,
            "p" => &self.p,
            "q" => &self.q,
            _ => &None,
        };
        let value = value
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey(format!("JWK has no `{field}` property")))?;
        Ok(BigUint::from_bytes_be(&b64::decode_lenient(value)?))
    }
}

/// A JSON Web Key Set as published at a JWKS endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn from_json(json: &str) -> JoseResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_oct_key() {
        let jwk = Jwk::from_json(
            r#"{"kty":"oct","kid":"2022-12","alg":"A256GCM","k":"AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8"}"#,
        )
        .unwrap();
        assert_eq!(jwk.symmetric_key().unwrap().len(), 32);
        assert_eq!(jwk.kid.as_deref(), Some("2022-12"));
    }

    #[test]
    fn thumbprint_field_uses_jose_name() {
        let jwk = Jwk::from_json(r#"{"kty":"RSA","x5t#S256":"abc"}"#).unwrap();
        assert_eq!(jwk.x5t_s256.as_deref(), Some("abc"));
    }

    #[test]
    fn jwk_set_lookup_by_kid() {
        let set = JwkSet::from_json(
            r#"{"keys":[{"kty":"oct","kid":"a"},{"kty":"oct","kid":"b"}]}"#,
        )
        .unwrap();
        assert!(set.find("b").is_some());
        assert!(set.find("c").is_none());
    }

    #[test]
    fn missing_fields_are_reported() {
        let jwk = Jwk::from_json(r#"{"kty":"oct"}"#).unwrap();
        assert!(matches!(jwk.symmetric_key(), Err(JoseError::InvalidKey(_))));
        assert!(matches!(jwk.rsa_private_key(), Err(JoseError::InvalidKey(_))));
    }
}
