//! Compact JWE with direct symmetric encryption.
//!
//! The transit-info token is a five-segment compact JWE whose second
//! (encrypted key) segment is empty: `{header}..{iv}.{ciphertext}.{tag}`.
//! The protected header is authenticated: the AAD is the ASCII bytes of the
//! Base64URL-encoded header JSON.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{OsRng, RngCore};
use serde_json::{Map, Value};

use crate::b64;
use crate::error::{JoseError, JoseResult};

/// Key-management algorithm for direct symmetric encryption.
pub const ALG_DIRECT: &str = "dir";

/// The only content-encryption algorithm the service uses.
pub const ENC_A256GCM: &str = "A256GCM";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// A parsed compact JWE, segments decoded but not yet decrypted.
#[derive(Debug, Clone)]
pub struct CompactJwe {
    protected: String,
    encrypted_key: String,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl CompactJwe {
    /// Split a compact serialization into its five segments.
    pub fn parse(raw: &str) -> JoseResult<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 5 {
            return Err(JoseError::InvalidCompact(format!(
                "expected 5 dot-separated segments, got {}",
                parts.len()
            )));
        }

        Ok(Self {
            protected: parts[0].to_string(),
            encrypted_key: parts[1].to_string(),
            iv: b64::decode(parts[2])?,
            ciphertext: b64::decode(parts[3])?,
            tag: b64::decode(parts[4])?,
        })
    }

    /// The Base64URL-encoded protected header segment, verbatim.
    pub fn protected(&self) -> &str {
        &self.protected
    }

    pub fn encrypted_key(&self) -> &str {
        &self.encrypted_key
    }

    /// Decode and parse the protected header as a JSON object.
    pub fn header(&self) -> JoseResult<Map<String, Value>> {
        let bytes = b64::decode(&self.protected)
            .map_err(|_| JoseError::InvalidHeader("protected segment is not Base64URL".into()))?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(JoseError::InvalidHeader(
                "protected header is not a JSON object".into(),
            )),
            Err(e) => Err(JoseError::InvalidHeader(e.to_string())),
        }
    }

    /// Decrypt with a 256-bit symmetric key (`alg: "dir"`).
    ///
    /// The AAD is the protected segment exactly as it appears on the wire,
    /// so any tampering with the header fails authentication here.
    pub fn decrypt_direct(&self, key: &[u8]) -> JoseResult<Vec<u8>> {
        if key.len() != KEY_LEN {
            return Err(JoseError::InvalidKey(format!(
                "direct encryption requires a {KEY_LEN}-byte key, got {}",
                key.len()
            )));
        }
        if self.iv.len() != IV_LEN {
            return Err(JoseError::InvalidCompact(format!(
                "expected a {IV_LEN}-byte IV, got {}",
                self.iv.len()
            )));
        }

        decrypt_aes_gcm(
            key,
            &self.iv,
            &self.ciphertext,
            &self.tag,
            self.protected.as_bytes(),
        )
    }

    /// Re-assemble the compact serialization.
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.protected,
            self.encrypted_key,
            b64::encode(&self.iv),
            b64::encode(&self.ciphertext),
            b64::encode(&self.tag)
        )
    }
}

/// Encrypt a payload under a 256-bit key with `alg: "dir"`, `enc: "A256GCM"`.
///
/// The caller provides the complete protected header; a fresh 96-bit IV is
/// drawn from the system CSPRNG per token.
pub fn encrypt_direct(
    header: &Map<String, Value>,
    plaintext: &[u8],
    key: &[u8],
) -> JoseResult<String> {
    if key.len() != KEY_LEN {
        return Err(JoseError::InvalidKey(format!(
            "direct encryption requires a {KEY_LEN}-byte key, got {}",
            key.len()
        )));
    }

    let header_json = serde_json::to_vec(&Value::Object(header.clone()))?;
    let protected = b64::encode(&header_json);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| JoseError::Encryption(e.to_string()))?;
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|e| JoseError::Encryption(e.to_string()))?;

    // aes-gcm appends the tag to the ciphertext
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}..{}.{}.{}",
        protected,
        b64::encode(iv),
        b64::encode(&sealed),
        b64::encode(&tag)
    ))
}

/// AES-256-GCM open with a detached tag, shared by both JWE forms.
pub(crate) fn decrypt_aes_gcm(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> JoseResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| JoseError::Decryption(e.to_string()))?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: &sealed,
                aad,
            },
        )
        .map_err(|_| JoseError::Decryption("AES-GCM authentication failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Map<String, Value> {
        let mut h = Map::new();
        h.insert("alg".into(), Value::String(ALG_DIRECT.into()));
        h.insert("enc".into(), Value::String(ENC_A256GCM.into()));
        h.insert("kid".into(), Value::String("2022-12".into()));
        h
    }

    #[test]
    fn roundtrip() {
        let key = [7u8; 32];
        let compact = encrypt_direct(&header(), b"{\"scalar\":\"AQ\"}", &key).unwrap();

        let jwe = CompactJwe::parse(&compact).unwrap();
        assert!(jwe.encrypted_key().is_empty());
        assert_eq!(jwe.header().unwrap()["alg"], "dir");
        assert_eq!(jwe.decrypt_direct(&key).unwrap(), b"{\"scalar\":\"AQ\"}");
        assert_eq!(jwe.to_compact(), compact);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(
            CompactJwe::parse("a.b.c.d"),
            Err(JoseError::InvalidCompact(_))
        ));
        assert!(matches!(
            CompactJwe::parse("a.b.c.d.e.f"),
            Err(JoseError::InvalidCompact(_))
        ));
    }

    #[test]
    fn tampered_header_fails_authentication() {
        let key = [9u8; 32];
        let compact = encrypt_direct(&header(), b"payload", &key).unwrap();

        let mut parts: Vec<String> = compact.split('.').map(String::from).collect();
        let mut forged = header();
        forged.insert("kid".into(), Value::String("2023-01".into()));
        parts[0] = b64::encode(serde_json::to_vec(&Value::Object(forged)).unwrap());

        let jwe = CompactJwe::parse(&parts.join(".")).unwrap();
        assert!(matches!(
            jwe.decrypt_direct(&key),
            Err(JoseError::Decryption(_))
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let compact = encrypt_direct(&header(), b"payload", &[1u8; 32]).unwrap();
        let jwe = CompactJwe::parse(&compact).unwrap();
        assert!(jwe.decrypt_direct(&[2u8; 32]).is_err());
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            encrypt_direct(&header(), b"x", &[0u8; 16]),
            Err(JoseError::InvalidKey(_))
        ));
    }
}
