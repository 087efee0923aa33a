//! Multi-recipient JWE (JSON serialization).
//!
//! Domain secret keys are distributed wrapped for several recipients at
//! once. Each recipient entry names the JWKS (`jku`) and key id (`kid`) of
//! the public key the CEK was wrapped for; the client picks out its own
//! entry, unwraps the CEK with its private key, and decrypts the shared
//! ciphertext.

use rsa::{Oaep, Pkcs1v15Encrypt};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::agreement;
use crate::b64;
use crate::compact::{decrypt_aes_gcm, ENC_A256GCM};
use crate::error::{JoseError, JoseResult};
use crate::jwk::Jwk;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientHeader {
    #[serde(default)]
    pub jku: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    pub header: RecipientHeader,
    #[serde(default)]
    pub encrypted_key: Option<String>,
}

/// A JWE in JSON serialization with one shared ciphertext and N recipients.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiRecipientJwe {
    #[serde(rename = "protected")]
    pub protected: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
    #[serde(default)]
    pub aad: Option<String>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

impl MultiRecipientJwe {
    pub fn from_json(json: &str) -> JoseResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The recipients whose `jku` matches ours, i.e. entries we can unwrap.
    pub fn recipients_with_jku<'a>(
        &'a self,
        jku: &'a str,
    ) -> impl Iterator<Item = &'a Recipient> {
        self.recipients
            .iter()
            .filter(move |r| r.header.jku.as_deref() == Some(jku))
    }

    /// Decode and parse the protected header.
    pub fn header(&self) -> JoseResult<serde_json::Map<String, Value>> {
        let bytes = b64::decode_lenient(&self.protected)
            .map_err(|_| JoseError::InvalidHeader("protected segment is not Base64".into()))?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(JoseError::InvalidHeader(
                "protected header is not a JSON object".into(),
            )),
            Err(e) => Err(JoseError::InvalidHeader(e.to_string())),
        }
    }

    /// Unwrap the CEK for the recipient identified by `kid` and decrypt the
    /// payload with the given private JWK.
    pub fn decrypt(&self, private_jwk: &Jwk, kid: &str) -> JoseResult<Vec<u8>> {
        let recipient = self
            .recipients
            .iter()
            .find(|r| r.header.kid.as_deref() == Some(kid))
            .ok_or_else(|| JoseError::UnknownRecipient(kid.to_string()))?;

        let header = self.header()?;
        let enc = header.get("enc").and_then(Value::as_str);
        if enc != Some(ENC_A256GCM) {
            return Err(JoseError::UnsupportedAlgorithm(format!(
                "enc {:?} (only {ENC_A256GCM} is supported)",
                enc
            )));
        }

        // Per-recipient alg wins, then the protected header, then the
        // private key's own alg; direct encryption when none is given.
        let alg = recipient
            .header
            .alg
            .as_deref()
            .or_else(|| header.get("alg").and_then(Value::as_str))
            .or(private_jwk.alg.as_deref())
            .unwrap_or("dir")
            .to_string();

        let cek = self.unwrap_cek(&alg, recipient, private_jwk, &header)?;
        if cek.len() != 32 {
            return Err(JoseError::InvalidKey(format!(
                "unwrapped CEK is {} bytes, expected 32 for {ENC_A256GCM}",
                cek.len()
            )));
        }

        let aad = match &self.aad {
            None => self.protected.clone().into_bytes(),
            Some(extra) => format!("{}.{}", self.protected, extra).into_bytes(),
        };

        decrypt_aes_gcm(
            &cek,
            &b64::decode_lenient(&self.iv)?,
            &b64::decode_lenient(&self.ciphertext)?,
            &b64::decode_lenient(&self.tag)?,
            &aad,
        )
    }

    fn unwrap_cek(
        &self,
        alg: &str,
        recipient: &Recipient,
        private_jwk: &Jwk,
        header: &serde_json::Map<String, Value>,
    ) -> JoseResult<Zeroizing<Vec<u8>>> {
        match alg {
            "RSA-OAEP" | "RSA-OAEP-256" => {
                let wrapped = self.encrypted_key_bytes(recipient)?;
                let key = private_jwk.rsa_private_key()?;
                key.decrypt(Oaep::new::<Sha256>(), &wrapped)
                    .map(Zeroizing::new)
                    .map_err(|e| JoseError::Decryption(format!("RSA-OAEP unwrap failed: {e}")))
            }
            "RSA1_5" => {
                let wrapped = self.encrypted_key_bytes(recipient)?;
                let key = private_jwk.rsa_private_key()?;
                key.decrypt(Pkcs1v15Encrypt, &wrapped)
                    .map(Zeroizing::new)
                    .map_err(|e| JoseError::Decryption(format!("RSA1_5 unwrap failed: {e}")))
            }
            "dir" => Ok(Zeroizing::new(private_jwk.symmetric_key()?)),
            "ECDH-ES" => {
                let epk = header
                    .get("epk")
                    .cloned()
                    .ok_or_else(|| JoseError::InvalidHeader("missing `epk` for ECDH-ES".into()))?;
                let epk: Jwk = serde_json::from_value(epk)?;
                agreement::derive_cek(private_jwk, &epk)
                    .map(|cek| Zeroizing::new(cek.to_vec()))
            }
            other => Err(JoseError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn encrypted_key_bytes(&self, recipient: &Recipient) -> JoseResult<Vec<u8>> {
        let encrypted = recipient.encrypted_key.as_deref().ok_or_else(|| {
            JoseError::InvalidCompact("recipient has no encrypted_key".into())
        })?;
        b64::decode_lenient(encrypted)
    }
}
