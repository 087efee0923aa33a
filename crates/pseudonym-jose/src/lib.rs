//! JOSE primitives for the pseudonymisation client.
//!
//! Two wire formats live here:
//!
//! - [`compact`]: the custom compact JWE used for transit info —
//!   `{header}..{iv}.{ciphertext}.{tag}` with direct AES-256-GCM encryption
//!   (empty encrypted-key segment, `alg: "dir"`).
//! - [`recipient`]: the multi-recipient JWE JSON serialization in which the
//!   pseudonymisation service distributes domain secret keys, unwrapped with
//!   a recipient's private JWK (RSA-OAEP-256 or ECDH-ES).
//!
//! Everything is intentionally narrow: only the algorithms the service
//! actually emits are supported, and anything else is rejected instead of
//! being guessed at.

pub mod agreement;
pub mod b64;
pub mod compact;
pub mod error;
pub mod jwk;
pub mod recipient;

pub use compact::{encrypt_direct, CompactJwe, ALG_DIRECT, ENC_A256GCM};
pub use error::{JoseError, JoseResult};
pub use jwk::{Jwk, JwkSet};
pub use recipient::MultiRecipientJwe;

/// Content-encryption algorithms supported for domain keys and transit info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncryption {
    /// AES-256 in Galois/Counter Mode, 96-bit IV, 128-bit tag.
    A256Gcm,
}

impl ContentEncryption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncryption::A256Gcm => "A256GCM",
        }
    }
}

impl std::fmt::Display for ContentEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentEncryption {
    type Err = JoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A256GCM" => Ok(ContentEncryption::A256Gcm),
            other => Err(JoseError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}
