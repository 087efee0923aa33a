use thiserror::Error;

#[derive(Error, Debug)]
pub enum JoseError {
    #[error("invalid JWE compact serialization: {0}")]
    InvalidCompact(String),

    #[error("invalid JWE header: {0}")]
    InvalidHeader(String),

    #[error("invalid JWK: {0}")]
    InvalidKey(String),

    #[error("unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("no recipient with kid `{0}`")]
    UnknownRecipient(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type JoseResult<T> = Result<T, JoseError>;
