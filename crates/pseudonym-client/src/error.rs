use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("invalid domain descriptor: {0}")]
    Domain(String),

    #[error("JWKS error: {0}")]
    Jwks(String),

    #[error("no JWKS supplier configured: this helper cannot encrypt or decrypt transit info")]
    MissingJwksSupplier,

    #[error("no private-key supplier configured")]
    MissingPrivateKeySupplier,

    #[error("no private key found for certificate thumbprint `{0}`")]
    MissingPrivateKey(String),

    #[error(transparent)]
    Core(#[from] pseudonym_core::CoreError),

    #[error(transparent)]
    Jose(#[from] pseudonym_jose::JoseError),

    #[error("service call failed: {0}")]
    Client(#[from] pseudonym_core::ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type HelperResult<T> = Result<T, HelperError>;
