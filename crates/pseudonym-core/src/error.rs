use thiserror::Error;

use crate::client::ClientError;
use crate::problem::EHealthProblem;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid pseudonym: {0}")]
    InvalidPseudonym(String),

    #[error("invalid transit info: {0}")]
    InvalidTransitInfo(String),

    /// The transit info names a `kid` that is absent from the domain's
    /// secret-key map. Refreshing the domain may resolve it.
    #[error("unknown kid `{0}`")]
    UnknownKid(String),

    #[error("unsupported curve `{0}`")]
    UnsupportedCurve(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("collection capacity exceeded: at most {0} points per batch")]
    CapacityExceeded(usize),

    #[error("index {index} out of bounds (collection holds {len} points)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("point belongs to domain `{actual}`, expected `{expected}`")]
    DomainMismatch { expected: String, actual: String },

    /// A structured problem reported by the pseudonymisation service for a
    /// single item; batch slots surface these lazily on access.
    #[error("service problem: {0}")]
    Problem(EHealthProblem),

    #[error("no pseudonymisation client attached to the domain")]
    MissingClient,

    #[error("unexpected service response: {0}")]
    UnexpectedResponse(String),

    #[error("pseudonymisation service call failed: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Jose(#[from] pseudonym_jose::JoseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// `UnknownKid` is a refinement of the transit-info failure class.
    pub fn is_transit_info_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTransitInfo(_) | CoreError::UnknownKid(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
