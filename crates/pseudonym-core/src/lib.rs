//! # pseudonym-core: client-side elliptic-curve pseudonymisation
//!
//! This crate implements the client side of an eHealth-style
//! pseudonymisation protocol on NIST P-521:
//!
//! - **Values** pack sensitive bytes into the X coordinate of a curve point.
//! - **Pseudonyms** are opaque points, valid within one [`Domain`].
//! - **Pseudonyms in transit** are blinded points (`P · r⁻¹`) together with
//!   a compact-JWE [`TransitInfo`] that carries the blinding scalar `r`
//!   encrypted under a domain secret key.
//! - **Batches** of up to 10 points round-trip through the service with
//!   per-item success/failure slots.
//!
//! The remote service is abstracted behind the async
//! [`PseudonymisationClient`] trait; an HTTP implementation and the domain
//! cache live in the companion `pseudonym-client` crate.
//!
//! ## Example: blind and unblind locally
//!
//! ```rust
//! use pseudonym_core::{ContentEncryption, Domain, SecretKey};
//!
//! # fn main() -> Result<(), pseudonym_core::CoreError> {
//! let domain = Domain::builder("test")
//!     .buffer_size(8)
//!     .audience("https://api.example.org/pseudo/v1/domains/test")
//!     .secret_key("2024-01", SecretKey::new(vec![7u8; 32])?)
//!     .active_kid("2024-01")
//!     .active_encryption(ContentEncryption::A256Gcm)
//!     .in_transit_ttl(chrono::Duration::minutes(10))
//!     .build()?;
//!
//! let value = domain.values().from_string("79021802145")?;
//! let in_transit = value.as_pseudonym().in_transit()?;
//! let at_rest = in_transit.at_rest()?;
//! assert_eq!(at_rest.as_value().as_string()?, "79021802145");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod curve;
pub mod domain;
pub mod error;
pub mod factory;
pub mod in_transit;
pub mod multiple;
pub mod point;
pub mod problem;
pub mod pseudonym;
pub mod transit_info;
pub mod value;

// Re-exports for convenience
pub use client::{ClientError, ClientResult, PseudonymisationClient};
pub use domain::{Domain, DomainBuilder, SecretKey};
pub use error::{CoreError, CoreResult};
pub use factory::{PseudonymFactory, PseudonymInTransitFactory, ValueFactory};
pub use in_transit::PseudonymInTransit;
pub use multiple::{
    MultiplePoint, MultiplePseudonym, MultiplePseudonymInTransit, MultipleValue, MAX_BATCH_SIZE,
};
pub use point::Point;
pub use problem::EHealthProblem;
pub use pseudonym::Pseudonym;
pub use transit_info::{TransitInfo, TransitInfoCustomizer, TransitPayload, CLOCK_SKEW_SECONDS};
pub use value::Value;

pub use p521::Scalar;
pub use pseudonym_jose::ContentEncryption;
