//! # pseudonym-client: domain orchestration and HTTP transport
//!
//! The [`PseudonymisationHelper`] is the entry point of the client stack: it
//! fetches and caches domain descriptors, unwraps the domain secret keys
//! distributed as multi-recipient JWEs (resolving public keys through a
//! JWKS, private keys through a caller-supplied lookup), and hands out
//! ready-to-use [`pseudonym_core::Domain`]s.
//!
//! [`HttpPseudonymisationClient`] is a reqwest implementation of the
//! [`pseudonym_core::PseudonymisationClient`] trait against the
//! `/pseudo/v1` REST surface.

pub mod error;
pub mod helper;
pub mod http;

pub use error::{HelperError, HelperResult};
pub use helper::{JwksSupplier, PseudonymisationHelper, PseudonymisationHelperBuilder};
pub use http::HttpPseudonymisationClient;
