//! Base64 helpers.
//!
//! JWE segments are Base64URL without padding. Material coming back from the
//! service and from keystores is less disciplined (padded, standard alphabet,
//! or both), so a lenient decoder is provided alongside the strict one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine};

use crate::error::JoseResult;

/// Standard-alphabet engine that tolerates both padded and unpadded input.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode as Base64URL without padding (JWE segment form).
pub fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Strict Base64URL-without-padding decode (JWE segment form).
pub fn decode(s: &str) -> JoseResult<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

/// Decode accepting either alphabet, with or without padding.
pub fn decode_lenient(s: &str) -> JoseResult<Vec<u8>> {
    let normalized: String = s
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    Ok(STANDARD_LENIENT.decode(normalized.trim_end_matches('='))?)
}
