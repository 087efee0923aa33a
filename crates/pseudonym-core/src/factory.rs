//! Per-domain factories for values, pseudonyms and pseudonyms in transit.
//!
//! Obtained from a [`Domain`] (`domain.values()`, `domain.pseudonyms()`,
//! `domain.pseudonyms_in_transit()`); each is a lightweight handle that can
//! be created freely.


use p521::Scalar;
use serde_json::Value as Json;

use crate::curve::{self, Coordinate, FIELD_SIZE};
use crate::domain::Domain;
use crate::error::{CoreError, CoreResult};
use crate::in_transit::PseudonymInTransit;
use crate::multiple::{MultiplePseudonym, MultiplePseudonymInTransit, MultipleValue};
use crate::point::Point;
use crate::problem::EHealthProblem;
use crate::pseudonym::Pseudonym;
use crate::transit_info::TransitInfo;
use crate::value::Value;
use pseudonym_jose::b64;

/// Packing retries are bounded: real payloads land on a valid X within a
/// couple of increments, and an X that can never drop below the field
/// modulus would otherwise loop forever.
const MAX_PACKING_ATTEMPTS: usize = 4096;

pub struct ValueFactory {
    domain: Domain,
}

impl ValueFactory {
    pub(crate) fn new(domain: Domain) -> Self {
        Self { domain }
    }

    /// Largest byte payload this domain can pack.
    pub fn max_value_size(&self) -> usize {
        self.domain.max_value_size()
    }

    /// Pack bytes into a curve point.
    ///
    /// The X candidate is `[0][bytes][len][buffer zeros]`; when it has no
    /// valid Y the candidate is incremented until one exists (the buffer
    /// padding absorbs the increments).
    pub fn from_bytes(&self, value: &[u8]) -> CoreResult<Value> {
        if value.len() > self.max_value_size() {
            return Err(CoreError::InvalidValue(format!(
                "the value is too long: should be max {} bytes",
                self.max_value_size()
            )));
        }

        let mut x: Coordinate = [0u8; FIELD_SIZE];
        let length_pos = FIELD_SIZE - self.domain.buffer_size() - 1;
        x[length_pos - value.len()..length_pos].copy_from_slice(value);
        x[length_pos] = value.len() as u8;

        for _ in 0..MAX_PACKING_ATTEMPTS {
            if let Some(y) = curve::compute_y(&x) {
                return Ok(Value::new(Point::new(x, y, self.domain.clone())));
            }
            curve::increment(&mut x);
        }
        Err(CoreError::InvalidValue(
            "no valid curve point found for this value".into(),
        ))
    }

    /// Pack a UTF-8 string.
    pub fn from_string(&self, value: &str) -> CoreResult<Value> {
        self.from_bytes(value.as_bytes())
    }

    pub fn multiple(&self) -> MultipleValue {
        MultipleValue::new(self.domain.clone())
    }

    pub fn multiple_from(
        &self,
        values: impl IntoIterator<Item = Value>,
    ) -> CoreResult<MultipleValue> {
        let mut multiple = self.multiple();
        for value in values {
            multiple.add(value)?;
        }
        Ok(multiple)
    }
}

pub struct PseudonymFactory {
    domain: Domain,
}

impl PseudonymFactory {
    pub(crate) fn new(domain: Domain) -> Self {
        Self { domain }
    }

    /// Build a pseudonym from its X coordinate alone.
    ///
    /// One of the two Y roots is picked; which one is unspecified, and
    /// irrelevant since only X identifies the pseudonym.
    pub fn from_x(&self, x: &str) -> CoreResult<Pseudonym> {
        let bytes = b64::decode_lenient(x).map_err(|e| {
            CoreError::InvalidPseudonym(format!("the X coordinate is not valid Base64: {e}"))
        })?;
        let x = curve::coordinate_from_be_bytes(&bytes)?;
        let y = curve::compute_y(&x).ok_or_else(|| {
            CoreError::InvalidPseudonym(
                "invalid X coordinate: no Y coordinate can be computed for it".into(),
            )
        })?;
        Ok(Pseudonym::new(Point::new(x, y, self.domain.clone())))
    }

    /// Build a pseudonym from both coordinates.
    ///
    /// No curve-membership check happens here; arithmetic on an off-curve
    /// point fails later with `InvalidPseudonym`.
    pub fn from_xy(&self, x: &str, y: &str) -> CoreResult<Pseudonym> {
        if x.is_empty() || y.is_empty() {
            return Err(CoreError::InvalidPseudonym(
                "the Base64 encoded coordinates cannot be empty".into(),
            ));
        }
        let x = curve::coordinate_from_be_bytes(&b64::decode_lenient(x).map_err(|e| {
            CoreError::InvalidPseudonym(format!("the X coordinate is not valid Base64: {e}"))
        })?)?;
        let y = curve::coordinate_from_be_bytes(&b64::decode_lenient(y).map_err(|e| {
            CoreError::InvalidPseudonym(format!("the Y coordinate is not valid Base64: {e}"))
        })?)?;
        Ok(Pseudonym::new(Point::new(x, y, self.domain.clone())))
    }

    /// Decode a Base64URL SEC1 point (compressed or uncompressed).
    pub fn from_sec1(&self, sec1: &str) -> CoreResult<Pseudonym> {
        if sec1.is_empty() {
            return Err(CoreError::InvalidPseudonym(
                "the SEC1 representation cannot be empty".into(),
            ));
        }
        let bytes = b64::decode_lenient(sec1).map_err(|e| {
            CoreError::InvalidPseudonym(format!("the SEC1 string is not valid Base64: {e}"))
        })?;
        let (x, y) = curve::point_from_sec1(&bytes)?;
        Ok(Pseudonym::new(Point::new(x, y, self.domain.clone())))
    }

    pub fn multiple(&self) -> MultiplePseudonym {
        MultiplePseudonym::new(self.domain.clone())
    }

    pub fn multiple_from(
        &self,
        pseudonyms: impl IntoIterator<Item = Pseudonym>,
    ) -> CoreResult<MultiplePseudonym> {
        let mut multiple = self.multiple();
        for pseudonym in pseudonyms {
            multiple.add(pseudonym)?;
        }
        Ok(multiple)
    }

    /// Rebuild the pseudonym from a service response, reversing our blind.
    ///
    /// The response must carry `x`/`y` (otherwise its problem object is
    /// surfaced) and name this domain.
    pub(crate) fn from_response(
        &self,
        response: &Json,
        scalar: &Scalar,
    ) -> CoreResult<Pseudonym> {
        let (Some(x), Some(y)) = (
            response.get("x").and_then(Json::as_str),
            response.get("y").and_then(Json::as_str),
        ) else {
            return Err(CoreError::Problem(EHealthProblem::from_response(response)));
        };

        let domain_key = response.get("domain").and_then(Json::as_str);
        if domain_key != Some(self.domain.key()) {
            return Err(CoreError::UnexpectedResponse(format!(
                "pseudonym sent by the service is for domain {:?}, expected `{}`",
                domain_key,
                self.domain.key()
            )));
        }

        let blinded = self.from_xy(x, y)?;
        blinded.multiply_by_mod_inverse(scalar)
    }

    pub(crate) fn from_raw_response(
        &self,
        raw_response: &str,
        scalar: &Scalar,
    ) -> CoreResult<Pseudonym> {
        let response: Json = serde_json::from_str(raw_response)
            .map_err(|e| CoreError::UnexpectedResponse(format!("malformed response: {e}")))?;
        self.from_response(&response, scalar)
    }
}

pub struct PseudonymInTransitFactory {
    domain: Domain,
}

impl PseudonymInTransitFactory {
    pub(crate) fn new(domain: Domain) -> Self {
        Self { domain }
    }

    /// Parse `{sec1}:{transitInfo}` as produced by
    /// [`PseudonymInTransit::as_string`]/[`as_short_string`].
    ///
    /// [`PseudonymInTransit::as_string`]: crate::PseudonymInTransit::as_string
    /// [`as_short_string`]: crate::PseudonymInTransit::as_short_string
    pub fn from_sec1_and_transit_info(
        &self,
        sec1_and_transit_info: &str,
    ) -> CoreResult<PseudonymInTransit> {
        let Some((sec1, transit_info)) = sec1_and_transit_info.split_once(':') else {
            return Err(CoreError::InvalidPseudonym(
                "missing `:` in the pseudonym in transit string; the format is \
                 {sec1InBase64Url}:{transitInfoCompact}"
                    .into(),
            ));
        };

        let pseudonym = PseudonymFactory::new(self.domain.clone()).from_sec1(sec1)?;
        let transit_info = TransitInfo::from_raw(self.domain.clone(), transit_info);
        Ok(PseudonymInTransit::new(pseudonym, transit_info))
    }

    pub fn from_xy_and_transit_info(
        &self,
        x: &str,
        y: &str,
        transit_info: &str,
    ) -> CoreResult<PseudonymInTransit> {
        let pseudonym = PseudonymFactory::new(self.domain.clone()).from_xy(x, y)?;
        let transit_info = TransitInfo::from_raw(self.domain.clone(), transit_info);
        Ok(PseudonymInTransit::new(pseudonym, transit_info))
    }

    pub fn multiple(&self) -> MultiplePseudonymInTransit {
        MultiplePseudonymInTransit::new(self.domain.clone())
    }

    pub fn multiple_from(
        &self,
        pseudonyms_in_transit: impl IntoIterator<Item = PseudonymInTransit>,
    ) -> CoreResult<MultiplePseudonymInTransit> {
        let mut multiple = self.multiple();
        for pseudonym_in_transit in pseudonyms_in_transit {
            multiple.add(pseudonym_in_transit)?;
        }
        Ok(multiple)
    }

    /// Rebuild a pseudonym in transit from a service response.
    ///
    /// The response must carry a `transitInfo`; otherwise its problem object
    /// is surfaced. The blinded coordinates are unblinded with our scalar,
    /// the transit info is kept verbatim.
    pub(crate) fn from_response(
        &self,
        response: &Json,
        scalar: &Scalar,
    ) -> CoreResult<PseudonymInTransit> {
        let Some(transit_info) = response.get("transitInfo").and_then(Json::as_str) else {
            return Err(CoreError::Problem(EHealthProblem::from_response(response)));
        };

        let pseudonym =
            PseudonymFactory::new(self.domain.clone()).from_response(response, scalar)?;
        let transit_info = TransitInfo::from_raw(self.domain.clone(), transit_info);
        Ok(PseudonymInTransit::new(pseudonym, transit_info))
    }

    pub(crate) fn from_raw_response(
        &self,
        raw_response: &str,
        scalar: &Scalar,
    ) -> CoreResult<PseudonymInTransit> {
        let response: Json = serde_json::from_str(raw_response)
            .map_err(|e| CoreError::UnexpectedResponse(format!("malformed response: {e}")))?;
        self.from_response(&response, scalar)
    }
}
