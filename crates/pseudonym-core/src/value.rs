//! A plaintext value packed into an EC point.

use crate::curve::FIELD_SIZE;
use crate::error::{CoreError, CoreResult};
use crate::factory::PseudonymInTransitFactory;
use crate::in_transit::PseudonymInTransit;
use crate::point::Point;
use crate::pseudonym::Pseudonym;

/// A value whose bytes are packed into the X coordinate as
/// `[0][raw bytes][length][buffer padding]`.
#[derive(Clone, PartialEq, Eq)]
pub struct Value {
    point: Point,
}

impl Value {
    pub(crate) fn new(point: Point) -> Self {
        Self { point }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn x(&self) -> String {
        self.point.x()
    }

    pub fn y(&self) -> String {
        self.point.y()
    }

    /// Reinterpret this value as an opaque pseudonym on the same point.
    pub fn as_pseudonym(&self) -> Pseudonym {
        Pseudonym::new(self.point.clone())
    }

    /// Unpack the original bytes — the exact inverse of `ValueFactory::from`.
    pub fn as_bytes(&self) -> CoreResult<Vec<u8>> {
        let x = self.point.x_bytes();
        let length_pos = FIELD_SIZE - self.point.domain().buffer_size() - 1;
        let length = x[length_pos] as usize;
        if length > length_pos {
            return Err(CoreError::InvalidValue(format!(
                "length byte {length} exceeds the available {length_pos} bytes"
            )));
        }
        Ok(x[length_pos - length..length_pos].to_vec())
    }

    /// Unpack as UTF-8 text.
    pub fn as_string(&self) -> CoreResult<String> {
        String::from_utf8(self.as_bytes()?)
            .map_err(|e| CoreError::InvalidValue(format!("value is not valid UTF-8: {e}")))
    }

    /// Pseudonymize this value through the remote service.
    ///
    /// The value is blinded with a fresh random scalar before it leaves the
    /// process; the service response is authoritative and only this blind is
    /// reversed locally. The returned pseudonym in transit carries the
    /// service-issued transit info.
    pub async fn pseudonymize(&self) -> CoreResult<PseudonymInTransit> {
        let domain = self.point.domain();
        let client = domain.require_client()?;

        let random = domain.create_random();
        let blinded = self.point.multiply(&random)?;
        let payload = domain.request_payload(&blinded, None);

        let response = client.pseudonymize(domain.key(), &payload).await?;
        PseudonymInTransitFactory::new(domain.clone()).from_raw_response(&response, &random)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.point, f)
    }
}
