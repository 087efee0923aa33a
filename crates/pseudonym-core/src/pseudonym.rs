//! An opaque pseudonym at rest within one domain.

use p521::Scalar;

use crate::domain::Domain;
use crate::error::CoreResult;
use crate::factory::PseudonymInTransitFactory;
use crate::in_transit::PseudonymInTransit;
use crate::point::Point;
use crate::transit_info::{TransitInfo, TransitInfoCustomizer};
use crate::value::Value;
use pseudonym_jose::b64;

/// A de-identified value, valid within a single domain. Pseudonyms from
/// different domains are never comparable.
#[derive(Clone, PartialEq, Eq)]
pub struct Pseudonym {
    point: Point,
}

impl Pseudonym {
    pub(crate) fn new(point: Point) -> Self {
        Self { point }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn domain(&self) -> &Domain {
        self.point.domain()
    }

    pub fn x(&self) -> String {
        self.point.x()
    }

    pub fn y(&self) -> String {
        self.point.y()
    }

    /// Uncompressed SEC1, Base64URL. Longer, but spares the recipient the
    /// Y-coordinate computation.
    pub fn as_string(&self) -> String {
        b64::encode(self.point.sec1_uncompressed())
    }

    /// Compressed SEC1, Base64URL.
    pub fn as_short_string(&self) -> String {
        b64::encode(self.point.sec1_compressed())
    }

    /// Reinterpret this pseudonym as a packed value on the same point.
    pub fn as_value(&self) -> Value {
        Value::new(self.point.clone())
    }

    /// Blind this pseudonym for transit.
    ///
    /// Draws a random scalar `r`, stores `P · r⁻¹` and embeds `r` in the
    /// encrypted transit info, so that the receiver recovers `P` by a
    /// forward multiplication.
    pub fn in_transit(&self) -> CoreResult<PseudonymInTransit> {
        self.in_transit_with(&TransitInfoCustomizer::default())
    }

    pub fn in_transit_with(
        &self,
        customizer: &TransitInfoCustomizer,
    ) -> CoreResult<PseudonymInTransit> {
        let domain = self.point.domain();
        let random = domain.create_random();
        let blinded = self.point.multiply_by_mod_inverse(&random)?;
        let transit_info = TransitInfo::create(domain, &random, customizer)?;
        Ok(PseudonymInTransit::new(Pseudonym::new(blinded), transit_info))
    }

    /// Convert this pseudonym into a pseudonym in transit of another domain.
    pub async fn convert_to(&self, to_domain: &Domain) -> CoreResult<PseudonymInTransit> {
        let domain = self.point.domain();
        let client = domain.require_client()?;

        let random = domain.create_random();
        let blinded = self.point.multiply(&random)?;
        let payload = domain.request_payload(&blinded, None);

        let response = client
            .convert_to(domain.key(), to_domain.key(), &payload)
            .await?;
        PseudonymInTransitFactory::new(to_domain.clone())
            .from_raw_response(&response, &random)
    }

    pub fn multiply(&self, scalar: &Scalar) -> CoreResult<Pseudonym> {
        Ok(Pseudonym::new(self.point.multiply(scalar)?))
    }

    pub fn multiply_by_mod_inverse(&self, scalar: &Scalar) -> CoreResult<Pseudonym> {
        Ok(Pseudonym::new(self.point.multiply_by_mod_inverse(scalar)?))
    }
}

impl std::fmt::Debug for Pseudonym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.point, f)
    }
}
