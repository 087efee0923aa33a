//! The shared point core under Value / Pseudonym / PseudonymInTransit.
//!
//! Coordinates are kept as raw 66-byte field elements, not as curve points:
//! `from_xy` historically accepts coordinates without curve validation, so
//! membership is only enforced when arithmetic actually needs it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p521::{ProjectivePoint, Scalar};

use crate::curve::{self, Coordinate};
use crate::domain::Domain;
use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct Point {
    x: Coordinate,
    y: Coordinate,
    domain: Domain,
}

impl Point {
    pub(crate) fn new(x: Coordinate, y: Coordinate, domain: Domain) -> Self {
        Self { x, y, domain }
    }

    /// X coordinate, standard Base64 of the 66-byte field element.
    pub fn x(&self) -> String {
        STANDARD.encode(self.x)
    }

    /// Y coordinate, standard Base64 of the 66-byte field element.
    pub fn y(&self) -> String {
        STANDARD.encode(self.y)
    }

    pub(crate) fn x_bytes(&self) -> &Coordinate {
        &self.x
    }

    pub(crate) fn y_bytes(&self) -> &Coordinate {
        &self.y
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// SEC1 uncompressed encoding: `0x04 ‖ X ‖ Y`.
    pub(crate) fn sec1_uncompressed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 2 * self.x.len());
        out.push(0x04);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&self.y);
        out
    }

    /// SEC1 compressed encoding: `0x02/0x03 ‖ X`, tag by Y parity.
    pub(crate) fn sec1_compressed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.x.len());
        out.push(if self.y[self.y.len() - 1] & 1 == 0 {
            0x02
        } else {
            0x03
        });
        out.extend_from_slice(&self.x);
        out
    }

    /// Scalar multiplication; the result is normalized to affine form.
    pub fn multiply(&self, scalar: &Scalar) -> CoreResult<Point> {
        let product = self.to_projective()? * scalar;
        let (x, y) = curve::affine_coordinates(&product)?;
        Ok(Point::new(x, y, self.domain.clone()))
    }

    /// Multiply by `scalar⁻¹ mod order` — the unblinding direction.
    pub fn multiply_by_mod_inverse(&self, scalar: &Scalar) -> CoreResult<Point> {
        self.multiply(&curve::invert_scalar(scalar)?)
    }

    fn to_projective(&self) -> CoreResult<ProjectivePoint> {
        curve::point_from_affine(&self.x, &self.y).ok_or_else(|| {
            CoreError::InvalidPseudonym("coordinates do not lie on the curve".into())
        })
    }
}

/// Equality is domain-scoped and compares X only: the two Y roots encode the
/// same pseudonym.
impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.domain.key() == other.domain.key() && self.x == other.x
    }
}

impl Eq for Point {}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{\"x\": \"{}\", \"y\": \"{}\", \"domain\": \"{}\"}}",
            self.x(),
            self.y(),
            self.domain.key()
        )
    }
}
