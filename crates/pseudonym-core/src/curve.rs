//! P-521 coordinate and scalar plumbing.
//!
//! The pseudonymisation service works exclusively on NIST P-521. Coordinates
//! travel as fixed-width 66-byte big-endian field elements; scalars use the
//! minimal signed big-endian form Java/C# `BigInteger` producers emit, so
//! transit infos created by other implementations of the protocol decode
//! here unchanged.

use elliptic_curve::group::Curve as _;
use elliptic_curve::point::DecompressPoint;
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use elliptic_curve::{Field, PrimeField};
use p521::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use rand_core::OsRng;
use subtle::Choice;

use crate::error::{CoreError, CoreResult};

/// Serialized size of a P-521 field element.
pub const FIELD_SIZE: usize = 66;

/// The only curve the service supports.
pub const CURVE_NAME: &str = "P-521";

/// A big-endian affine coordinate.
pub type Coordinate = [u8; FIELD_SIZE];

/// Widen a big-endian integer into a fixed-width coordinate.
///
/// Leading zero bytes (including the sign byte `BigInteger` writers prepend)
/// are stripped before padding.
pub fn coordinate_from_be_bytes(bytes: &[u8]) -> CoreResult<Coordinate> {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > FIELD_SIZE {
        return Err(CoreError::InvalidPseudonym(format!(
            "coordinate of {} bytes exceeds the {FIELD_SIZE}-byte field",
            trimmed.len()
        )));
    }

    let mut out = [0u8; FIELD_SIZE];
    out[FIELD_SIZE - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

/// Solve `y² = x³ + ax + b` for the given X.
///
/// Returns one of the two roots (the caller must not care which: only X
/// carries information in this protocol), or `None` when the right-hand side
/// is not a quadratic residue or X is not a canonical field element.
pub fn compute_y(x: &Coordinate) -> Option<Coordinate> {
    let field_bytes = FieldBytes::clone_from_slice(x);
    let point: Option<AffinePoint> =
        AffinePoint::decompress(&field_bytes, Choice::from(0)).into();
    let encoded = point?.to_encoded_point(false);
    let mut y = [0u8; FIELD_SIZE];
    y.copy_from_slice(encoded.y()?);
    Some(y)
}

/// Build a curve point from affine coordinates, enforcing curve membership.
pub(crate) fn point_from_affine(x: &Coordinate, y: &Coordinate) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_affine_coordinates(
        &FieldBytes::clone_from_slice(x),
        &FieldBytes::clone_from_slice(y),
        false,
    );
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .map(ProjectivePoint::from)
}

/// Decode a SEC1 point (compressed or uncompressed), validated on-curve.
pub(crate) fn point_from_sec1(bytes: &[u8]) -> CoreResult<(Coordinate, Coordinate)> {
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| CoreError::InvalidPseudonym(format!("invalid SEC1 encoding: {e}")))?;
    let point = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| {
            CoreError::InvalidPseudonym("SEC1 bytes do not encode a point on the curve".into())
        })?;
    affine_coordinates(&ProjectivePoint::from(point))
}

/// Affine coordinates of a (non-identity) point.
pub(crate) fn affine_coordinates(
    point: &ProjectivePoint,
) -> CoreResult<(Coordinate, Coordinate)> {
    let encoded = point.to_affine().to_encoded_point(false);
    let (Some(x), Some(y)) = (encoded.x(), encoded.y()) else {
        return Err(CoreError::InvalidPseudonym(
            "operation produced the point at infinity".into(),
        ));
    };
    let mut xc = [0u8; FIELD_SIZE];
    let mut yc = [0u8; FIELD_SIZE];
    xc.copy_from_slice(x);
    yc.copy_from_slice(y);
    Ok((xc, yc))
}

/// Draw a uniformly random scalar, excluding 0 and the curve order.
///
/// 0 would make blinding a no-op; the order maps every point to infinity.
/// Both are outside the non-zero residue class `NonZeroScalar` samples from.
pub fn random_scalar() -> Scalar {
    *p521::NonZeroScalar::random(&mut OsRng)
}

/// Parse a big-endian (optionally sign-prefixed) scalar, rejecting values
/// outside `[0, order)`.
pub fn scalar_from_be_bytes(bytes: &[u8]) -> CoreResult<Scalar> {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > FIELD_SIZE {
        return Err(CoreError::InvalidTransitInfo(format!(
            "scalar of {} bytes exceeds the {FIELD_SIZE}-byte field",
            trimmed.len()
        )));
    }

    let mut repr = FieldBytes::default();
    repr[FIELD_SIZE - trimmed.len()..].copy_from_slice(trimmed);
    Option::<Scalar>::from(Scalar::from_repr(repr))
        .ok_or_else(|| CoreError::InvalidTransitInfo("scalar is not below the curve order".into()))
}

/// Minimal signed big-endian scalar encoding (`BigInteger.toByteArray` form).
pub fn scalar_to_be_bytes(scalar: &Scalar) -> Vec<u8> {
    let repr = scalar.to_repr();
    let mut bytes: &[u8] = repr.as_slice();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes = &bytes[1..];
    }
    if bytes[0] & 0x80 != 0 {
        let mut signed = Vec::with_capacity(bytes.len() + 1);
        signed.push(0);
        signed.extend_from_slice(bytes);
        signed
    } else {
        bytes.to_vec()
    }
}

/// Modular inverse over the curve order.
pub(crate) fn invert_scalar(scalar: &Scalar) -> CoreResult<Scalar> {
    Option::<Scalar>::from(scalar.invert())
        .ok_or_else(|| CoreError::InvalidTransitInfo("scalar has no modular inverse".into()))
}

/// Increment a big-endian coordinate by one, wrapping at 2^528.
pub(crate) fn increment(x: &mut Coordinate) {
    for byte in x.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_carries() {
        let mut x = [0u8; FIELD_SIZE];
        x[FIELD_SIZE - 1] = 0xff;
        x[FIELD_SIZE - 2] = 0x01;
        increment(&mut x);
        assert_eq!(x[FIELD_SIZE - 1], 0x00);
        assert_eq!(x[FIELD_SIZE - 2], 0x02);
    }

    #[test]
    fn scalar_bytes_roundtrip() {
        let scalar = random_scalar();
        let bytes = scalar_to_be_bytes(&scalar);
        assert_eq!(scalar_from_be_bytes(&bytes).unwrap(), scalar);
    }

    #[test]
    fn scalar_encoding_carries_sign_byte() {
        // 0x80 would read as negative in signed form without the 0x00 prefix.
        let scalar = scalar_from_be_bytes(&[0x80]).unwrap();
        assert_eq!(scalar_to_be_bytes(&scalar), vec![0x00, 0x80]);
    }

    #[test]
    fn scalar_above_order_is_rejected() {
        let too_big = [0xffu8; FIELD_SIZE];
        assert!(scalar_from_be_bytes(&too_big).is_err());
    }

    #[test]
    fn computed_y_lies_on_the_curve() {
        // The generator's X must have a solvable Y.
        let gen = ProjectivePoint::GENERATOR;
        let (x, _) = affine_coordinates(&gen).unwrap();
        let y = compute_y(&x).expect("generator X has a Y");
        assert!(point_from_affine(&x, &y).is_some());
    }

    #[test]
    fn random_scalars_are_invertible() {
        let scalar = random_scalar();
        let inverse = invert_scalar(&scalar).unwrap();
        assert_eq!(scalar * inverse, Scalar::ONE);
    }
}
