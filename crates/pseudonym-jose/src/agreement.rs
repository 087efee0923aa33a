//! ECDH-ES key agreement for CEK derivation.
//!
//! The recipient's static private key is combined with the sender's
//! ephemeral public key (`epk` header parameter); the shared X coordinate is
//! then run through HKDF-SHA256 to produce the 256-bit content-encryption
//! key.

use elliptic_curve::generic_array::typenum::Unsigned;
use elliptic_curve::sec1::{EncodedPoint, FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{CurveArithmetic, FieldBytes, PublicKey, SecretKey};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::b64;
use crate::error::{JoseError, JoseResult};
use crate::jwk::Jwk;

const KDF_INFO: &[u8] = b"ECDH-ES Key Agreement";

/// Derive the 32-byte CEK from a private EC JWK and the ephemeral public key.
pub fn derive_cek(private_jwk: &Jwk, epk: &Jwk) -> JoseResult<[u8; 32]> {
    let crv = private_jwk
        .crv
        .as_deref()
        .ok_or_else(|| JoseError::InvalidKey("EC private JWK has no `crv`".into()))?;
    if epk.crv.as_deref() != Some(crv) {
        return Err(JoseError::InvalidKey(format!(
            "epk curve {:?} does not match private key curve `{crv}`",
            epk.crv
        )));
    }

    let d = b64::decode_lenient(
        private_jwk
            .d
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("EC private JWK has no `d`".into()))?,
    )?;
    let x = b64::decode_lenient(
        epk.x
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("epk has no `x`".into()))?,
    )?;
    let y = b64::decode_lenient(
        epk.y
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("epk has no `y`".into()))?,
    )?;

    let shared = match crv {
        "P-256" => shared_secret::<p256::NistP256>(&d, &x, &y)?,
        "P-384" => shared_secret::<p384::NistP384>(&d, &x, &y)?,
        "P-521" => shared_secret::<p521::NistP521>(&d, &x, &y)?,
        other => return Err(JoseError::UnsupportedAlgorithm(format!("curve {other}"))),
    };

    let hk = Hkdf::<Sha256>::new(None, &shared);
    let mut cek = [0u8; 32];
    hk.expand(KDF_INFO, &mut cek)
        .map_err(|e| JoseError::Decryption(e.to_string()))?;
    Ok(cek)
}

fn shared_secret<C>(d: &[u8], x: &[u8], y: &[u8]) -> JoseResult<Vec<u8>>
where
    C: CurveArithmetic,
    C::FieldBytesSize: ModulusSize,
    C::AffinePoint: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    let secret = SecretKey::<C>::from_bytes(&field_bytes::<C>(d)?)
        .map_err(|_| JoseError::InvalidKey("EC private scalar out of range".into()))?;

    let point = EncodedPoint::<C>::from_affine_coordinates(
        &field_bytes::<C>(x)?,
        &field_bytes::<C>(y)?,
        false,
    );
    let public = Option::<PublicKey<C>>::from(PublicKey::<C>::from_encoded_point(&point))
        .ok_or_else(|| JoseError::InvalidKey("epk is not a point on the curve".into()))?;

    let shared = elliptic_curve::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    Ok(shared.raw_secret_bytes().to_vec())
}

/// Left-pad a big-endian integer into the curve's fixed-width field encoding.
fn field_bytes<C: elliptic_curve::Curve>(bytes: &[u8]) -> JoseResult<FieldBytes<C>> {
    let size = C::FieldBytesSize::USIZE;
    let trimmed: &[u8] = {
        let mut b = bytes;
        while b.len() > size && b[0] == 0 {
            b = &b[1..];
        }
        b
    };
    if trimmed.len() > size {
        return Err(JoseError::InvalidKey(format!(
            "field element of {} bytes exceeds the curve's {size}-byte field",
            trimmed.len()
        )));
    }

    let mut out = FieldBytes::<C>::default();
    out[size - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}
