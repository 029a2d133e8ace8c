//! Thin wrapper around the `secp256k1` curve backend.
//!
//! The rest of the crate only ever calls through these six functions; no
//! other curve operation is needed. Swapping in a different secp256k1
//! implementation means reimplementing this module alone.

use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, SignOnly, VerifyOnly};
use std::sync::LazyLock;

static SIGNING: LazyLock<Secp256k1<SignOnly>> = LazyLock::new(Secp256k1::signing_only);
static VERIFYING: LazyLock<Secp256k1<VerifyOnly>> = LazyLock::new(Secp256k1::verification_only);

/// The curve backend rejected a scalar or point.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid secp256k1 scalar or point")]
pub struct Invalid;

impl From<secp256k1::Error> for Invalid {
    fn from(_: secp256k1::Error) -> Self {
        Invalid
    }
}

/// Parse 32 bytes as a private scalar in `[1, n-1]`.
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<SecretKey, Invalid> {
    Ok(SecretKey::from_slice(bytes)?)
}

/// `scalar + tweak mod n`, rejecting a zero or out-of-range result.
pub fn scalar_tweak_add(scalar: SecretKey, tweak: &[u8; 32]) -> Result<SecretKey, Invalid> {
    let tweak = Scalar::from_be_bytes(*tweak).map_err(|_| Invalid)?;
    Ok(scalar.add_tweak(&tweak)?)
}

/// Parse a 33-byte SEC1 compressed point.
pub fn point_from_compressed(bytes: &[u8; 33]) -> Result<PublicKey, Invalid> {
    Ok(PublicKey::from_slice(bytes)?)
}

/// `point + tweak * G`, rejecting an out-of-range tweak or identity result.
pub fn point_tweak_add(point: PublicKey, tweak: &[u8; 32]) -> Result<PublicKey, Invalid> {
    let tweak = Scalar::from_be_bytes(*tweak).map_err(|_| Invalid)?;
    Ok(point.add_exp_tweak(&VERIFYING, &tweak)?)
}

/// `scalar * G`.
pub fn derive_pubkey(scalar: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(&SIGNING, scalar)
}

/// SEC1 compressed encoding of a point.
pub fn compressed_encode(point: &PublicKey, out: &mut [u8; 33]) {
    *out = point.serialize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_scalar() {
        assert!(scalar_from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn derive_pubkey_then_encode_roundtrips_through_parse() {
        let scalar = scalar_from_bytes(&[7u8; 32]).unwrap();
        let point = derive_pubkey(&scalar);
        let mut bytes = [0u8; 33];
        compressed_encode(&point, &mut bytes);
        let parsed = point_from_compressed(&bytes).unwrap();
        assert_eq!(point, parsed);
    }

    #[test]
    fn tweak_add_matches_rederiving_from_tweaked_scalar() {
        let scalar = scalar_from_bytes(&[3u8; 32]).unwrap();
        let tweak = [9u8; 32];
        let tweaked_scalar = scalar_tweak_add(scalar, &tweak).unwrap();
        let expected_point = derive_pubkey(&tweaked_scalar);

        let point = derive_pubkey(&scalar_from_bytes(&[3u8; 32]).unwrap());
        let tweaked_point = point_tweak_add(point, &tweak).unwrap();
        assert_eq!(tweaked_point, expected_point);
    }
}
