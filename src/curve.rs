// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Secp256k1 arithmetic used throughout the crate.
//!
//! Field elements are bare [`k256::Scalar`]s; curve points are wrapped in
//! [`CurvePoint`] so that the crate controls their byte encoding (fixed
//! 33-byte compressed SEC1, with the identity point as 33 zero bytes).

use crate::{
    codec::{self, Codec},
    errors::{Error, Result},
};
use bytes::{Buf, BufMut};
use k256::elliptic_curve::{
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Group,
};
use rand::{CryptoRng, RngCore};
use std::ops::Add;

/// A scalar of the secp256k1 prime-order group; the field element type of
/// every share, decommitment, and player index in this crate.
pub type Scalar = k256::Scalar;

/// Encoded width of a [`Scalar`]: 32 bytes, big-endian, canonical.
pub(crate) const SCALAR_BYTES: usize = 32;

/// Encoded width of a [`CurvePoint`]: compressed SEC1.
pub(crate) const POINT_BYTES: usize = 33;

/// A point on the secp256k1 curve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CurvePoint(k256::ProjectivePoint);

impl CurvePoint {
    /// The group generator `g`.
    pub const GENERATOR: Self = CurvePoint(k256::ProjectivePoint::GENERATOR);

    /// The identity point.
    pub const IDENTITY: Self = CurvePoint(k256::ProjectivePoint::IDENTITY);

    /// A uniformly random curve point.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        CurvePoint(k256::ProjectivePoint::random(rng))
    }

    /// `g * scalar`.
    pub fn base_mul(scalar: &Scalar) -> Self {
        CurvePoint(k256::ProjectivePoint::GENERATOR * scalar)
    }

    /// `self * scalar`.
    pub fn mul(&self, scalar: &Scalar) -> Self {
        CurvePoint(self.0 * scalar)
    }

    /// Whether this is the identity point.
    pub fn is_identity(&self) -> bool {
        self.0.is_identity().into()
    }
}

impl Add for CurvePoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        CurvePoint(self.0 + rhs.0)
    }
}

impl Codec for Scalar {
    fn size_hint(&self) -> usize {
        SCALAR_BYTES
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.to_bytes());
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        use k256::elliptic_curve::PrimeField;

        codec::ensure_remaining(buf, SCALAR_BYTES)?;
        let mut bytes = [0u8; SCALAR_BYTES];
        buf.copy_to_slice(&mut bytes);
        Option::from(Scalar::from_repr(bytes.into())).ok_or(Error::InvalidScalar)
    }
}

impl Codec for CurvePoint {
    fn size_hint(&self) -> usize {
        POINT_BYTES
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        // SEC1 gives the identity a one-byte encoding; pad it to the fixed
        // width so every point occupies the same space.
        if self.is_identity() {
            buf.put_bytes(0, POINT_BYTES);
        } else {
            let encoded = self.0.to_affine().to_encoded_point(true);
            buf.put_slice(encoded.as_bytes());
        }
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        codec::ensure_remaining(buf, POINT_BYTES)?;
        let mut bytes = [0u8; POINT_BYTES];
        buf.copy_to_slice(&mut bytes);
        if bytes == [0u8; POINT_BYTES] {
            return Ok(Self::IDENTITY);
        }
        let encoded = k256::EncodedPoint::from_bytes(bytes).map_err(|_| Error::InvalidPoint)?;
        Option::from(k256::AffinePoint::from_encoded_point(&encoded))
            .map(|affine: k256::AffinePoint| CurvePoint(affine.into()))
            .ok_or(Error::InvalidPoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::init_testing;
    use k256::elliptic_curve::Field;

    #[test]
    fn curve_point_byte_conversion_works() {
        let rng = &mut init_testing();
        let point = CurvePoint::random(rng);
        let reconstructed = CurvePoint::decode(&point.encode()).unwrap();
        assert_eq!(point, reconstructed);
    }

    #[test]
    fn identity_has_fixed_width_encoding() {
        let bytes = CurvePoint::IDENTITY.encode();
        assert_eq!(bytes, vec![0u8; POINT_BYTES]);
        assert_eq!(CurvePoint::decode(&bytes).unwrap(), CurvePoint::IDENTITY);
    }

    #[test]
    fn scalar_byte_conversion_works() {
        let rng = &mut init_testing();
        let scalar = Scalar::random(rng);
        assert_eq!(Scalar::decode(&scalar.encode()).unwrap(), scalar);
    }

    #[test]
    fn non_canonical_scalar_is_rejected() {
        // The all-ones encoding is larger than the group order.
        let bytes = [0xffu8; SCALAR_BYTES];
        assert!(matches!(Scalar::decode(&bytes), Err(Error::InvalidScalar)));
    }
}
