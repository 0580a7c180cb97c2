// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Pedersen verifiable secret sharing over secp256k1.
//!
//! A secret `s` is shared by sampling a degree `k-1` value polynomial `f`
//! with `f(0) = s` and an independent random decommitment polynomial `t` of
//! the same degree. The commitment publishes `g*f_m + h*t_m` for every
//! coefficient pair, which lets any holder of the share `(x, f(x))` and its
//! decommitment `t(x)` prove consistency without revealing the polynomials:
//!
//! `g*value + h*decommitment == sum_m index^m * C[m]`
//!
//! Because the commitment is additively homomorphic, shares and commitments
//! of independent sharings can be summed pointwise, which is what the random
//! number generation protocol exploits.

use crate::{
    codec::Codec,
    curve::{CurvePoint, Scalar, POINT_BYTES, SCALAR_BYTES},
    errors::Result,
};
use bytes::{Buf, BufMut};
use k256::elliptic_curve::Field;
use rand::{CryptoRng, RngCore};

/// An evaluation of a sharing polynomial: the pair `(index, value)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Share {
    index: Scalar,
    value: Scalar,
}

impl Share {
    /// Construct a share from its index and value.
    pub fn new(index: Scalar, value: Scalar) -> Self {
        Self { index, value }
    }

    /// The evaluation point of this share.
    pub fn index(&self) -> &Scalar {
        &self.index
    }

    /// The evaluation value of this share.
    pub fn value(&self) -> &Scalar {
        &self.value
    }

    /// The pointwise sum of two shares of distinct sharings.
    ///
    /// Only meaningful when both shares have the same index; the index of
    /// `self` is kept.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            index: self.index,
            value: self.value + other.value,
        }
    }
}

/// A share along with the decommitment that proves it against a Pedersen
/// commitment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerifiableShare {
    share: Share,
    decommitment: Scalar,
}

/// A batch of verifiable shares.
pub type VerifiableShares = Vec<VerifiableShare>;

impl VerifiableShare {
    /// Construct a verifiable share from a share and its decommitment.
    pub fn new(share: Share, decommitment: Scalar) -> Self {
        Self {
            share,
            decommitment,
        }
    }

    /// The underlying share.
    pub fn share(&self) -> &Share {
        &self.share
    }

    /// The evaluation point of the underlying share.
    pub fn index(&self) -> &Scalar {
        &self.share.index
    }

    /// The decommitment for the underlying share.
    pub fn decommitment(&self) -> &Scalar {
        &self.decommitment
    }

    /// The pointwise sum of two verifiable shares of distinct sharings.
    ///
    /// Only meaningful when both shares have the same index.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            share: self.share.add(&other.share),
            decommitment: self.decommitment + other.decommitment,
        }
    }
}

/// A Pedersen commitment to a sharing polynomial: one curve point per
/// coefficient, constant term first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Commitment {
    points: Vec<CurvePoint>,
}

impl Commitment {
    /// An empty commitment with room for `k` coefficient points.
    pub fn with_capacity(k: usize) -> Self {
        Self {
            points: Vec::with_capacity(k),
        }
    }

    /// Append the commitment point for the next coefficient.
    pub fn append(&mut self, point: CurvePoint) {
        self.points.push(point);
    }

    /// The number of committed coefficients.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no coefficients have been committed.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The commitment point for coefficient `i`.
    ///
    /// # Panics
    /// If `i >= self.len()`.
    pub fn point(&self, i: usize) -> &CurvePoint {
        &self.points[i]
    }

    /// The pointwise sum of two commitments; commits to the sum of the two
    /// underlying sharings. A missing coefficient counts as identity.
    pub fn add(&self, other: &Self) -> Self {
        let len = self.len().max(other.len());
        let mut points = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.points.get(i).copied().unwrap_or(CurvePoint::IDENTITY);
            let b = other.points.get(i).copied().unwrap_or(CurvePoint::IDENTITY);
            points.push(a + b);
        }
        Self { points }
    }

    /// Every coefficient point multiplied by `scalar`; commits to the
    /// underlying sharing scaled by `scalar`.
    pub fn mul(&self, scalar: &Scalar) -> Self {
        Self {
            points: self.points.iter().map(|p| p.mul(scalar)).collect(),
        }
    }
}

/// Produce a Pedersen verifiable sharing of `secret` with reconstruction
/// threshold `k`, one share per entry of `indices`.
pub fn share_secret<R: RngCore + CryptoRng>(
    rng: &mut R,
    indices: &[Scalar],
    h: &CurvePoint,
    secret: Scalar,
    k: usize,
) -> (VerifiableShares, Commitment) {
    let mut values = Vec::with_capacity(k);
    values.push(secret);
    values.extend(std::iter::repeat_with(|| Scalar::random(&mut *rng)).take(k - 1));
    let decommitments: Vec<Scalar> = std::iter::repeat_with(|| Scalar::random(&mut *rng))
        .take(k)
        .collect();

    let mut commitment = Commitment::with_capacity(k);
    for (value, decommitment) in values.iter().zip(&decommitments) {
        commitment.append(CurvePoint::base_mul(value) + h.mul(decommitment));
    }

    let shares = indices
        .iter()
        .map(|index| {
            VerifiableShare::new(
                Share::new(*index, eval(&values, index)),
                eval(&decommitments, index),
            )
        })
        .collect();

    (shares, commitment)
}

/// The Pedersen check: `g*value + h*decommitment` must equal the commitment
/// polynomial evaluated (in the exponent) at the share index.
pub fn share_is_valid(h: &CurvePoint, commitment: &Commitment, vshare: &VerifiableShare) -> bool {
    if commitment.is_empty() {
        return false;
    }
    let expected = commitment
        .points
        .iter()
        .rev()
        .fold(CurvePoint::IDENTITY, |acc, point| {
            acc.mul(vshare.index()) + *point
        });
    CurvePoint::base_mul(vshare.share().value()) + h.mul(vshare.decommitment()) == expected
}

/// The Lagrange basis evaluated at zero for the given pairwise-distinct
/// evaluation points, in order.
pub fn lagrange_coefficients_at_zero(indices: &[Scalar]) -> Vec<Scalar> {
    indices
        .iter()
        .map(|own| {
            let mut result = Scalar::ONE;
            for other in indices {
                if other != own {
                    let numerator = Scalar::ZERO - other;
                    let denominator = own - other;
                    result *= numerator * denominator.invert().unwrap();
                }
            }
            result
        })
        .collect()
}

/// Reconstruct the constant term of the sharing polynomial from shares at
/// pairwise-distinct indices. The caller supplies at least `k` shares of a
/// threshold `k` sharing.
pub fn open(shares: &[Share]) -> Scalar {
    let indices: Vec<Scalar> = shares.iter().map(|share| *share.index()).collect();
    let coefficients = lagrange_coefficients_at_zero(&indices);
    shares
        .iter()
        .zip(&coefficients)
        .fold(Scalar::ZERO, |acc, (share, coefficient)| {
            acc + share.value() * coefficient
        })
}

/// Horner evaluation of a polynomial given in coefficient order, constant
/// term first.
pub(crate) fn eval(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coefficient| acc * x + coefficient)
}

impl Codec for Share {
    fn size_hint(&self) -> usize {
        2 * SCALAR_BYTES
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.index.write(buf);
        self.value.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let index = Scalar::read(buf)?;
        let value = Scalar::read(buf)?;
        Ok(Self { index, value })
    }
}

impl Codec for VerifiableShare {
    fn size_hint(&self) -> usize {
        3 * SCALAR_BYTES
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.share.write(buf);
        self.decommitment.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let share = Share::read(buf)?;
        let decommitment = Scalar::read(buf)?;
        Ok(Self {
            share,
            decommitment,
        })
    }
}

impl Codec for Commitment {
    fn size_hint(&self) -> usize {
        4 + POINT_BYTES * self.points.len()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.points.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            points: Vec::read(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_testing, sequential_indices};

    #[test]
    fn shares_verify_against_their_commitment() {
        let rng = &mut init_testing();
        let indices = sequential_indices(12);
        let h = CurvePoint::random(rng);
        let secret = Scalar::random(&mut *rng);

        let (shares, commitment) = share_secret(rng, &indices, &h, secret, 5);
        assert_eq!(shares.len(), 12);
        assert_eq!(commitment.len(), 5);
        for share in &shares {
            assert!(share_is_valid(&h, &commitment, share));
        }
    }

    #[test]
    fn tampered_shares_fail_the_check() {
        let rng = &mut init_testing();
        let indices = sequential_indices(8);
        let h = CurvePoint::random(rng);

        let secret = Scalar::random(&mut *rng);
        let (shares, commitment) = share_secret(rng, &indices, &h, secret, 4);

        let bad_value = VerifiableShare::new(
            Share::new(*shares[0].index(), shares[0].share().value() + Scalar::ONE),
            *shares[0].decommitment(),
        );
        assert!(!share_is_valid(&h, &commitment, &bad_value));

        let bad_decommitment = VerifiableShare::new(
            *shares[1].share(),
            shares[1].decommitment() + Scalar::ONE,
        );
        assert!(!share_is_valid(&h, &commitment, &bad_decommitment));
    }

    #[test]
    fn any_k_shares_reconstruct_the_secret() {
        let rng = &mut init_testing();
        let indices = sequential_indices(9);
        let h = CurvePoint::random(rng);
        let secret = Scalar::random(&mut *rng);
        let k = 4;

        let (shares, _) = share_secret(rng, &indices, &h, secret, k);

        for window in shares.windows(k) {
            let bare: Vec<Share> = window.iter().map(|vs| *vs.share()).collect();
            assert_eq!(open(&bare), secret);
        }

        // Too few shares land on a different value.
        let bare: Vec<Share> = shares[..k - 1].iter().map(|vs| *vs.share()).collect();
        assert_ne!(open(&bare), secret);
    }

    #[test]
    fn summed_sharings_stay_verifiable() {
        let rng = &mut init_testing();
        let indices = sequential_indices(6);
        let h = CurvePoint::random(rng);

        let first_secret = Scalar::random(&mut *rng);
        let (first, first_com) = share_secret(rng, &indices, &h, first_secret, 3);
        let second_secret = Scalar::random(&mut *rng);
        let (second, second_com) = share_secret(rng, &indices, &h, second_secret, 3);

        let sum_com = first_com.add(&second_com);
        for (a, b) in first.iter().zip(&second) {
            assert!(share_is_valid(&h, &sum_com, &a.add(b)));
        }
    }
}
