// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The algebraic kernel of the random number generation protocol.
//!
//! All three functions treat a list of `k` sharings as the coefficients of a
//! polynomial-of-sharings, constant term first, and evaluate it with Horner's
//! rule. They are total on well-formed input; mismatched lengths or mixed
//! share indices are the caller's responsibility.

use crate::{
    curve::{CurvePoint, Scalar},
    vss::{Commitment, Share, VerifiableShare},
};

/// The commitment to the output polynomial: point `j` commits to the secret
/// of the `j`-th input sharing.
///
/// # Panics
/// If any input commitment is empty.
pub fn output_commitment(coms: &[Commitment]) -> Commitment {
    let mut output = Commitment::with_capacity(coms.len());
    for com in coms {
        output.append(*com.point(0));
    }
    output
}

/// The commitment to the share-at-`index` of the polynomial-of-sharings:
/// point `j` is `sum_l index^l * coms[l].point(j)`.
///
/// # Panics
/// If `coms` is empty or its commitments have differing lengths.
pub fn share_commitment(index: &Scalar, coms: &[Commitment]) -> Commitment {
    let width = coms[0].len();
    let mut output = Commitment::with_capacity(width);
    for j in 0..width {
        let point = coms
            .iter()
            .rev()
            .fold(CurvePoint::IDENTITY, |acc, com| {
                acc.mul(index) + *com.point(j)
            });
        output.append(point);
    }
    output
}

/// The share-at-`to` of the polynomial-of-sharings, computed from one
/// player's shares of each input sharing: value and decommitment are the
/// Horner evaluations at `to`, and the share keeps the players's own index.
///
/// # Panics
/// If `vshares` is empty.
pub fn share_of_share(to: &Scalar, vshares: &[VerifiableShare]) -> VerifiableShare {
    let index = *vshares[0].index();
    let value = vshares
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, vshare| acc * to + vshare.share().value());
    let decommitment = vshares
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, vshare| acc * to + vshare.decommitment());
    VerifiableShare::new(Share::new(index, value), decommitment)
}
