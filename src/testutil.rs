// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Shared fixtures for the crate's tests: reproducible randomness, index
//! builders, share perturbation, and synthetic biased-RNG outputs.

use crate::{
    brng::{Row, Sharing, Table},
    curve::{CurvePoint, Scalar},
    vss::{self, Commitment, Share, VerifiableShare, VerifiableShares},
};
use k256::elliptic_curve::{Field, PrimeField};
use rand::{
    rngs::{OsRng, StdRng},
    Rng, SeedableRng,
};

/// Returns an rng to be used for testing. This will print the rng seed to
/// stderr so that if a test fails, the failing seed can be recovered and used
/// for debugging.
pub(crate) fn init_testing() -> StdRng {
    let mut seeder = OsRng;
    let seed = seeder.gen();
    eprintln!("To re-run test with the same randomness, use init_testing_with_seed() with the following seed:");
    eprintln!("\t{seed:?}");
    StdRng::from_seed(seed)
}

/// A seeded version of [`init_testing`] that also turns on logging. Only for
/// debugging a failing run; keep ordinary tests on [`init_testing`].
#[allow(unused)]
pub(crate) fn init_testing_with_seed(seed: [u8; 32]) -> StdRng {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let stdout_layer = tracing_subscriber::fmt::layer().pretty();
    // It's okay if this fails. It just means logging has already been set up
    // for this thread.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(stdout_layer)
        .try_init();

    StdRng::from_seed(seed)
}

/// The player indices `1, 2, ..., n` as field elements.
pub(crate) fn sequential_indices(n: usize) -> Vec<Scalar> {
    (1..=n).map(|i| Scalar::from_u128(i as u128)).collect()
}

/// The share batch held by player `i`: one share per batch position.
pub(crate) fn shares_at(sets_of_shares: &[VerifiableShares], i: usize) -> VerifiableShares {
    sets_of_shares.iter().map(|shares| shares[i]).collect()
}

/// Replace the share's index with a random one.
pub(crate) fn perturb_index(vshare: &mut VerifiableShare, rng: &mut StdRng) {
    *vshare = VerifiableShare::new(
        Share::new(
            vshare.index() + Scalar::random(&mut *rng),
            *vshare.share().value(),
        ),
        *vshare.decommitment(),
    );
}

/// Replace the share's value with a random one.
pub(crate) fn perturb_value(vshare: &mut VerifiableShare, rng: &mut StdRng) {
    *vshare = VerifiableShare::new(
        Share::new(
            *vshare.index(),
            vshare.share().value() + Scalar::random(&mut *rng),
        ),
        *vshare.decommitment(),
    );
}

/// Replace the share's decommitment with a random one.
pub(crate) fn perturb_decommitment(vshare: &mut VerifiableShare, rng: &mut StdRng) {
    *vshare = VerifiableShare::new(
        *vshare.share(),
        vshare.decommitment() + Scalar::random(&mut *rng),
    );
}

/// A random valid sharing for the given indices with reconstruction
/// threshold `k` and Pedersen parameter `h`.
pub(crate) fn random_valid_sharing(
    rng: &mut StdRng,
    indices: &[Scalar],
    k: usize,
    h: &CurvePoint,
) -> Sharing {
    let secret = Scalar::random(&mut *rng);
    let (shares, commitment) = vss::share_secret(rng, indices, h, secret, k);
    Sharing::new(shares, commitment)
}

/// A random valid row with batch size `b`.
pub(crate) fn random_valid_row(
    rng: &mut StdRng,
    indices: &[Scalar],
    k: usize,
    b: usize,
    h: &CurvePoint,
) -> Row {
    Row::from(
        (0..b)
            .map(|_| random_valid_sharing(rng, indices, k, h))
            .collect::<Vec<_>>(),
    )
}

/// A random valid table with `t` rows.
pub(crate) fn random_valid_table(
    rng: &mut StdRng,
    indices: &[Scalar],
    h: &CurvePoint,
    k: usize,
    b: usize,
    t: usize,
) -> Table {
    Table::from(
        (0..t)
            .map(|_| random_valid_row(rng, indices, k, b, h))
            .collect::<Vec<_>>(),
    )
}

/// A synthetic biased-RNG output batch for a single player: for each of `b`
/// batch positions, the player's own shares of `k` sharings plus those
/// sharings' commitments.
pub(crate) fn brng_output_batch(
    rng: &mut StdRng,
    index: &Scalar,
    b: usize,
    k: usize,
    h: &CurvePoint,
) -> (Vec<VerifiableShares>, Vec<Vec<Commitment>>) {
    let mut sets_of_shares = Vec::with_capacity(b);
    let mut sets_of_commitments = Vec::with_capacity(b);
    for _ in 0..b {
        let mut set = Vec::with_capacity(k);
        let mut coms = Vec::with_capacity(k);
        for _ in 0..k {
            let secret = Scalar::random(&mut *rng);
            let (mut shares, commitment) = vss::share_secret(
                rng,
                std::slice::from_ref(index),
                h,
                secret,
                k,
            );
            set.push(shares.pop().unwrap());
            coms.push(commitment);
        }
        sets_of_shares.push(set);
        sets_of_commitments.push(coms);
    }
    (sets_of_shares, sets_of_commitments)
}

/// A synthetic biased-RNG output batch for a whole network: per-player share
/// batches plus the commitments common to all players. When `is_zero` is set
/// the batch feeds a zero sharing and carries one sharing less per position.
#[allow(clippy::type_complexity)]
pub(crate) fn brng_output_full_batch(
    rng: &mut StdRng,
    indices: &[Scalar],
    b: usize,
    k: usize,
    h: &CurvePoint,
    is_zero: bool,
) -> (Vec<Vec<VerifiableShares>>, Vec<Vec<Commitment>>) {
    let n = indices.len();
    let required = if is_zero { k - 1 } else { k };

    let mut by_player = vec![Vec::with_capacity(b); n];
    let mut sets_of_commitments = Vec::with_capacity(b);
    for _ in 0..b {
        let mut coms = Vec::with_capacity(required);
        let mut per_run_shares = Vec::with_capacity(required);
        for _ in 0..required {
            let secret = Scalar::random(&mut *rng);
            let (shares, commitment) = vss::share_secret(rng, indices, h, secret, k);
            coms.push(commitment);
            per_run_shares.push(shares);
        }
        for (position, sets) in by_player.iter_mut().enumerate() {
            let set: VerifiableShares = per_run_shares
                .iter()
                .map(|shares| shares[position])
                .collect();
            sets.push(set);
        }
        sets_of_commitments.push(coms);
    }
    (by_player, sets_of_commitments)
}

/// Everything the player at `index` sees in one run: its own biased-RNG
/// output batch, the common commitments, and the opening batches every
/// player (itself included) would direct at it, aligned with `indices`.
#[allow(clippy::type_complexity)]
pub(crate) fn rng_shares_batch(
    rng: &mut StdRng,
    indices: &[Scalar],
    index: &Scalar,
    b: usize,
    k: usize,
    h: &CurvePoint,
    is_zero: bool,
) -> (
    Vec<VerifiableShares>,
    Vec<Vec<Commitment>>,
    Vec<VerifiableShares>,
) {
    let (by_player, sets_of_commitments) = brng_output_full_batch(rng, indices, b, k, h, is_zero);
    let position = indices
        .iter()
        .position(|candidate| candidate == index)
        .expect("index must be one of the player indices");

    let openings_by_player: Vec<VerifiableShares> = by_player
        .iter()
        .map(|sets| {
            sets.iter()
                .map(|set| crate::rng::directed_opening(index, set, is_zero))
                .collect()
        })
        .collect();

    let own_sets = by_player[position].clone();
    (own_sets, sets_of_commitments, openings_by_player)
}
