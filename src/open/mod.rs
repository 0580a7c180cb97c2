//! The share opening protocol.
//!
//! An [`Opener`] reconstructs a batch of `b` secrets (and the decommitments
//! that open their Pedersen commitments) from share batches submitted by
//! peers. Each submission carries one verifiable share per batch position,
//! all at the submitting player's index; the opener validates every share
//! against the corresponding commitment and accepts or rejects the batch as
//! a whole. Once `k` distinct valid batches have been accepted, where `k` is
//! the length of the commitments, the secrets are reconstructed by Lagrange
//! interpolation at zero.
//!
//! The opener is deliberately total: malformed or malicious submissions are
//! answered with a rejection event and leave the state untouched, so no peer
//! can stall or corrupt the reconstruction of an honest player.

// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    codec::Codec,
    curve::{CurvePoint, Scalar},
    errors::Result,
    vss::{self, Commitment, VerifiableShare, VerifiableShares},
};
use bytes::{Buf, BufMut};
use tracing::{debug, info, instrument};
use zeroize::Zeroize;

/// The outcome of handling one share batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShareEvent {
    /// The batch had the wrong length and was not considered further.
    Ignored,
    /// The batch was valid and buffered; reconstruction has not happened on
    /// this submission (either the threshold is not yet reached, or it was
    /// already reached earlier).
    SharesAdded,
    /// The batch was valid and was the `k`-th distinct contribution; the
    /// secrets and decommitments are now reconstructed.
    Done,
    /// At least one share failed validation; nothing was buffered.
    InvalidShares,
    /// A batch for this index was already accepted.
    IndexDuplicate,
    /// The batch's index is not one of the legal share indices.
    IndexOutOfRange,
}

/// State machine that reconstructs a batch of secrets from verifiable share
/// batches.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Opener {
    commitments: Vec<Commitment>,
    indices: Vec<Scalar>,
    h: CurvePoint,
    share_bufs: Vec<VerifiableShares>,
    seen: Vec<Scalar>,
    secrets: Vec<Scalar>,
    decommitments: Vec<Scalar>,
}

impl Opener {
    /// A fresh opener for the batch described by `commitments`, accepting
    /// contributions from the players at `indices`, under the Pedersen
    /// parameter `h`.
    pub fn new(commitments: Vec<Commitment>, indices: Vec<Scalar>, h: CurvePoint) -> Self {
        let share_bufs = vec![VerifiableShares::new(); commitments.len()];
        Self {
            share_bufs,
            seen: Vec::with_capacity(indices.len()),
            secrets: Vec::new(),
            decommitments: Vec::new(),
            commitments,
            indices,
            h,
        }
    }

    /// The number of secrets being reconstructed in parallel.
    pub fn batch_size(&self) -> usize {
        self.commitments.len()
    }

    /// The number of distinct valid batches required for reconstruction,
    /// read off the commitment length.
    pub fn threshold(&self) -> usize {
        self.commitments.first().map_or(0, Commitment::len)
    }

    /// The number of distinct valid batches accepted so far.
    pub fn share_count(&self) -> usize {
        self.seen.len()
    }

    /// The commitments the submissions are validated against.
    pub fn commitments(&self) -> &[Commitment] {
        &self.commitments
    }

    /// The reconstructed secrets; empty until the threshold is reached.
    pub fn secrets(&self) -> &[Scalar] {
        &self.secrets
    }

    /// The reconstructed decommitments; empty until the threshold is
    /// reached.
    pub fn decommitments(&self) -> &[Scalar] {
        &self.decommitments
    }

    /// Process one player's share batch.
    ///
    /// The batch must contain exactly one share per batch position, all at
    /// the same index; every share must pass the Pedersen check against the
    /// commitment for its position. Acceptance is all-or-nothing, and a
    /// rejected batch leaves the opener untouched.
    #[instrument(skip_all)]
    pub fn handle_share_batch(&mut self, shares: &[VerifiableShare]) -> ShareEvent {
        if shares.is_empty() || shares.len() != self.batch_size() {
            debug!(
                got = shares.len(),
                want = self.batch_size(),
                "ignoring share batch with wrong length"
            );
            return ShareEvent::Ignored;
        }

        let index = *shares[0].index();
        if !self.indices.contains(&index) {
            return ShareEvent::IndexOutOfRange;
        }
        if self.seen.contains(&index) {
            return ShareEvent::IndexDuplicate;
        }
        for (share, commitment) in shares.iter().zip(&self.commitments) {
            if share.index() != &index || !vss::share_is_valid(&self.h, commitment, share) {
                debug!("rejecting share batch that fails validation");
                return ShareEvent::InvalidShares;
            }
        }

        for (buf, share) in self.share_bufs.iter_mut().zip(shares) {
            buf.push(*share);
        }
        self.seen.push(index);

        if self.seen.len() == self.threshold() {
            self.reconstruct();
            info!(batch_size = self.batch_size(), "batch reconstructed");
            return ShareEvent::Done;
        }
        ShareEvent::SharesAdded
    }

    /// Interpolate every batch position at zero over the accepted
    /// contributions. The buffered shares are aligned with `seen`, so one
    /// set of Lagrange coefficients serves values and decommitments alike.
    fn reconstruct(&mut self) {
        let coefficients = vss::lagrange_coefficients_at_zero(&self.seen);
        self.secrets = self
            .share_bufs
            .iter()
            .map(|buf| {
                buf.iter()
                    .zip(&coefficients)
                    .fold(Scalar::ZERO, |acc, (share, coefficient)| {
                        acc + share.share().value() * coefficient
                    })
            })
            .collect();
        self.decommitments = self
            .share_bufs
            .iter()
            .map(|buf| {
                buf.iter()
                    .zip(&coefficients)
                    .fold(Scalar::ZERO, |acc, (share, coefficient)| {
                        acc + share.decommitment() * coefficient
                    })
            })
            .collect();
    }
}

impl Drop for Opener {
    fn drop(&mut self) {
        self.secrets.zeroize();
        self.decommitments.zeroize();
    }
}

impl Codec for Opener {
    fn size_hint(&self) -> usize {
        self.commitments.size_hint()
            + self.indices.size_hint()
            + self.h.size_hint()
            + self.share_bufs.size_hint()
            + self.seen.size_hint()
            + self.secrets.size_hint()
            + self.decommitments.size_hint()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.commitments.write(buf);
        self.indices.write(buf);
        self.h.write(buf);
        self.share_bufs.write(buf);
        self.seen.write(buf);
        self.secrets.write(buf);
        self.decommitments.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let commitments = Vec::read(buf)?;
        let indices = Vec::read(buf)?;
        let h = CurvePoint::read(buf)?;
        let share_bufs = Vec::read(buf)?;
        let seen = Vec::read(buf)?;
        let secrets = Vec::read(buf)?;
        let decommitments = Vec::read(buf)?;
        Ok(Self {
            commitments,
            indices,
            h,
            share_bufs,
            seen,
            secrets,
            decommitments,
        })
    }
}
