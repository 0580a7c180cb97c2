//! The unbiased random number generation protocol.
//!
//! Every player feeds the batch of sharings it received from the biased RNG
//! into an [`RngParticipant`]. The participant derives, for each batch
//! position, the commitment to the output polynomial (whose coefficients are
//! the biased secrets), and computes a *directed opening* for every peer:
//! the share-of-share that lets that peer reconstruct its own share of the
//! output polynomial. Directed openings are exchanged, each player collects
//! them in an internal [`Opener`] bank, and once `k` valid openings have
//! arrived the player holds verifiable shares of `b` random numbers that no
//! single participant could bias.
//!
//! The participant never fails loudly: malformed input is answered with a
//! rejection event, and a player whose own biased-RNG output is missing or
//! broken simply participates *idle*, deriving commitments and opening other
//! players' shares without contributing any of its own.
//!
//! # High-level protocol description
//! The protocol is one round of communication:
//! - Ingest the local biased-RNG output batch
//!   ([`RngParticipant::transition_shares`]), which derives the output
//!   commitments and the directed openings.
//! - Send each peer its directed openings; feed the openings received from
//!   peers into [`RngParticipant::transition_open`].
//! - After `k` valid opening batches (counting our own, self-fed), the
//!   reconstructed shares are available from
//!   [`RngParticipant::reconstructed_shares`].

// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

pub mod compute;

use crate::{
    codec::Codec,
    curve::{CurvePoint, Scalar},
    errors::{Error, Result},
    open::{Opener, ShareEvent},
    vss::{self, Commitment, Share, VerifiableShare, VerifiableShares},
};
use bytes::{Buf, BufMut};
use tracing::{debug, info, instrument};

/// The lifecycle of an [`RngParticipant`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Waiting for the local biased-RNG output batch.
    Init,
    /// Commitments constructed; collecting directed openings from peers.
    WaitingOpen,
    /// Shares of the random numbers have been reconstructed.
    Done,
}

/// The outcome of a state transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionEvent {
    /// The biased-RNG output was structurally unusable; the participant is
    /// still waiting in [`State::Init`].
    SharesIgnored,
    /// Commitments were derived but this participant contributes no shares
    /// of its own (its share batch was absent or invalid); it can still open
    /// peers' contributions.
    CommitmentsConstructed,
    /// Commitments and directed openings were both constructed.
    SharesConstructed,
    /// The shares of the random numbers have been reconstructed.
    RngsReconstructed,
    /// A valid opening batch was added; more are needed.
    OpeningsAdded,
    /// An opening batch was rejected or arrived redundantly.
    OpeningsIgnored,
}

/// A player's state machine for one batched run of unbiased random number
/// generation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RngParticipant {
    /// This player's share index.
    index: Scalar,
    /// The share indices of all players, in canonical order.
    indices: Vec<Scalar>,
    batch_size: u32,
    threshold: u32,
    /// Pedersen commitment scheme parameter.
    h: CurvePoint,
    state: State,
    /// Commitments to the output polynomials, one per batch position.
    /// Byte-identical across all participants of a run.
    commitments: Vec<Commitment>,
    /// Directed openings aligned with `indices`; all entries empty when
    /// idle.
    openings: Vec<VerifiableShares>,
    /// The opener bank collecting directed openings addressed to us.
    opener: Option<Opener>,
}

impl RngParticipant {
    /// A fresh participant for the player at `index`, generating `batch_size`
    /// random numbers with reconstruction threshold `threshold` among the
    /// players at `indices`, under the Pedersen parameter `h`.
    pub fn new(
        index: Scalar,
        indices: Vec<Scalar>,
        batch_size: u32,
        threshold: u32,
        h: CurvePoint,
    ) -> Self {
        let openings = vec![VerifiableShares::new(); indices.len()];
        Self {
            index,
            indices,
            batch_size,
            threshold,
            h,
            state: State::Init,
            commitments: Vec::new(),
            openings,
            opener: None,
        }
    }

    /// The number of players.
    pub fn n(&self) -> u32 {
        self.indices.len() as u32
    }

    /// The share indices of all players.
    pub fn indices(&self) -> &[Scalar] {
        &self.indices
    }

    /// This player's share index.
    pub fn index(&self) -> &Scalar {
        &self.index
    }

    /// The number of random numbers generated per run.
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// The reconstruction threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the participant has left [`State::Init`].
    pub fn has_constructed_shares(&self) -> bool {
        self.state != State::Init
    }

    /// The derived commitments to the output polynomials; empty in
    /// [`State::Init`].
    pub fn commitments(&self) -> &[Commitment] {
        &self.commitments
    }

    /// The directed openings for the player at index `to`, or `None` when
    /// unknown or when this participant is idle.
    pub fn directed_openings(&self, to: &Scalar) -> Option<&VerifiableShares> {
        let position = self.indices.iter().position(|index| index == to)?;
        let openings = &self.openings[position];
        (!openings.is_empty()).then_some(openings)
    }

    /// This player's reconstructed shares of the random numbers, packaged as
    /// verifiable shares at its own index. Empty before [`State::Done`].
    pub fn reconstructed_shares(&self) -> VerifiableShares {
        let Some(opener) = &self.opener else {
            return Vec::new();
        };
        opener
            .secrets()
            .iter()
            .zip(opener.decommitments())
            .map(|(secret, decommitment)| {
                VerifiableShare::new(Share::new(self.index, *secret), *decommitment)
            })
            .collect()
    }

    /// Ingest this player's biased-RNG output batch.
    ///
    /// `sets_of_commitments[j]` holds the commitments of the sharings that
    /// feed batch position `j` (`threshold` of them, or `threshold - 1` when
    /// `is_zero`); `sets_of_shares[j]` holds this player's own shares of
    /// those sharings and may be empty to participate idle. Only the
    /// commitments decide whether the transition makes progress: unusable
    /// commitments leave the participant in [`State::Init`], while absent or
    /// invalid shares merely downgrade it to an idle participant.
    ///
    /// When `is_zero` is set the output polynomial is forced to a zero
    /// constant term: the derived commitment gains the identity point ahead
    /// of the secret-term points, and openings pick up one extra factor of
    /// the destination index.
    #[instrument(skip_all)]
    pub fn transition_shares(
        &mut self,
        sets_of_shares: &[VerifiableShares],
        sets_of_commitments: &[Vec<Commitment>],
        is_zero: bool,
    ) -> TransitionEvent {
        if self.state != State::Init {
            return TransitionEvent::SharesIgnored;
        }

        let threshold = self.threshold as usize;
        let required = if is_zero {
            threshold.saturating_sub(1)
        } else {
            threshold
        };

        if required == 0 || !self.commitments_are_usable(sets_of_commitments, required) {
            debug!("ignoring biased-RNG output with unusable commitments");
            return TransitionEvent::SharesIgnored;
        }
        let contribute = self.shares_are_usable(sets_of_shares, sets_of_commitments, required);

        let mut out_commitments = Vec::with_capacity(sets_of_commitments.len());
        let mut opener_commitments = Vec::with_capacity(sets_of_commitments.len());
        for coms in sets_of_commitments {
            out_commitments.push(self.derive_output_commitment(coms, is_zero));
            opener_commitments.push(self.derive_share_commitment(coms, is_zero));
        }

        if contribute {
            for (position, to) in self.indices.iter().enumerate() {
                self.openings[position] = sets_of_shares
                    .iter()
                    .map(|set| directed_opening(to, set, is_zero))
                    .collect();
            }
        }

        self.commitments = out_commitments;
        let mut opener = Opener::new(opener_commitments, self.indices.clone(), self.h);

        // Our own directed openings count towards the threshold; with
        // threshold 1 this already completes the reconstruction.
        let mut done = false;
        if contribute {
            if let Some(position) = self.indices.iter().position(|index| index == &self.index) {
                let event = opener.handle_share_batch(&self.openings[position]);
                done = event == ShareEvent::Done;
            }
        }
        self.opener = Some(opener);

        if done {
            self.state = State::Done;
            info!("random number shares reconstructed from own openings");
            return TransitionEvent::RngsReconstructed;
        }
        self.state = State::WaitingOpen;
        if contribute {
            TransitionEvent::SharesConstructed
        } else {
            info!("participating idle: commitments only");
            TransitionEvent::CommitmentsConstructed
        }
    }

    /// Feed one peer's directed opening batch into the opener bank.
    ///
    /// Ignored in [`State::Init`]; idempotent once [`State::Done`] (extra
    /// valid batches are absorbed, everything else is ignored).
    #[instrument(skip_all)]
    pub fn transition_open(&mut self, openings: &[VerifiableShare]) -> TransitionEvent {
        let Some(opener) = self.opener.as_mut() else {
            return TransitionEvent::OpeningsIgnored;
        };
        match opener.handle_share_batch(openings) {
            ShareEvent::Done => {
                self.state = State::Done;
                info!("random number shares reconstructed");
                TransitionEvent::RngsReconstructed
            }
            ShareEvent::SharesAdded => TransitionEvent::OpeningsAdded,
            _ => TransitionEvent::OpeningsIgnored,
        }
    }

    fn commitments_are_usable(
        &self,
        sets_of_commitments: &[Vec<Commitment>],
        required: usize,
    ) -> bool {
        sets_of_commitments.len() == self.batch_size as usize
            && sets_of_commitments.iter().all(|coms| {
                coms.len() == required
                    && coms
                        .iter()
                        .all(|com| com.len() == self.threshold as usize)
            })
    }

    fn shares_are_usable(
        &self,
        sets_of_shares: &[VerifiableShares],
        sets_of_commitments: &[Vec<Commitment>],
        required: usize,
    ) -> bool {
        if sets_of_shares.len() != self.batch_size as usize {
            return false;
        }
        sets_of_shares
            .iter()
            .zip(sets_of_commitments)
            .all(|(set, coms)| {
                set.len() == required
                    && set.iter().zip(coms).all(|(share, com)| {
                        share.index() == &self.index && vss::share_is_valid(&self.h, com, share)
                    })
            })
    }

    /// The commitment to the output polynomial for one batch position. Its
    /// coefficients are the secrets of the input sharings; forcing a zero
    /// constant term shifts them all up by one degree.
    fn derive_output_commitment(&self, coms: &[Commitment], is_zero: bool) -> Commitment {
        if !is_zero {
            return compute::output_commitment(coms);
        }
        let mut output = Commitment::with_capacity(coms.len() + 1);
        output.append(CurvePoint::IDENTITY);
        for com in coms {
            output.append(*com.point(0));
        }
        output
    }

    /// The commitment the directed openings addressed to us must validate
    /// against: the share-at-`self.index` of the polynomial-of-sharings.
    fn derive_share_commitment(&self, coms: &[Commitment], is_zero: bool) -> Commitment {
        let commitment = compute::share_commitment(&self.index, coms);
        if is_zero {
            commitment.mul(&self.index)
        } else {
            commitment
        }
    }
}

/// The directed opening for the player at `to`, computed from our shares of
/// the input sharings.
pub(crate) fn directed_opening(
    to: &Scalar,
    set: &[VerifiableShare],
    is_zero: bool,
) -> VerifiableShare {
    let vshare = compute::share_of_share(to, set);
    if !is_zero {
        return vshare;
    }
    VerifiableShare::new(
        Share::new(*vshare.index(), to * vshare.share().value()),
        to * vshare.decommitment(),
    )
}

impl Codec for State {
    fn size_hint(&self) -> usize {
        1
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        let tag: u8 = match self {
            State::Init => 0,
            State::WaitingOpen => 1,
            State::Done => 2,
        };
        buf.put_u8(tag);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        match u8::read(buf)? {
            0 => Ok(State::Init),
            1 => Ok(State::WaitingOpen),
            2 => Ok(State::Done),
            tag => Err(Error::InvalidTag(tag, "State")),
        }
    }
}

impl Codec for RngParticipant {
    fn size_hint(&self) -> usize {
        self.index.size_hint()
            + self.indices.size_hint()
            + 4
            + 4
            + self.h.size_hint()
            + self.state.size_hint()
            + self.commitments.size_hint()
            + self.openings.size_hint()
            + self.opener.size_hint()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.index.write(buf);
        self.indices.write(buf);
        self.batch_size.write(buf);
        self.threshold.write(buf);
        self.h.write(buf);
        self.state.write(buf);
        self.commitments.write(buf);
        // The openings table is keyed by `indices`; writing the values in
        // `indices` order keeps the encoding canonical without a map.
        self.openings.write(buf);
        self.opener.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let index = Scalar::read(buf)?;
        let indices = Vec::read(buf)?;
        let batch_size = u32::read(buf)?;
        let threshold = u32::read(buf)?;
        let h = CurvePoint::read(buf)?;
        let state = State::read(buf)?;
        let commitments = Vec::read(buf)?;
        let openings = Vec::read(buf)?;
        let opener = Option::read(buf)?;
        Ok(Self {
            index,
            indices,
            batch_size,
            threshold,
            h,
            state,
            commitments,
            openings,
            opener,
        })
    }
}
