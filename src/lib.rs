// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A toolkit for secure multi-party generation of unbiased random field
//! elements, and for the collective opening of Pedersen-committed secret
//! shares.
//!
//! The crate provides two per-participant state machines over the same
//! verifiable-secret-sharing primitive:
//!
//! - [`rng::RngParticipant`] turns a batch of biased-RNG outputs into
//!   verifiable shares of `b` uniformly random field elements that no single
//!   participant can bias, tolerating up to `n - k` dishonest or offline
//!   players.
//! - [`open::Opener`] reconstructs a batch of shared secrets (and their
//!   decommitments) once `k` valid share batches have been contributed.
//!
//! Both machines are deterministic, total on their input domain, and
//! byte-exactly serializable via [`codec::Codec`], which is what makes runs
//! replayable: the [`network`] module drives machines through synchronous
//! rounds with injected shuffling and dropping, and captures enough state to
//! replay any crash.
//!
//! The share geometry of a biased-RNG run (who sent what to whom, for which
//! batch position) lives in [`brng`]; the algebra that turns received shares
//! into directed openings is in [`rng::compute`].

#![warn(missing_docs)]

pub mod brng;
pub mod codec;
pub mod curve;
pub mod errors;
pub mod network;
pub mod open;
pub mod rng;
pub mod vss;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::Codec;
pub use curve::{CurvePoint, Scalar};
pub use errors::{Error, Result};
pub use network::{Machine, MachineId, Message, Network};
pub use open::{Opener, ShareEvent};
pub use rng::{RngParticipant, State, TransitionEvent};
pub use vss::{Commitment, Share, VerifiableShare, VerifiableShares};
