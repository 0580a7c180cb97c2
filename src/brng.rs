// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The share cube produced by a run of the biased random number generation
//! protocol, and its aggregation helpers.
//!
//! A full run is a three-dimensional cube of verifiable shares indexed by
//! `(from, to, batch)`: every player contributes a batch of sharings, and
//! every other player receives one share of each. The types here carve that
//! cube up the ways the protocols consume it:
//!
//! - [`Sharing`]: one player's shares and commitment for one random number.
//! - [`Row`]: one player's batch of sharings (fixed `from`).
//! - [`Element`]: a single received share tagged with its sender.
//! - [`Col`]: all shares destined for one reconstruction point (fixed `to`
//!   and batch position).
//! - [`Slice`]: one player's view across the whole batch (fixed `to`).
//! - [`Table`]: the full cube.

use crate::{
    codec::Codec,
    curve::{CurvePoint, Scalar},
    errors::Result,
    vss::{self, Commitment, VerifiableShare, VerifiableShares},
};
use bytes::{Buf, BufMut};

/// The shares and commitment generated by one player for one random number.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sharing {
    shares: VerifiableShares,
    commitment: Commitment,
}

impl Sharing {
    /// Construct a sharing from its shares and commitment.
    pub fn new(shares: VerifiableShares, commitment: Commitment) -> Self {
        Self { shares, commitment }
    }

    /// The shares of the sharing, one per player.
    pub fn shares(&self) -> &VerifiableShares {
        &self.shares
    }

    /// The commitment that validates every share of the sharing.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// The share with the given index, if the sharing contains one.
    pub fn share_with_index(&self, index: &Scalar) -> Option<&VerifiableShare> {
        self.shares.iter().find(|share| share.index() == index)
    }

    /// The number of shares in the sharing.
    pub fn n(&self) -> usize {
        self.shares.len()
    }
}

/// A batch of sharings generated by a single player.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Row(Vec<Sharing>);

impl Row {
    /// A row of `b` empty sharings, each with room for `n` shares and a
    /// `k`-point commitment.
    pub fn empty(n: usize, k: usize, b: usize) -> Self {
        Self(
            std::iter::repeat_with(|| {
                Sharing::new(Vec::with_capacity(n), Commitment::with_capacity(k))
            })
            .take(b)
            .collect(),
        )
    }

    /// The number of sharings in the row.
    pub fn batch_size(&self) -> usize {
        self.0.len()
    }

    /// The common share count of the row's sharings, or `None` if the row is
    /// empty or its sharings disagree.
    pub fn n(&self) -> Option<usize> {
        let first = self.0.first()?.n();
        self.0
            .iter()
            .all(|sharing| sharing.n() == first)
            .then_some(first)
    }

    /// Iterate over the sharings in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sharing> {
        self.0.iter()
    }
}

impl From<Vec<Sharing>> for Row {
    fn from(sharings: Vec<Sharing>) -> Self {
        Self(sharings)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Sharing;

    fn index(&self, i: usize) -> &Sharing {
        &self.0[i]
    }
}

/// A single share received from another player, tagged with the index of the
/// player that generated the sharing and the associated commitment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Element {
    from: Scalar,
    share: VerifiableShare,
    commitment: Commitment,
}

impl Element {
    /// Construct an element from its parts.
    pub fn new(from: Scalar, share: VerifiableShare, commitment: Commitment) -> Self {
        Self {
            from,
            share,
            commitment,
        }
    }

    /// The index of the player the share came from.
    pub fn from(&self) -> &Scalar {
        &self.from
    }

    /// The received share.
    pub fn share(&self) -> &VerifiableShare {
        &self.share
    }

    /// The commitment the share must validate against.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

/// The elements from every player that correspond to a single global random
/// number.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Col(Vec<Element>);

impl Col {
    /// The number of elements in the column.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the column holds no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.0.iter()
    }

    /// A column is well formed when it has at least one element and all of
    /// its shares carry the same index.
    pub fn has_valid_form(&self) -> bool {
        let Some(first) = self.0.first() else {
            return false;
        };
        let index = first.share.index();
        self.0.iter().all(|element| element.share.index() == index)
    }

    /// The share and commitment of the summed sharings: the aggregation step
    /// that turns per-player contributions into one biased random number.
    /// Returns `None` for an empty column.
    pub fn sum(&self) -> Option<(VerifiableShare, Commitment)> {
        let first = self.0.first()?;
        let mut share = first.share;
        let mut commitment = first.commitment.clone();
        for element in &self.0[1..] {
            share = share.add(&element.share);
            commitment = commitment.add(&element.commitment);
        }
        Some((share, commitment))
    }
}

impl From<Vec<Element>> for Col {
    fn from(elements: Vec<Element>) -> Self {
        Self(elements)
    }
}

impl std::ops::Index<usize> for Col {
    type Output = Element;

    fn index(&self, i: usize) -> &Element {
        &self.0[i]
    }
}

/// One player's view of a run: a column for every batch position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Slice(Vec<Col>);

impl Slice {
    /// The number of columns, which equals the batch size of the run.
    pub fn batch_size(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the columns in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, Col> {
        self.0.iter()
    }

    /// A slice is well formed when it is non-empty, every column is well
    /// formed, and all columns carry the same share index.
    pub fn has_valid_form(&self) -> bool {
        let Some(first) = self.0.first() else {
            return false;
        };
        if !first.has_valid_form() {
            return false;
        }
        let index = first[0].share.index();
        self.0[1..]
            .iter()
            .all(|col| col.has_valid_form() && col[0].share.index() == index)
    }

    /// Every element whose share fails the Pedersen check against its
    /// commitment.
    pub fn faults(&self, h: &CurvePoint) -> Vec<Element> {
        self.0
            .iter()
            .flat_map(Col::iter)
            .filter(|element| !vss::share_is_valid(h, &element.commitment, &element.share))
            .cloned()
            .collect()
    }
}

impl From<Vec<Col>> for Slice {
    fn from(cols: Vec<Col>) -> Self {
        Self(cols)
    }
}

impl std::ops::Index<usize> for Slice {
    type Output = Col;

    fn index(&self, i: usize) -> &Col {
        &self.0[i]
    }
}

/// The full cube of shares across all players for one run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table(Vec<Row>);

impl Table {
    /// The number of players that contributed rows.
    pub fn height(&self) -> usize {
        self.0.len()
    }

    /// The common batch size of the rows, or `None` if the table is empty or
    /// its rows disagree.
    pub fn batch_size(&self) -> Option<usize> {
        let first = self.0.first()?.batch_size();
        self.0
            .iter()
            .all(|row| row.batch_size() == first)
            .then_some(first)
    }

    /// Whether all three dimensions of the cube are non-zero and consistent.
    pub fn has_valid_dimensions(&self) -> bool {
        if self.batch_size().is_none() {
            return false;
        }
        let Some(n) = self.0[0].n() else {
            return false;
        };
        n > 0 && self.0.iter().all(|row| row.n() == Some(n))
    }

    /// Extract the view of the player at `index`, where row `i` of the table
    /// was contributed by the player at `from_indices[i]`.
    ///
    /// Returns `None` when `index` is not in `from_indices`. Assumes a table
    /// with valid dimensions.
    pub fn slice(&self, index: &Scalar, from_indices: &[Scalar]) -> Option<Slice> {
        let position = from_indices.iter().position(|from| from == index)?;
        let batch_size = self.batch_size()?;

        let mut cols = vec![Vec::with_capacity(self.height()); batch_size];
        for (row, from) in self.0.iter().zip(from_indices) {
            for (j, sharing) in row.iter().enumerate() {
                cols[j].push(Element::new(
                    *from,
                    sharing.shares[position],
                    sharing.commitment.clone(),
                ));
            }
        }

        Some(Slice(cols.into_iter().map(Col::from).collect()))
    }
}

impl From<Vec<Row>> for Table {
    fn from(rows: Vec<Row>) -> Self {
        Self(rows)
    }
}

impl std::ops::Index<usize> for Table {
    type Output = Row;

    fn index(&self, i: usize) -> &Row {
        &self.0[i]
    }
}

impl Codec for Sharing {
    fn size_hint(&self) -> usize {
        self.shares.size_hint() + self.commitment.size_hint()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.shares.write(buf);
        self.commitment.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let shares = VerifiableShares::read(buf)?;
        let commitment = Commitment::read(buf)?;
        Ok(Self { shares, commitment })
    }
}

impl Codec for Element {
    fn size_hint(&self) -> usize {
        self.from.size_hint() + self.share.size_hint() + self.commitment.size_hint()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.from.write(buf);
        self.share.write(buf);
        self.commitment.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let from = Scalar::read(buf)?;
        let share = VerifiableShare::read(buf)?;
        let commitment = Commitment::read(buf)?;
        Ok(Self {
            from,
            share,
            commitment,
        })
    }
}

macro_rules! impl_codec_for_wrapper {
    ($outer:ty, $inner:ty) => {
        impl Codec for $outer {
            fn size_hint(&self) -> usize {
                self.0.size_hint()
            }

            fn write<B: BufMut>(&self, buf: &mut B) {
                self.0.write(buf);
            }

            fn read<B: Buf>(buf: &mut B) -> Result<Self> {
                Ok(Self(<$inner>::read(buf)?))
            }
        }
    };
}

impl_codec_for_wrapper!(Row, Vec<Sharing>);
impl_codec_for_wrapper!(Col, Vec<Element>);
impl_codec_for_wrapper!(Slice, Vec<Col>);
impl_codec_for_wrapper!(Table, Vec<Row>);
