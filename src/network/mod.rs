//! A synchronous, deterministic network simulator.
//!
//! A [`Network`] drives a set of [`Machine`]s through rounds of message
//! exchange: every message produced in round `r` is delivered in round
//! `r + 1`, in the order left behind by the injected processing hook. The
//! hook is the only source of nondeterminism, which is what makes runs
//! reproducible; [`shuffler_dropper`] builds the usual hook that shuffles
//! delivery order and silently drops traffic to and from a random offline
//! set.
//!
//! With history capture enabled the network records every delivered message
//! and, should a machine panic while handling one, writes the initial
//! machine states plus the message history to `panic.dump`. A [`Replay`]
//! loads such a dump and steps through the deliveries one at a time.

// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    codec::Codec,
    errors::{Error, Result},
};
use bytes::{Buf, BufMut};
use rand::{rngs::StdRng, seq::SliceRandom, RngCore, SeedableRng};
use std::{
    collections::HashMap,
    mem,
    panic::{self, AssertUnwindSafe},
    path::Path,
};
use tracing::{error, info, instrument};

/// The file a faulting run dumps its state to.
const PANIC_DUMP_FILE: &str = "panic.dump";

/// A unique identifier for a [`Machine`] in a network.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MachineId(pub i32);

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Codec for MachineId {
    fn size_hint(&self) -> usize {
        4
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        self.0.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self(i32::read(buf)?))
    }
}

/// A message that can be sent during a network run.
pub trait Message: Codec + Clone {
    /// The machine that produced the message.
    fn sender(&self) -> MachineId;

    /// The machine the message is addressed to.
    fn recipient(&self) -> MachineId;
}

/// A participant in a network run.
///
/// Machines own their state exclusively; messages cross the machine boundary
/// by value, and the serialized form is what a crash dump records.
pub trait Machine: Codec {
    /// The message type exchanged by this kind of machine.
    type Message: Message;

    /// The unique identifier of this machine.
    fn id(&self) -> MachineId;

    /// The messages this machine sends before any are delivered.
    fn initial_messages(&self) -> Vec<Self::Message>;

    /// Deliver one message; the returned messages are sent in the next
    /// round.
    fn handle(&mut self, message: &Self::Message) -> Vec<Self::Message>;
}

/// The per-round message processing hook: it may reorder the buffer and
/// replace entries with `None` to drop them.
pub type ProcessMsgs<M> = Box<dyn FnMut(&mut Vec<Option<M>>)>;

/// A simulated network of machines exchanging messages in synchronous
/// rounds.
pub struct Network<M: Machine> {
    machines: Vec<M>,
    index_of: HashMap<MachineId, usize>,
    process_msgs: ProcessMsgs<M::Message>,

    capture_hist: bool,
    history: Vec<M::Message>,
    initial_states: Vec<u8>,
}

impl<M: Machine> Network<M> {
    /// Build a network over `machines`, applying `process_msgs` to each
    /// round's buffer before delivery.
    pub fn new<P>(machines: Vec<M>, process_msgs: P) -> Result<Self>
    where
        P: FnMut(&mut Vec<Option<M::Message>>) + 'static,
    {
        let mut index_of = HashMap::with_capacity(machines.len());
        for (index, machine) in machines.iter().enumerate() {
            if index_of.insert(machine.id(), index).is_some() {
                return Err(Error::DuplicateMachine(machine.id().0));
            }
        }

        // Snapshot the machine states now; the dump needs them as they were
        // before any delivery.
        let initial_states = machines.encode();

        Ok(Self {
            machines,
            index_of,
            process_msgs: Box::new(process_msgs),
            capture_hist: false,
            history: Vec::new(),
            initial_states,
        })
    }

    /// Enable or disable message history capture. Capture is required for a
    /// crash dump to be written on a machine fault.
    pub fn set_capture_hist(&mut self, capture: bool) {
        self.capture_hist = capture;
    }

    /// The machines of the network, in construction order.
    pub fn machines(&self) -> &[M] {
        &self.machines
    }

    /// Consume the network, handing back its machines for inspection.
    pub fn into_machines(self) -> Vec<M> {
        self.machines
    }

    /// Drive the network until a round produces no messages.
    ///
    /// With capture enabled, a panicking machine is caught, the dump is
    /// written, and the fault is returned as an error; without capture the
    /// panic propagates.
    #[instrument(skip_all)]
    pub fn run(&mut self) -> Result<()> {
        let mut curr: Vec<Option<M::Message>> = Vec::new();
        for machine in &self.machines {
            curr.extend(machine.initial_messages().into_iter().map(Some));
        }
        (self.process_msgs)(&mut curr);

        let mut next: Vec<Option<M::Message>> = Vec::new();
        let mut round = 0usize;
        loop {
            for slot in curr.iter_mut() {
                // Dropped messages are never delivered.
                let Some(message) = slot.take() else {
                    continue;
                };
                if self.capture_hist {
                    self.history.push(message.clone());
                }
                let replies = self.deliver(&message)?;
                next.extend(replies.into_iter().map(Some));
            }

            if next.is_empty() {
                info!(rounds = round + 1, "network run complete");
                return Ok(());
            }
            round += 1;

            mem::swap(&mut curr, &mut next);
            next.clear();
            (self.process_msgs)(&mut curr);
        }
    }

    fn deliver(&mut self, message: &M::Message) -> Result<Vec<M::Message>> {
        let recipient = message.recipient();
        let &index = self
            .index_of
            .get(&recipient)
            .ok_or(Error::UnknownRecipient(recipient.0))?;

        if !self.capture_hist {
            return Ok(self.machines[index].handle(message));
        }

        let machine = &mut self.machines[index];
        match panic::catch_unwind(AssertUnwindSafe(|| machine.handle(message))) {
            Ok(replies) => Ok(replies),
            Err(_) => {
                error!(machine = %recipient, "machine faulted; writing crash dump");
                if let Err(err) = self.dump(Path::new(PANIC_DUMP_FILE)) {
                    error!("unable to write crash dump: {err}");
                }
                Err(Error::MachineFault(recipient.0))
            }
        }
    }

    /// Write the initial machine states followed by the message history to
    /// `path`. The file can be loaded by [`Replay`].
    pub fn dump(&self, path: &Path) -> Result<()> {
        let mut bytes = self.initial_states.clone();
        bytes.extend_from_slice(&self.history.encode());
        std::fs::write(path, bytes)?;
        info!(path = %path.display(), "wrote network dump");
        Ok(())
    }
}

/// Build a processing hook that simulates `offline` machines being down.
///
/// The offline set is drawn uniformly at random from `ids`. The returned
/// hook shuffles each round's messages uniformly at random and drops every
/// message whose sender or recipient is offline. The returned map records
/// the offline status of every ID.
pub fn shuffler_dropper<M, R>(
    ids: &[MachineId],
    offline: usize,
    rng: &mut R,
) -> (impl FnMut(&mut Vec<Option<M>>), HashMap<MachineId, bool>)
where
    M: Message,
    R: RngCore,
{
    let mut shuffled = ids.to_vec();
    shuffled.shuffle(rng);
    let mut is_offline = HashMap::with_capacity(ids.len());
    for (position, id) in shuffled.iter().enumerate() {
        is_offline.insert(*id, position < offline);
    }

    let offline_set = is_offline.clone();
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    let mut round_rng = StdRng::from_seed(seed);

    let hook = move |messages: &mut Vec<Option<M>>| {
        messages.shuffle(&mut round_rng);
        for slot in messages.iter_mut() {
            let drop = slot.as_ref().is_some_and(|message| {
                offline_set.get(&message.sender()).copied().unwrap_or(false)
                    || offline_set
                        .get(&message.recipient())
                        .copied()
                        .unwrap_or(false)
            });
            if drop {
                *slot = None;
            }
        }
    };

    (hook, is_offline)
}

/// A loaded network dump: the machines in their initial states plus the
/// recorded message history, ready to be stepped through.
pub struct Replay<M: Machine> {
    machines: Vec<M>,
    index_of: HashMap<MachineId, usize>,
    messages: Vec<M::Message>,
    cursor: usize,
}

impl<M: Machine> Replay<M> {
    /// Parse a dump produced by [`Network::dump`].
    pub fn load(mut bytes: &[u8]) -> Result<Self> {
        let machines = Vec::<M>::read(&mut bytes)?;
        let messages = Vec::<M::Message>::read(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(Error::TrailingBytes(bytes.len()));
        }

        let mut index_of = HashMap::with_capacity(machines.len());
        for (index, machine) in machines.iter().enumerate() {
            if index_of.insert(machine.id(), index).is_some() {
                return Err(Error::DuplicateMachine(machine.id().0));
            }
        }

        Ok(Self {
            machines,
            index_of,
            messages,
            cursor: 0,
        })
    }

    /// The machines in their current (partially replayed) state.
    pub fn machines(&self) -> &[M] {
        &self.machines
    }

    /// The number of recorded deliveries not yet replayed.
    pub fn remaining(&self) -> usize {
        self.messages.len() - self.cursor
    }

    /// Re-deliver the next recorded message, returning it, or `None` when
    /// the history is exhausted. Replies are discarded: every delivery that
    /// actually happened is already in the history.
    pub fn step(&mut self) -> Result<Option<&M::Message>> {
        let Some(message) = self.messages.get(self.cursor) else {
            return Ok(None);
        };
        let recipient = message.recipient();
        let &index = self
            .index_of
            .get(&recipient)
            .ok_or(Error::UnknownRecipient(recipient.0))?;
        self.machines[index].handle(message);
        self.cursor += 1;
        Ok(Some(&self.messages[self.cursor - 1]))
    }
}
