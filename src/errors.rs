// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types for the crate.
//!
//! Protocol-level rejection (an invalid share, a duplicate index, a malformed
//! batch) is never an [`Error`]: the state machines report those through their
//! event enums and leave their state untouched, so that a misbehaving peer
//! cannot corrupt an honest participant. Errors are reserved for the things
//! that genuinely fail: decoding untrusted bytes, file I/O, and faults inside
//! a simulated network run.

/// The default Result type used in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can be produced while decoding bytes or driving a simulated
/// network.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The buffer ended before the value was fully read.
    #[error("unexpected end of buffer")]
    EndOfBuffer,

    /// The buffer contained bytes beyond the encoded value.
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    /// The bytes are not a canonical field element encoding.
    #[error("bytes are not a canonical field element")]
    InvalidScalar,

    /// The bytes are not a valid curve point encoding.
    #[error("bytes are not a valid curve point")]
    InvalidPoint,

    /// An unrecognized tag was found where an enum discriminant was expected.
    #[error("unrecognized tag {0} for {1}")]
    InvalidTag(u8, &'static str),

    /// Two machines in a network were constructed with the same ID.
    #[error("two machines share the ID {0}")]
    DuplicateMachine(i32),

    /// A message was addressed to an ID that no machine in the network has.
    #[error("no machine with ID {0}")]
    UnknownRecipient(i32),

    /// A machine panicked while handling a message.
    #[error("machine {0} faulted while handling a message")]
    MachineFault(i32),

    /// An I/O failure while writing or reading a crash dump.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
