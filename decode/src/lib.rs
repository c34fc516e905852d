// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Decode the memory maps of SFP, QSFP and QSFP28-DD modules.
//!
//! Nothing in this crate performs I/O. It describes where data lives in each
//! family's memory map, and how to turn the raw bytes found there into
//! physical quantities, strings and flags.

pub mod compliance;
pub mod ident;
pub mod mailbox;
pub mod power;
pub mod regs;
pub mod tuning;
pub mod units;
pub mod utils;
pub mod vendor;

pub use compliance::TransceiverCode;
pub use ident::Identifier;
pub use ident::QsfpCategory;
pub use mailbox::MailboxStatus;
pub use power::MaxPower;
pub use regs::RegInfo;
pub use regs::RegMap;
pub use tuning::TunableCapability;
pub use units::Calibration;
pub use units::RxPowerCalibration;

use media_messages::Error as MessageError;
use thiserror::Error;

/// An error related to decoding a transceiver memory map.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum Error {
    #[error("Bit index out of range")]
    BitOutOfRange,

    #[error("Invalid value for a bit field")]
    InvalidBitField,

    #[error("Unsupported SFF-8024 Identifier: '{0}'")]
    UnsupportedIdentifier(Identifier),

    #[error("Invalid tunable capability: max frequency {max} THz below min {min} THz")]
    InvalidCapability { min: f64, max: f64 },

    #[error("Field needs {needed} bytes, found {actual}")]
    ShortField { needed: usize, actual: usize },

    #[error("Message error")]
    Message(#[from] MessageError),
}
