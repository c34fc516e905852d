// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

//! Shared vocabulary for pluggable transceiver media.
//!
//! This crate describes how callers address a module's memory map, the
//! status bits reported by the media drivers, the logical parameters and
//! fields that can be queried, and the packet format used to proxy register
//! accesses to an auxiliary PHY through a module's mailbox.

pub mod addr;
pub mod mailbox;
pub mod media;
pub mod status;

pub use addr::DeviceAddr;
pub use addr::EepromAddress;
pub use addr::Page;
pub use status::ChannelMonitorStatus;
pub use status::ChannelStatus;
pub use status::ModuleStatus;

use serde::Deserialize;
use serde::Serialize;

/// The I2C address of the lower (serial ID) memory of a module.
pub const ADDR_A0: u8 = 0x50;

/// The I2C address of the SFF-8472 diagnostic memory of an SFP module.
pub const ADDR_A2: u8 = 0x51;

/// The number of bytes in one page of a module's memory map.
pub const PAGE_SIZE: usize = 128;

/// The first byte of the upper, bank-switched half of the memory map.
pub const UPPER_PAGE_START: u8 = 128;

/// The lowest page number that may be explicitly requested.
pub const MINIMUM_PAGE: i32 = 0;

/// Sentinel used when a module or port does not declare a power budget.
pub const NO_MAX_POWER_DEFINED: i32 = -1;

/// The character substituted for non-printable bytes in vendor strings.
pub const GARBAGE_CHAR: char = '?';

/// Widths of the vendor fields, including a trailing terminator byte.
pub const VENDOR_NAME_LEN: usize = 17;
pub const VENDOR_OUI_LEN: usize = 4;
pub const VENDOR_REVISION_LEN: usize = 3;
pub const VENDOR_PART_NUMBER_LEN: usize = 17;
pub const VENDOR_SERIAL_NUMBER_LEN: usize = 17;
pub const VENDOR_DATE_LEN: usize = 9;

/// An error building or interpreting one of the types in this crate.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[cfg_attr(any(test, feature = "std"), derive(thiserror::Error))]
pub enum Error {
    /// A page selector below the minimum page and not a known sentinel.
    #[cfg_attr(any(test, feature = "std"), error("Invalid page selector: {0}"))]
    InvalidPage(i32),

    /// A device address selector below the "auto" sentinel, or wider than
    /// seven bits.
    #[cfg_attr(
        any(test, feature = "std"),
        error("Invalid device address selector: {0}")
    )]
    InvalidDeviceAddress(i32),

    /// A mailbox operation code that is neither a read nor a write.
    #[cfg_attr(
        any(test, feature = "std"),
        error("Invalid mailbox operation code: {0:#04x}")
    )]
    InvalidMailboxOp(u8),

    /// A buffer too short to hold an encoded item.
    #[cfg_attr(
        any(test, feature = "std"),
        error("Buffer too short: need {needed} bytes, have {actual}")
    )]
    BufferTooShort { needed: usize, actual: usize },
}
