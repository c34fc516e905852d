// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Register maps of each module family and memory map revision.
//!
//! Each (family, revision) pair has its own table. Layouts that look alike
//! are deliberately kept separate, since they differ in places that matter.

pub mod qsfp;
pub mod qsfp_dd;
pub mod sfp;

use media_messages::media::Parameter;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::DeviceAddr;
use media_messages::EepromAddress;
use media_messages::Page;

/// The location and width of a field in a memory map.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RegInfo {
    pub offset: u8,
    /// Width in bytes. Zero means the field does not exist in this layout.
    pub size: u8,
    /// True for ASCII text fields.
    pub printable: bool,
}

impl RegInfo {
    pub const NOT_SUPPORTED: Self = Self::new(0, 0);

    pub const fn new(offset: u8, size: u8) -> Self {
        Self {
            offset,
            size,
            printable: false,
        }
    }

    pub const fn printable(offset: u8, size: u8) -> Self {
        Self {
            offset,
            size,
            printable: true,
        }
    }

    pub const fn is_supported(&self) -> bool {
        self.size != 0
    }

    /// The number of bytes to read for a vendor field, whose width includes
    /// a terminator that is not present in the memory map.
    pub const fn vendor_read_len(&self) -> usize {
        self.size.saturating_sub(1) as usize
    }
}

/// The fields of one family's serial ID and threshold memory.
#[derive(Clone, Copy, Debug)]
pub struct RegMap {
    pub name: &'static str,
    pub param: fn(Parameter) -> RegInfo,
    pub vendor: fn(VendorField) -> RegInfo,
    pub threshold: fn(Threshold) -> RegInfo,
    /// The device holding the thresholds.
    pub threshold_device: DeviceAddr,
    /// The page holding the thresholds.
    pub threshold_page: Page,
}

impl RegMap {
    /// Return the address of a threshold, or `None` if the layout lacks it.
    pub fn threshold_address(&self, t: Threshold) -> Option<(EepromAddress, RegInfo)> {
        let info = (self.threshold)(t);
        info.is_supported().then_some((
            EepromAddress {
                device: self.threshold_device,
                page: self.threshold_page,
                offset: info.offset,
            },
            info,
        ))
    }
}

/// A per-channel bit: channel `n` is bit `shift + n` of the byte at `offset`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelBit {
    pub offset: u8,
    pub shift: u8,
}

impl ChannelBit {
    pub const fn new(offset: u8, shift: u8) -> Self {
        Self { offset, shift }
    }

    /// The mask of `channel` within the byte.
    ///
    /// Callers validate `channel` against the layout's channel count, which
    /// keeps the bit in range.
    pub const fn mask(&self, channel: u8) -> u8 {
        1 << ((self.shift + channel) & 0x7)
    }
}

/// How per-channel monitor alarm and warning flags are laid out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelFlags {
    /// One byte per pair of channels, the even channel in the upper nibble.
    /// Within a nibble the bits are high alarm, low alarm, high warning and
    /// low warning, from most to least significant.
    Nibbles { rx_power: u8, tx_bias: u8 },
    /// One byte per condition, with bit `n` for channel `n`. Conditions the
    /// layout does not report are `None`.
    Lanes {
        rx_power: [Option<u8>; 4],
        tx_bias: [Option<u8>; 4],
    },
}

/// Bits of a module-level flag byte: high alarm, low alarm, high warning,
/// low warning.
pub const MODULE_FLAG_BITS: [u8; 4] = [0x80, 0x40, 0x20, 0x10];

/// Complete lower-memory layout of one QSFP family and revision.
#[derive(Clone, Copy, Debug)]
pub struct QsfpLayout {
    pub name: &'static str,
    pub channels: u8,
    pub map: &'static RegMap,
    pub temperature: u8,
    pub voltage: u8,
    /// First of the per-channel receive power words.
    pub rx_power: u8,
    /// First of the per-channel bias words.
    pub tx_bias: u8,
    /// First of the per-channel transmit power words, if monitored.
    pub tx_power: Option<u8>,
    pub temp_flags: u8,
    pub volt_flags: u8,
    pub channel_flags: ChannelFlags,
    pub tx_los: ChannelBit,
    pub rx_los: ChannelBit,
    pub tx_fault: ChannelBit,
    pub tx_disable: ChannelBit,
    pub cdr_tx: ChannelBit,
    pub cdr_rx: ChannelBit,
}

impl QsfpLayout {
    /// Offset of the 2-byte monitor word of `channel`, starting at `base`.
    pub const fn channel_word(base: u8, channel: u8) -> u8 {
        base + 2 * channel
    }
}
