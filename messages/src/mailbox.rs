// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Packets for the external-control mailbox.
//!
//! Some SFP+ modules carry an auxiliary PHY (for example a 10GBASE-T copper
//! PHY) whose 16-bit registers are reached through a small command region in
//! the module's diagnostic memory. A packet is written in one transaction,
//! and then a status byte is polled until the module reports completion.

use crate::Error;
use core::fmt;
use serde::Deserialize;
use serde::Serialize;

/// Offset of the first packet byte in the unpaged diagnostic memory.
pub const PACKET_OFFSET: u8 = 250;

/// Offset at which the 16-bit result of a read is found.
pub const RESULT_OFFSET: u8 = 253;

/// Offset of the status byte polled for completion.
pub const STATUS_OFFSET: u8 = 255;

/// The operation requested by a mailbox packet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum MailboxOp {
    Read,
    Write,
}

impl MailboxOp {
    const MASK: u8 = 0b11;
}

impl From<MailboxOp> for u8 {
    fn from(op: MailboxOp) -> u8 {
        match op {
            MailboxOp::Read => 1,
            MailboxOp::Write => 2,
        }
    }
}

impl TryFrom<u8> for MailboxOp {
    type Error = Error;

    fn try_from(x: u8) -> Result<Self, Self::Error> {
        match x & MailboxOp::MASK {
            1 => Ok(MailboxOp::Read),
            2 => Ok(MailboxOp::Write),
            _ => Err(Error::InvalidMailboxOp(x)),
        }
    }
}

/// One register access proxied through the mailbox.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct MailboxPacket {
    /// The memory (MMD) of the auxiliary device.
    pub memory: u8,
    /// The register offset within `memory`.
    pub offset: u16,
    /// The data to write. Ignored for reads.
    pub data: u16,
    pub op: MailboxOp,
}

impl MailboxPacket {
    /// The size of an encoded packet.
    pub const SIZE: usize = 6;

    pub const fn read(memory: u8, offset: u16) -> Self {
        Self {
            memory,
            offset,
            data: 0,
            op: MailboxOp::Read,
        }
    }

    pub const fn write(memory: u8, offset: u16, data: u16) -> Self {
        Self {
            memory,
            offset,
            data,
            op: MailboxOp::Write,
        }
    }

    /// Encode the packet, with the offset and data big-endian.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let [oh, ol] = self.offset.to_be_bytes();
        let [dh, dl] = self.data.to_be_bytes();
        [self.memory, oh, ol, dh, dl, u8::from(self.op)]
    }

    /// Decode a packet from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooShort {
                needed: Self::SIZE,
                actual: buf.len(),
            });
        }
        Ok(Self {
            memory: buf[0],
            offset: u16::from_be_bytes([buf[1], buf[2]]),
            data: u16::from_be_bytes([buf[3], buf[4]]),
            op: MailboxOp::try_from(buf[5])?,
        })
    }
}

impl fmt::Display for MailboxPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.op {
            MailboxOp::Read => write!(f, "read {}.{:#06x}", self.memory, self.offset),
            MailboxOp::Write => write!(
                f,
                "write {}.{:#06x} <- {:#06x}",
                self.memory, self.offset, self.data
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MailboxOp;
    use super::MailboxPacket;
    use crate::Error;

    #[test]
    fn test_encode_is_big_endian() {
        let p = MailboxPacket::write(7, 0xc400, 0x8040);
        assert_eq!(p.encode(), [7, 0xc4, 0x00, 0x80, 0x40, 2]);
        let p = MailboxPacket::read(1, 0x0009);
        assert_eq!(p.encode(), [1, 0x00, 0x09, 0, 0, 1]);
    }

    #[test]
    fn test_decode_written_bytes() {
        let p = MailboxPacket::decode(&[4, 0xe8, 0x12, 0, 0, 1]).unwrap();
        assert_eq!(p, MailboxPacket::read(4, 0xe812));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(
            MailboxPacket::decode(&[0; 3]).unwrap_err(),
            Error::BufferTooShort {
                needed: 6,
                actual: 3
            }
        );
        assert_eq!(MailboxOp::try_from(0).unwrap_err(), Error::InvalidMailboxOp(0));
        assert_eq!(MailboxOp::try_from(3).unwrap_err(), Error::InvalidMailboxOp(3));
    }
}
