// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Register access to an auxiliary PHY through a module's mailbox.
//!
//! Some modules, such as SFP+ 10GBASE-T modules, expose the registers of
//! their internal PHY through six bytes at the top of the A2h memory:
//!
//! ```text
//! 250 | PHY memory address
//! 251 | register offset, MSB
//! 252 | register offset, LSB
//! 253 | data, MSB
//! 254 | data, LSB
//! 255 | status (bits 3:2) and operation (bits 1:0)
//! ```
//!
//! An operation writes the whole packet, then polls the status bits until
//! the module reports it done or failed. A read then collects the data
//! word. Only the polling is retried, never the packet write.

use crate::eeprom::Selected;
use crate::probes;
use crate::Error;
use media_decode::MailboxStatus;
use media_messages::mailbox::MailboxOp;
use media_messages::mailbox::MailboxPacket;
use media_messages::mailbox::PACKET_OFFSET;
use media_messages::mailbox::RESULT_OFFSET;
use media_messages::mailbox::STATUS_OFFSET;
use media_messages::DeviceAddr;
use media_messages::EepromAddress;
use media_messages::Page;
use media_messages::ADDR_A2;
use slog::debug;
use slog::error;
use slog::trace;
use std::time::Duration;

/// Return the default interval between status polls.
pub const fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

/// Return the default time allowed for one operation to complete.
pub const fn default_poll_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Polling schedule of mailbox operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MailboxTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for MailboxTiming {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

impl MailboxTiming {
    // The number of status reads before giving up.
    fn polls(&self) -> u128 {
        if self.interval.is_zero() {
            1
        } else {
            self.timeout.as_millis().div_ceil(self.interval.as_millis().max(1))
        }
        .max(1)
    }
}

const fn mailbox_addr(offset: u8) -> EepromAddress {
    EepromAddress {
        device: DeviceAddr::Explicit(ADDR_A2),
        page: Page::Ignore,
        offset,
    }
}

/// The mailbox of a module.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mailbox {
    timing: MailboxTiming,
}

impl Mailbox {
    pub fn new(timing: MailboxTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> MailboxTiming {
        self.timing
    }

    /// Run one packet on a selected module.
    ///
    /// Returns the data word read for read operations, and the data written
    /// for writes.
    pub fn execute(&self, sel: &Selected<'_>, packet: &MailboxPacket) -> Result<u16, Error> {
        let log = sel.log();
        trace!(log, "mailbox packet"; "packet" => %packet);
        probes::mailbox__packet__start!(|| (packet.memory, packet.offset, u8::from(packet.op)));
        sel.write(mailbox_addr(PACKET_OFFSET), &packet.encode())?;
        self.wait(sel)?;
        let data = match packet.op {
            MailboxOp::Write => packet.data,
            MailboxOp::Read => u16::from_be_bytes(sel.read_word(mailbox_addr(RESULT_OFFSET))?),
        };
        probes::mailbox__packet__done!(|| (packet.memory, packet.offset, data));
        Ok(data)
    }

    fn wait(&self, sel: &Selected<'_>) -> Result<(), Error> {
        for _ in 0..self.timing.polls() {
            let byte = sel.read_byte(mailbox_addr(STATUS_OFFSET))?;
            match MailboxStatus::try_from(byte) {
                Ok(MailboxStatus::Done) => return Ok(()),
                Ok(MailboxStatus::Error) => {
                    return Err(Error::Protocol(String::from(
                        "mailbox reported an error status",
                    )))
                }
                Ok(MailboxStatus::Idle) => std::thread::sleep(self.timing.interval),
                Err(_) => {
                    return Err(Error::Protocol(format!(
                        "invalid mailbox status byte {byte:#04x}"
                    )))
                }
            }
        }
        Err(Error::Timeout(self.timing.timeout))
    }

    /// Read a PHY register.
    pub fn read(&self, sel: &Selected<'_>, memory: u8, offset: u16) -> Result<u16, Error> {
        self.execute(sel, &MailboxPacket::read(memory, offset))
    }

    /// Write a PHY register.
    pub fn write(
        &self,
        sel: &Selected<'_>,
        memory: u8,
        offset: u16,
        data: u16,
    ) -> Result<(), Error> {
        self.execute(sel, &MailboxPacket::write(memory, offset, data))
            .map(|_| ())
    }

    /// Run packets in order, stopping at the first failure.
    ///
    /// The data word of each read packet is replaced with the value read.
    /// A failure reports the index of the failed packet; later packets are
    /// never sent.
    pub fn chain(&self, sel: &Selected<'_>, packets: &mut [MailboxPacket]) -> Result<(), Error> {
        for (index, packet) in packets.iter_mut().enumerate() {
            match self.execute(sel, packet) {
                Ok(data) => packet.data = data,
                Err(source) => {
                    error!(
                        sel.log(),
                        "mailbox chain failed";
                        "index" => index,
                        "packet" => %packet,
                        "reason" => %source,
                    );
                    return Err(Error::ChainFailed {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }
        debug!(sel.log(), "mailbox chain complete"; "packets" => packets.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Mailbox;
    use super::MailboxTiming;
    use crate::bus::Bus;
    use crate::eeprom::Eeprom;
    use crate::eeprom::PagingScheme;
    use crate::selection::Selector;
    use crate::sim::discard_logger;
    use crate::sim::SimBus;
    use crate::Error;
    use media_messages::mailbox::MailboxPacket;
    use media_messages::ADDR_A0;
    use media_messages::ADDR_A2;
    use std::time::Duration;

    fn setup() -> (SimBus, Eeprom, Mailbox) {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.add_device(ADDR_A2);
        sim.attach_mailbox(ADDR_A2);
        let eeprom = Eeprom::new(
            Bus::new("test", sim.clone()),
            ADDR_A0,
            Selector::default(),
            Duration::ZERO,
            PagingScheme::Sff8472,
            discard_logger(),
        );
        let mailbox = Mailbox::new(MailboxTiming {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        });
        (sim, eeprom, mailbox)
    }

    #[test]
    fn test_read_after_busy_polls() {
        let (sim, eeprom, mailbox) = setup();
        sim.mailbox_busy_polls(ADDR_A2, 3);
        sim.set_phy_register(ADDR_A2, 1, 0xe800, 0x0001);
        let sel = eeprom.select().unwrap();
        assert_eq!(mailbox.read(&sel, 1, 0xe800).unwrap(), 0x0001);
    }

    #[test]
    fn test_write_reaches_phy() {
        let (sim, eeprom, mailbox) = setup();
        let sel = eeprom.select().unwrap();
        mailbox.write(&sel, 7, 0x0010, 0x9001).unwrap();
        assert_eq!(sim.phy_register(ADDR_A2, 7, 0x0010), Some(0x9001));
    }

    #[test]
    fn test_timeout() {
        let (sim, eeprom, mailbox) = setup();
        sim.mailbox_hang(ADDR_A2);
        let sel = eeprom.select().unwrap();
        let err = mailbox.read(&sel, 4, 0xe812).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_chain_stops_at_failed_packet() {
        let (sim, eeprom, mailbox) = setup();
        sim.mailbox_fail_packet(ADDR_A2, 2);
        let mut packets = [
            MailboxPacket::write(7, 0x0000, 0x2000),
            MailboxPacket::write(7, 0x0010, 0x9001),
            MailboxPacket::write(7, 0xc400, 0x0040),
            MailboxPacket::write(7, 0x0020, 0x1001),
            MailboxPacket::write(7, 0x0000, 0x3000),
        ];
        let sel = eeprom.select().unwrap();
        match mailbox.chain(&sel, &mut packets) {
            Err(Error::ChainFailed { index, source }) => {
                assert_eq!(index, 2);
                assert!(matches!(*source, Error::Protocol(_)));
            }
            other => panic!("expected a chain failure, found {other:?}"),
        }
        assert_eq!(sim.mailbox_packets(ADDR_A2), packets[..3].to_vec());
    }

    #[test]
    fn test_chain_collects_reads() {
        let (sim, eeprom, mailbox) = setup();
        sim.set_phy_register(ADDR_A2, 4, 0xe812, 0x3300);
        let mut packets = [
            MailboxPacket::write(1, 0x0009, 0x0000),
            MailboxPacket::read(4, 0xe812),
        ];
        let sel = eeprom.select().unwrap();
        mailbox.chain(&sel, &mut packets).unwrap();
        assert_eq!(packets[1].data, 0x3300);
    }

    #[test]
    fn test_default_timing() {
        let timing = MailboxTiming::default();
        assert_eq!(timing.interval, Duration::from_millis(10));
        assert_eq!(timing.timeout, Duration::from_millis(100));
        assert_eq!(timing.polls(), 10);
    }
}
