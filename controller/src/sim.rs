// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! A simulated I2C segment and pin groups.
//!
//! [`SimBus`] models each device on the segment either as a module memory
//! map, with a lower page and bank-switched upper pages chosen by byte 127,
//! or as a bank of 16-bit registers for copper PHYs and muxes. Every access
//! is recorded in a journal, failures can be injected per byte, and a module
//! can carry an emulated mailbox PHY that completes packets after a
//! configurable number of busy polls.
//!
//! The `install_*` functions populate a segment with plausible modules, and
//! back the `--sim` mode of `xcvradm`.

use crate::bus::BusError;
use crate::bus::I2cBus;
use crate::gpio::GpioError;
use crate::gpio::PinGroup;
use media_decode::regs::qsfp;
use media_decode::regs::qsfp_dd;
use media_decode::regs::sfp;
use media_decode::Identifier;
use media_decode::MailboxStatus;
use media_decode::QsfpCategory;
use media_decode::RegMap;
use media_messages::mailbox::MailboxOp;
use media_messages::mailbox::MailboxPacket;
use media_messages::mailbox::PACKET_OFFSET;
use media_messages::mailbox::RESULT_OFFSET;
use media_messages::mailbox::STATUS_OFFSET;
use media_messages::media::Quantity;
use media_messages::media::Threshold;
use media_messages::ADDR_A0;
use media_messages::ADDR_A2;
use media_messages::PAGE_SIZE;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// A logger that drops everything.
pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// One transaction seen by a [`SimBus`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimOp {
    Read { address: u8, offset: u8, len: usize },
    Write { address: u8, offset: u8, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct Memory {
    lower: Vec<u8>,
    upper: BTreeMap<u8, Vec<u8>>,
    mailbox: Option<SimMailbox>,
}

impl Memory {
    fn new() -> Self {
        Self {
            lower: vec![0; PAGE_SIZE],
            upper: BTreeMap::new(),
            mailbox: None,
        }
    }

    fn current_page(&self) -> u8 {
        self.lower[usize::from(qsfp::PAGE_SELECT)]
    }

    fn get(&self, page: u8, offset: u8) -> u8 {
        let offset = usize::from(offset);
        if offset < PAGE_SIZE {
            self.lower[offset]
        } else {
            self.upper
                .get(&page)
                .map(|p| p[offset - PAGE_SIZE])
                .unwrap_or(0)
        }
    }

    fn set(&mut self, page: u8, offset: u8, value: u8) {
        let offset = usize::from(offset);
        if offset < PAGE_SIZE {
            self.lower[offset] = value;
        } else {
            self.upper
                .entry(page)
                .or_insert_with(|| vec![0; PAGE_SIZE])[offset - PAGE_SIZE] = value;
        }
    }
}

#[derive(Debug)]
enum Device {
    Memory(Box<Memory>),
    Registers(HashMap<u8, u16>),
}

/// An emulated PHY behind a module's mailbox.
#[derive(Debug, Default)]
struct SimMailbox {
    registers: HashMap<(u8, u16), u16>,
    packets: Vec<MailboxPacket>,
    busy_polls: u32,
    remaining: u32,
    fail_packet: Option<usize>,
    status: Option<MailboxStatus>,
}

impl SimMailbox {
    // Execute a packet, returning the result word for reads.
    fn submit(&mut self, packet: MailboxPacket) -> Option<u16> {
        let index = self.packets.len();
        self.packets.push(packet);
        self.remaining = self.busy_polls;
        if self.fail_packet == Some(index) {
            self.status = Some(MailboxStatus::Error);
            return None;
        }
        self.status = Some(MailboxStatus::Done);
        match packet.op {
            MailboxOp::Write => {
                self.registers
                    .insert((packet.memory, packet.offset), packet.data);
                None
            }
            MailboxOp::Read => Some(
                self.registers
                    .get(&(packet.memory, packet.offset))
                    .copied()
                    .unwrap_or(0),
            ),
        }
    }

    fn status_byte(&mut self) -> u8 {
        if self.remaining > 0 {
            self.remaining -= 1;
            return u8::from(MailboxStatus::Idle) << MailboxStatus::LOW_BIT;
        }
        let status = self.status.unwrap_or(MailboxStatus::Idle);
        u8::from(status) << MailboxStatus::LOW_BIT
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: BTreeMap<u8, Device>,
    journal: Vec<SimOp>,
    fail_reads: BTreeSet<(u8, u8)>,
    fail_writes: BTreeSet<(u8, u8)>,
    ignore_writes: BTreeSet<(u8, u8)>,
}

/// A simulated I2C segment.
///
/// Clones share the same segment, so a test keeps one clone to inspect
/// while a driver owns another through its [`crate::Bus`].
#[derive(Clone, Debug, Default)]
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_memory<T>(&self, address: u8, f: impl FnOnce(&mut Memory) -> T) -> Option<T> {
        match self.state().devices.get_mut(&address) {
            Some(Device::Memory(m)) => Some(f(m)),
            _ => None,
        }
    }

    /// Add a module memory map at `address`, zero filled.
    pub fn add_device(&self, address: u8) {
        self.state()
            .devices
            .insert(address, Device::Memory(Box::new(Memory::new())));
    }

    /// Add a bank of 16-bit registers at `address`.
    pub fn add_register_device(&self, address: u8) {
        self.state()
            .devices
            .insert(address, Device::Registers(HashMap::new()));
    }

    pub fn remove_device(&self, address: u8) {
        self.state().devices.remove(&address);
    }

    /// Write bytes into page 0, bypassing the journal.
    pub fn poke(&self, address: u8, offset: u8, data: &[u8]) {
        self.poke_page(address, 0, offset, data);
    }

    /// Write bytes into `page`, bypassing the journal. Offsets below 128
    /// land in lower memory whatever the page.
    pub fn poke_page(&self, address: u8, page: u8, offset: u8, data: &[u8]) {
        self.with_memory(address, |m| {
            for (o, b) in (offset..=u8::MAX).zip(data) {
                m.set(page, o, *b);
            }
        });
    }

    /// Read bytes of page 0, bypassing the journal.
    pub fn peek(&self, address: u8, offset: u8, len: usize) -> Vec<u8> {
        self.peek_page(address, 0, offset, len)
    }

    pub fn peek_page(&self, address: u8, page: u8, offset: u8, len: usize) -> Vec<u8> {
        self.with_memory(address, |m| {
            (offset..=u8::MAX)
                .take(len)
                .map(|o| m.get(page, o))
                .collect()
        })
        .unwrap_or_default()
    }

    /// The page currently selected on a module.
    pub fn current_page(&self, address: u8) -> u8 {
        self.with_memory(address, |m| m.current_page()).unwrap_or(0)
    }

    pub fn set_register(&self, address: u8, register: u8, value: u16) {
        if let Some(Device::Registers(r)) = self.state().devices.get_mut(&address) {
            r.insert(register, value);
        }
    }

    pub fn register(&self, address: u8, register: u8) -> Option<u16> {
        match self.state().devices.get(&address) {
            Some(Device::Registers(r)) => r.get(&register).copied(),
            _ => None,
        }
    }

    /// Fail any read touching `offset` of `address`.
    pub fn fail_reads_at(&self, address: u8, offset: u8) {
        self.state().fail_reads.insert((address, offset));
    }

    /// Fail any write touching `offset` of `address`.
    pub fn fail_writes_at(&self, address: u8, offset: u8) {
        self.state().fail_writes.insert((address, offset));
    }

    /// Acknowledge but discard writes to `offset` of `address`.
    pub fn ignore_writes_at(&self, address: u8, offset: u8) {
        self.state().ignore_writes.insert((address, offset));
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.fail_reads.clear();
        state.fail_writes.clear();
        state.ignore_writes.clear();
    }

    pub fn journal(&self) -> Vec<SimOp> {
        self.state().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    /// Attach an emulated mailbox PHY to the module at `address`.
    pub fn attach_mailbox(&self, address: u8) {
        self.with_memory(address, |m| m.mailbox = Some(SimMailbox::default()));
    }

    fn with_mailbox<T>(&self, address: u8, f: impl FnOnce(&mut SimMailbox) -> T) -> Option<T> {
        self.with_memory(address, |m| m.mailbox.as_mut().map(f))
            .flatten()
    }

    /// Report the mailbox as busy for `polls` status reads after each
    /// packet.
    pub fn mailbox_busy_polls(&self, address: u8, polls: u32) {
        self.with_mailbox(address, |mb| mb.busy_polls = polls);
    }

    /// Report an error status for the packet at `index`, counting from 0.
    pub fn mailbox_fail_packet(&self, address: u8, index: usize) {
        self.with_mailbox(address, |mb| mb.fail_packet = Some(index));
    }

    /// Never complete a packet.
    pub fn mailbox_hang(&self, address: u8) {
        self.with_mailbox(address, |mb| mb.busy_polls = u32::MAX);
    }

    pub fn set_phy_register(&self, address: u8, memory: u8, register: u16, value: u16) {
        self.with_mailbox(address, |mb| mb.registers.insert((memory, register), value));
    }

    pub fn phy_register(&self, address: u8, memory: u8, register: u16) -> Option<u16> {
        self.with_mailbox(address, |mb| mb.registers.get(&(memory, register)).copied())
            .flatten()
    }

    /// The packets the mailbox has received, in order.
    pub fn mailbox_packets(&self, address: u8) -> Vec<MailboxPacket> {
        self.with_mailbox(address, |mb| mb.packets.clone())
            .unwrap_or_default()
    }
}

fn touches(set: &BTreeSet<(u8, u8)>, address: u8, offset: u8, len: usize) -> bool {
    (offset..=u8::MAX)
        .take(len)
        .any(|o| set.contains(&(address, o)))
}

impl I2cBus for SimBus {
    fn read(&mut self, address: u8, offset: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let mut state = self.state();
        state.journal.push(SimOp::Read {
            address,
            offset,
            len: buf.len(),
        });
        if touches(&state.fail_reads, address, offset, buf.len()) {
            return Err(BusError::Nack);
        }
        match state.devices.get_mut(&address) {
            None => Err(BusError::Nack),
            Some(Device::Memory(m)) => {
                let page = m.current_page();
                for (o, b) in (offset..=u8::MAX).zip(buf.iter_mut()) {
                    *b = match m.mailbox.as_mut() {
                        Some(mb) if o == STATUS_OFFSET => mb.status_byte(),
                        _ => m.get(page, o),
                    };
                }
                Ok(())
            }
            Some(Device::Registers(r)) => {
                let value = r.get(&offset).copied().unwrap_or(0);
                match buf.len() {
                    1 => buf[0] = value.to_be_bytes()[1],
                    _ => {
                        for (b, v) in buf.iter_mut().zip(value.to_be_bytes()) {
                            *b = v;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn write(&mut self, address: u8, offset: u8, data: &[u8]) -> Result<(), BusError> {
        let mut state = self.state();
        state.journal.push(SimOp::Write {
            address,
            offset,
            data: data.to_vec(),
        });
        if touches(&state.fail_writes, address, offset, data.len()) {
            return Err(BusError::Nack);
        }
        let ignored: Vec<u8> = (offset..=u8::MAX)
            .take(data.len())
            .filter(|o| state.ignore_writes.contains(&(address, *o)))
            .collect();
        match state.devices.get_mut(&address) {
            None => Err(BusError::Nack),
            Some(Device::Memory(m)) => {
                for (o, b) in (offset..=u8::MAX).zip(data) {
                    if !ignored.contains(&o) {
                        let page = m.current_page();
                        m.set(page, o, *b);
                    }
                }
                if offset == PACKET_OFFSET && data.len() == MailboxPacket::SIZE {
                    let result = match (m.mailbox.as_mut(), MailboxPacket::decode(data)) {
                        (Some(mb), Ok(packet)) => mb.submit(packet),
                        _ => None,
                    };
                    if let Some(word) = result {
                        let page = m.current_page();
                        let [hi, lo] = word.to_be_bytes();
                        m.set(page, RESULT_OFFSET, hi);
                        m.set(page, RESULT_OFFSET + 1, lo);
                    }
                }
                Ok(())
            }
            Some(Device::Registers(r)) => {
                let value = match data {
                    [b] => u16::from(*b),
                    [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
                    [] => return Ok(()),
                };
                r.insert(offset, value);
                Ok(())
            }
        }
    }
}

/// Records the order in which pin groups are released.
#[derive(Clone, Debug, Default)]
pub struct ReleaseLog {
    names: Arc<Mutex<Vec<String>>>,
}

impl ReleaseLog {
    pub fn names(&self) -> Vec<String> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
    }
}

#[derive(Debug, Default)]
struct PinState {
    level: u32,
    writes: Vec<u32>,
    acquired: usize,
    released: usize,
    fail_acquire: bool,
    fail_io: bool,
    release_log: Option<(String, ReleaseLog)>,
}

/// A simulated pin group.
///
/// Clones share state, so a test can observe the group while a driver
/// owns it through a [`crate::gpio::PinGroupHandle`].
#[derive(Clone, Debug, Default)]
pub struct SimPinGroup {
    state: Arc<Mutex<PinState>>,
}

impl SimPinGroup {
    pub fn new(level: u32) -> Self {
        let group = Self::default();
        group.set_level(level);
        group
    }

    fn state(&self) -> MutexGuard<'_, PinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn level(&self) -> u32 {
        self.state().level
    }

    pub fn set_level(&self, level: u32) {
        self.state().level = level;
    }

    /// Every level written, in order.
    pub fn writes(&self) -> Vec<u32> {
        self.state().writes.clone()
    }

    pub fn acquired(&self) -> usize {
        self.state().acquired
    }

    pub fn released(&self) -> usize {
        self.state().released
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.state().fail_acquire = fail;
    }

    /// Fail reads and writes of the level.
    pub fn fail_io(&self, fail: bool) {
        self.state().fail_io = fail;
    }

    pub fn log_releases(&self, label: &str, log: &ReleaseLog) {
        self.state().release_log = Some((label.to_string(), log.clone()));
    }
}

impl PinGroup for SimPinGroup {
    fn acquire(&mut self) -> Result<(), GpioError> {
        let mut state = self.state();
        if state.fail_acquire {
            return Err(GpioError::Unavailable(String::from("injected failure")));
        }
        state.acquired += 1;
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.state();
        state.released += 1;
        if let Some((label, log)) = &state.release_log {
            log.push(label);
        }
    }

    fn read_level(&mut self) -> Result<u32, GpioError> {
        let state = self.state();
        if state.fail_io {
            return Err(GpioError::Unavailable(String::from("injected failure")));
        }
        Ok(state.level)
    }

    fn write_level(&mut self, level: u32) -> Result<(), GpioError> {
        let mut state = self.state();
        if state.fail_io {
            return Err(GpioError::Unavailable(String::from("injected failure")));
        }
        state.writes.push(level);
        state.level = level;
        Ok(())
    }
}

// Left-aligned ASCII, padded with spaces to `len`.
fn text(s: &str, len: usize) -> Vec<u8> {
    let mut out: Vec<u8> = s.bytes().take(len).collect();
    out.resize(len, b' ');
    out
}

const TEMPERATURE_THRESHOLDS: [u8; 8] = [0x50, 0x00, 0xf6, 0x00, 0x4b, 0x00, 0xfb, 0x00];
const VOLTAGE_THRESHOLDS: [u8; 8] = [0x8c, 0xa0, 0x75, 0x30, 0x88, 0xb8, 0x79, 0x18];
const BIAS_THRESHOLDS: [u8; 8] = [0x1d, 0x4c, 0x01, 0xf4, 0x17, 0x70, 0x03, 0xe8];
const TX_POWER_THRESHOLDS: [u8; 8] = [0x27, 0x10, 0x03, 0xe8, 0x1f, 0x40, 0x04, 0xe2];
const RX_POWER_THRESHOLDS: [u8; 8] = [0x27, 0x10, 0x00, 0x64, 0x1f, 0x40, 0x00, 0xc8];

/// 30 degrees C, 3.3 V, 6 mA, 0.5 mW and 0.4 mW.
const TEMPERATURE: [u8; 2] = [0x1e, 0x00];
const VOLTAGE: [u8; 2] = [0x80, 0xe8];
const BIAS: [u8; 2] = [0x0b, 0xb8];
const TX_POWER: [u8; 2] = [0x13, 0x88];
const RX_POWER: [u8; 2] = [0x0f, 0xa0];

/// Install an internally calibrated 10GBASE-SR SFP+ at A0h and A2h.
pub fn install_sfp(sim: &SimBus) {
    sim.add_device(ADDR_A0);
    sim.add_device(ADDR_A2);
    sim.poke(ADDR_A0, sfp::IDENTIFIER, &[u8::from(Identifier::Sfp), 0x04, 0x07]);
    sim.poke(ADDR_A0, sfp::COMPLIANCE, &[0x10, 0, 0, 0, 0, 0, 0, 0]);
    sim.poke(ADDR_A0, 12, &[0x67]);
    sim.poke(ADDR_A0, 20, &text("ACME", 16));
    sim.poke(ADDR_A0, 37, &[0x00, 0x90, 0x65]);
    sim.poke(ADDR_A0, 40, &text("SFP-10G-SR", 16));
    sim.poke(ADDR_A0, 56, &text("A", 2));
    sim.poke(ADDR_A0, 60, &[0x03, 0x52]);
    sim.poke(ADDR_A0, 68, &text("SN12345678", 16));
    sim.poke(ADDR_A0, 84, &text("230101", 8));
    sim.poke(ADDR_A0, sfp::DIAG_MON_TYPE, &[0x68, 0xf2]);

    let thresholds: Vec<u8> = [
        TEMPERATURE_THRESHOLDS,
        VOLTAGE_THRESHOLDS,
        BIAS_THRESHOLDS,
        TX_POWER_THRESHOLDS,
        RX_POWER_THRESHOLDS,
    ]
    .concat();
    sim.poke(ADDR_A2, 0, &thresholds);
    sim.poke(ADDR_A2, sfp::TEMPERATURE, &TEMPERATURE);
    sim.poke(ADDR_A2, sfp::VOLTAGE, &VOLTAGE);
    sim.poke(ADDR_A2, sfp::TX_BIAS, &BIAS);
    sim.poke(ADDR_A2, sfp::TX_POWER, &TX_POWER);
    sim.poke(ADDR_A2, sfp::RX_POWER, &RX_POWER);
}

/// Install a tunable DWDM SFP+ covering 191.00 to 196.00 THz on a 50 GHz
/// grid, tunable by channel or wavelength.
pub fn install_tunable_sfp(sim: &SimBus) {
    install_sfp(sim);
    sim.poke(ADDR_A0, sfp::OPTIONS, &[1 << sfp::OPTIONS_PAGING_BIT, 1 << sfp::TUNABLE_BIT]);
    sim.poke_page(ADDR_A2, sfp::tunable::PAGE, sfp::tunable::TUNING_SUPPORT, &[0x03]);
    sim.poke_page(
        ADDR_A2,
        sfp::tunable::PAGE,
        sfp::tunable::CAPABILITIES,
        &[0, 191, 0, 0, 0, 196, 0, 0, 0x01, 0xf4],
    );
}

fn install_qsfp_thresholds(sim: &SimBus, address: u8, map: &RegMap, page: u8) {
    for t in Threshold::ALL {
        let info = (map.threshold)(t);
        if !info.is_supported() {
            continue;
        }
        let table = match t.quantity() {
            Quantity::Temperature => TEMPERATURE_THRESHOLDS,
            Quantity::Voltage => VOLTAGE_THRESHOLDS,
            Quantity::RxPower => RX_POWER_THRESHOLDS,
            Quantity::TxBias => BIAS_THRESHOLDS,
            Quantity::TxPower => TX_POWER_THRESHOLDS,
        };
        let i = 2 * (t.index() % 4);
        sim.poke_page(address, page, info.offset, &table[i..i + 2]);
    }
}

/// Install a QSFP28 100GBASE-SR4 module at `address`.
pub fn install_qsfp28(sim: &SimBus, address: u8) {
    let layout = &qsfp::LAYOUT;
    sim.add_device(address);
    sim.poke(address, qsfp::IDENTIFIER, &[u8::from(Identifier::Qsfp28), 0x07, 0x00]);
    sim.poke(address, layout.temperature, &TEMPERATURE);
    sim.poke(address, layout.voltage, &VOLTAGE);
    for ch in 0..layout.channels {
        sim.poke(address, qsfp::LAYOUT.rx_power + 2 * ch, &RX_POWER);
        sim.poke(address, qsfp::LAYOUT.tx_bias + 2 * ch, &BIAS);
    }
    sim.poke(address, 128, &[u8::from(Identifier::Qsfp28), 0xc0, 0x07]);
    sim.poke(address, qsfp::COMPLIANCE, &[0x80, 0, 0, 0, 0, 0, 0, 0]);
    sim.poke(address, 140, &[0xff]);
    sim.poke(address, 146, &[0x03]);
    sim.poke(address, 148, &text("ACME CORP.", 16));
    sim.poke(address, 165, &[0x00, 0x17, 0x6a]);
    sim.poke(address, 168, &text("QSFP28-100G-SR4", 16));
    sim.poke(address, 184, &text("A0", 2));
    sim.poke(address, 186, &[0x42, 0x68, 0x07, 0xd0]);
    sim.poke(address, qsfp::OPTIONS_CDR, &[0xc0, 0x30]);
    sim.poke(address, 196, &text("QSN0001", 16));
    sim.poke(address, 212, &text("230615", 8));
    sim.poke(address, 220, &[0x08]);
    install_qsfp_thresholds(sim, address, &qsfp::MAP, 3);
}

/// Install a QSFP28-DD module of the given memory map revision at
/// `address`.
pub fn install_qsfp_dd(sim: &SimBus, address: u8, revision: u8) {
    let layout = qsfp_dd::layout_for(QsfpCategory::QsfpDD, revision);
    sim.add_device(address);
    sim.poke(address, qsfp::IDENTIFIER, &[u8::from(Identifier::QsfpDD), revision, 0x00]);
    sim.poke(address, layout.temperature, &TEMPERATURE);
    sim.poke(address, layout.voltage, &VOLTAGE);
    for ch in 0..layout.channels {
        sim.poke(address, layout.rx_power + 2 * ch, &RX_POWER);
        sim.poke(address, layout.tx_bias + 2 * ch, &BIAS);
        if let Some(tx_power) = layout.tx_power {
            sim.poke(address, tx_power + 2 * ch, &TX_POWER);
        }
    }
    sim.poke(address, 128, &[u8::from(Identifier::QsfpDD)]);
    sim.poke(address, 129, &text("ACME DD", 16));
    sim.poke(address, 145, &[0x00, 0x17, 0x6a]);
    sim.poke(address, 148, &text("QSFP28-DD-2X100", 16));
    sim.poke(address, 164, &text("B1", 2));
    sim.poke(address, 166, &text("DDSN0002", 16));
    sim.poke(address, 182, &text("240301", 8));
    sim.poke(address, 202, &[0x43, 0x23]);
    sim.poke(address, qsfp::OPTIONS_CDR, &[0xc0, 0x30]);
    let page = layout.map.threshold_page.number().unwrap_or(3);
    install_qsfp_thresholds(sim, address, layout.map, page);
}

#[cfg(test)]
mod tests {
    use super::install_qsfp_dd;
    use super::SimBus;
    use super::SimOp;
    use crate::bus::BusError;
    use crate::bus::I2cBus;
    use media_messages::mailbox::MailboxPacket;
    use media_messages::ADDR_A0;

    #[test]
    fn test_upper_memory_follows_page_select() {
        let mut sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.poke_page(ADDR_A0, 3, 130, &[0x33]);
        sim.poke(ADDR_A0, 130, &[0x00]);
        let mut buf = [0u8; 1];
        sim.write(ADDR_A0, 127, &[3]).unwrap();
        sim.read(ADDR_A0, 130, &mut buf).unwrap();
        assert_eq!(buf[0], 0x33);
        sim.write(ADDR_A0, 127, &[0]).unwrap();
        sim.read(ADDR_A0, 130, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
        assert_eq!(sim.journal().len(), 4);
    }

    #[test]
    fn test_absent_device_nacks() {
        let mut sim = SimBus::new();
        let mut buf = [0u8; 1];
        assert!(matches!(sim.read(0x50, 0, &mut buf), Err(BusError::Nack)));
        assert_eq!(
            sim.journal(),
            vec![SimOp::Read {
                address: 0x50,
                offset: 0,
                len: 1
            }]
        );
    }

    #[test]
    fn test_mailbox_completes_after_busy_polls() {
        let mut sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.attach_mailbox(ADDR_A0);
        sim.mailbox_busy_polls(ADDR_A0, 2);
        sim.set_phy_register(ADDR_A0, 4, 0xe812, 0x3300);
        let packet = MailboxPacket::read(4, 0xe812);
        sim.write(ADDR_A0, 250, &packet.encode()).unwrap();
        let mut status = [0u8; 1];
        for expected in [0x00, 0x00, 0x04] {
            sim.read(ADDR_A0, 255, &mut status).unwrap();
            assert_eq!(status[0], expected);
        }
        assert_eq!(sim.peek(ADDR_A0, 253, 2), vec![0x33, 0x00]);
        assert_eq!(sim.mailbox_packets(ADDR_A0), vec![packet]);
    }

    #[test]
    fn test_register_device_words() {
        let mut sim = SimBus::new();
        sim.add_register_device(0x56);
        sim.write(0x56, 0x04, &[0x01, 0xe1]).unwrap();
        assert_eq!(sim.register(0x56, 0x04), Some(0x01e1));
        assert_eq!(sim.register(0x56, 0x05), None);
    }

    #[test]
    fn test_qsfp_dd_fixture_thresholds_follow_revision() {
        let sim = SimBus::new();
        install_qsfp_dd(&sim, ADDR_A0, 0x30);
        // Temperature high alarm of the rev 0x30 map lives on page 2.
        assert_eq!(sim.peek_page(ADDR_A0, 2, 128, 2), vec![0x50, 0x00]);
        assert_eq!(sim.peek(ADDR_A0, 14, 2), vec![0x1e, 0x00]);
    }
}
