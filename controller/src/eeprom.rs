// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The paged EEPROM engine shared by all module families.
//!
//! An [`EepromAddress`] names a device, a page and an offset. The engine
//! resolves the device against the module's configured address, switches
//! the page through the page select byte when the module supports paging,
//! performs the access, and always switches back to page 0 afterwards.
//! Modules without paging are accessed unpaged, whatever page was asked
//! for.
//!
//! All accesses happen inside a [`Selected`] scope, which holds the
//! module's [`Selection`] and observes the configured settle time before
//! the first transaction.

use crate::bus::Bus;
use crate::gpio::GpioLine;
use crate::probes;
use crate::selection::Selection;
use crate::selection::Selector;
use crate::Error;
use media_decode::regs::qsfp;
use media_decode::regs::sfp;
use media_decode::utils::extract_bit;
use media_messages::EepromAddress;
use media_messages::Page;
use media_messages::ADDR_A0;
use slog::debug;
use slog::warn;
use slog::Logger;
use std::time::Duration;

/// The number of addressable bytes behind one device address.
const ADDRESS_SPACE: usize = 256;

/// How a module family advertises and selects pages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PagingScheme {
    /// SFF-8636 and derived layouts: paged unless the flat memory bit of
    /// the status byte is set.
    Sff8636,
    /// SFF-8472: the diagnostic memory is paged when the serial ID options
    /// advertise it.
    Sff8472,
    /// Never paged.
    Flat,
}

/// The memory of one module.
#[derive(Debug)]
pub struct Eeprom {
    bus: Bus,
    address: u8,
    selector: Selector,
    settle: Duration,
    scheme: PagingScheme,
    presence: Option<GpioLine>,
    log: Logger,
}

impl Eeprom {
    pub fn new(
        bus: Bus,
        address: u8,
        selector: Selector,
        settle: Duration,
        scheme: PagingScheme,
        log: Logger,
    ) -> Self {
        Self {
            bus,
            address,
            selector,
            settle,
            scheme,
            presence: None,
            log,
        }
    }

    /// Refuse to select the module while `line` reports it absent.
    pub fn with_presence(mut self, line: GpioLine) -> Self {
        self.presence = Some(line);
        self
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configured device address of the module.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn scheme(&self) -> PagingScheme {
        self.scheme
    }

    /// Select the module and wait for it to settle.
    ///
    /// Fails with [`Error::NotPresent`], without touching the bus, if a
    /// presence line is configured and no module is inserted.
    pub fn select(&self) -> Result<Selected<'_>, Error> {
        if let Some(line) = &self.presence {
            if !line.read()? {
                return Err(Error::NotPresent);
            }
        }
        let selection = self.selector.select()?;
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        Ok(Selected {
            eeprom: self,
            _selection: selection,
        })
    }

    /// Select the module and read `buf.len()` bytes at `addr`.
    pub fn read(&self, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
        self.select()?.read(addr, buf)
    }

    /// Select the module and write `data` at `addr`.
    pub fn write(&self, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
        self.select()?.write(addr, data)
    }
}

/// A selected module.
///
/// The module stays selected, and the groups selecting it held, until this
/// is dropped.
pub struct Selected<'a> {
    eeprom: &'a Eeprom,
    _selection: Selection<'a>,
}

impl Selected<'_> {
    pub fn bus(&self) -> &Bus {
        &self.eeprom.bus
    }

    pub fn address(&self) -> u8 {
        self.eeprom.address
    }

    pub fn log(&self) -> &Logger {
        &self.eeprom.log
    }

    /// Return true if the module supports paged upper memory.
    pub fn paging_supported(&self) -> Result<bool, Error> {
        match self.eeprom.scheme {
            PagingScheme::Sff8636 => {
                let status = self.bus().read_byte(self.address(), qsfp::STATUS)?;
                Ok(!extract_bit(status, qsfp::STATUS_FLAT_MEM_BIT)?)
            }
            PagingScheme::Sff8472 => {
                let options = self.bus().read_byte(ADDR_A0, sfp::OPTIONS)?;
                Ok(extract_bit(options, sfp::OPTIONS_PAGING_BIT)?)
            }
            PagingScheme::Flat => Ok(false),
        }
    }

    /// Write the page select byte of `device`.
    pub fn select_page(&self, device: u8, page: u8) -> Result<(), Error> {
        probes::page__select!(|| (device, page));
        self.bus().write_byte(device, qsfp::PAGE_SELECT, page)
    }

    fn check_range(addr: &EepromAddress, len: usize) -> Result<(), Error> {
        if usize::from(addr.offset) + len > ADDRESS_SPACE {
            return Err(Error::InvalidArgument(format!(
                "access of {len} bytes at {addr} runs past the end of the device"
            )));
        }
        Ok(())
    }

    /// Run `op` with `page` selected on `device`, then restore page 0
    /// whatever the outcome of `op`.
    ///
    /// A failure to restore the page is logged, and never replaces the
    /// result of `op`.
    pub fn on_page<T>(
        &self,
        device: u8,
        page: u8,
        op: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.select_page(device, page)?;
        let result = op();
        if let Err(e) = self.select_page(device, 0) {
            warn!(
                self.log(),
                "failed to restore default page";
                "device" => device,
                "reason" => %e,
            );
        }
        result
    }

    // Run `op` against the resolved device, with the requested page
    // selected if the module is paged.
    fn paged<T>(
        &self,
        addr: EepromAddress,
        op: impl FnOnce(&Bus, u8) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let device = addr.device.resolve(self.address());
        match addr.page {
            Page::Select(page) if self.paging_supported()? => {
                self.on_page(device, page, || op(self.bus(), device))
            }
            Page::Select(page) => {
                debug!(
                    self.log(),
                    "paging not supported, accessing unpaged";
                    "page" => page,
                    "offset" => addr.offset,
                );
                op(self.bus(), device)
            }
            Page::Ignore => op(self.bus(), device),
        }
    }

    pub fn read(&self, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
        Self::check_range(&addr, buf.len())?;
        self.paged(addr, |bus, device| bus.read(device, addr.offset, buf))
    }

    pub fn write(&self, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
        Self::check_range(&addr, data.len())?;
        self.paged(addr, |bus, device| bus.write(device, addr.offset, data))
    }

    pub fn read_byte(&self, addr: EepromAddress) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_byte(&self, addr: EepromAddress, value: u8) -> Result<(), Error> {
        self.write(addr, &[value])
    }

    pub fn read_word(&self, addr: EepromAddress) -> Result<[u8; 2], Error> {
        let mut buf = [0u8; 2];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Read a byte of lower memory of the module's own address.
    pub fn lower_byte(&self, offset: u8) -> Result<u8, Error> {
        self.read_byte(EepromAddress::unpaged(offset))
    }

    /// Read-modify-write a byte, skipping the write when `f` leaves it
    /// unchanged. Returns the new value.
    pub fn modify(
        &self,
        addr: EepromAddress,
        f: impl FnOnce(u8) -> Result<u8, Error>,
    ) -> Result<u8, Error> {
        let old = self.read_byte(addr)?;
        let new = f(old)?;
        if new != old {
            self.write_byte(addr, new)?;
        }
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::Eeprom;
    use super::PagingScheme;
    use crate::bus::Bus;
    use crate::gpio::GpioLine;
    use crate::gpio::PinGroupHandle;
    use crate::selection::SelectTarget;
    use crate::selection::Selector;
    use crate::sim::SimBus;
    use crate::sim::SimOp;
    use crate::sim::SimPinGroup;
    use crate::Error;
    use media_messages::DeviceAddr;
    use media_messages::EepromAddress;
    use media_messages::Page;
    use media_messages::ADDR_A0;
    use media_messages::ADDR_A2;
    use std::time::Duration;

    fn qsfp_eeprom(sim: &SimBus) -> Eeprom {
        Eeprom::new(
            Bus::new("test", sim.clone()),
            ADDR_A0,
            Selector::default(),
            Duration::ZERO,
            PagingScheme::Sff8636,
            crate::sim::discard_logger(),
        )
    }

    #[test]
    fn test_paged_read_restores_page_zero() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.poke_page(ADDR_A0, 3, 128, &[0xaa, 0xbb]);
        let eeprom = qsfp_eeprom(&sim);
        let mut buf = [0u8; 2];
        eeprom.read(EepromAddress::paged(3, 128), &mut buf).unwrap();
        assert_eq!(buf, [0xaa, 0xbb]);
        assert_eq!(sim.current_page(ADDR_A0), 0);
        let writes: Vec<_> = sim
            .journal()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::Write { offset: 127, data, .. } => Some(data[0]),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![3, 0]);
    }

    #[test]
    fn test_page_restored_when_read_fails() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.fail_reads_at(ADDR_A0, 200);
        let eeprom = qsfp_eeprom(&sim);
        let mut buf = [0u8; 1];
        let err = eeprom.read(EepromAddress::paged(2, 200), &mut buf).unwrap_err();
        assert!(matches!(err, Error::Bus { offset: 200, .. }));
        assert_eq!(sim.current_page(ADDR_A0), 0);
    }

    #[test]
    fn test_flat_memory_is_accessed_unpaged() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        // Flat memory bit of the status byte.
        sim.poke(ADDR_A0, 2, &[0x04]);
        sim.poke(ADDR_A0, 130, &[0x07]);
        let eeprom = qsfp_eeprom(&sim);
        let s = eeprom.select().unwrap();
        assert!(!s.paging_supported().unwrap());
        assert_eq!(s.read_byte(EepromAddress::paged(3, 130)).unwrap(), 0x07);
        assert!(!sim
            .journal()
            .iter()
            .any(|op| matches!(op, SimOp::Write { offset: 127, .. })));
    }

    #[test]
    fn test_explicit_device_address() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.add_device(ADDR_A2);
        sim.poke(ADDR_A2, 96, &[0x19, 0x80]);
        let eeprom = qsfp_eeprom(&sim);
        let addr = EepromAddress {
            device: DeviceAddr::Explicit(ADDR_A2),
            page: Page::Ignore,
            offset: 96,
        };
        assert_eq!(eeprom.select().unwrap().read_word(addr).unwrap(), [0x19, 0x80]);
    }

    #[test]
    fn test_access_past_end_is_invalid() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        let eeprom = qsfp_eeprom(&sim);
        let mut buf = [0u8; 4];
        let err = eeprom.read(EepromAddress::unpaged(254), &mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_modify_skips_unchanged_write() {
        let sim = SimBus::new();
        sim.add_device(ADDR_A0);
        sim.poke(ADDR_A0, 87, &[0xaa]);
        let eeprom = qsfp_eeprom(&sim);
        let s = eeprom.select().unwrap();
        s.modify(EepromAddress::unpaged(87), |_| Ok(0xaa)).unwrap();
        assert!(sim.journal().iter().all(|op| matches!(op, SimOp::Read { .. })));
        assert_eq!(s.modify(EepromAddress::unpaged(87), |v| Ok(v | 0x01)).unwrap(), 0xab);
        assert_eq!(sim.peek(ADDR_A0, 87, 1), vec![0xab]);
    }

    #[test]
    fn test_selection_released_after_failed_access() {
        let sim = SimBus::new();
        let mux = SimPinGroup::new(0);
        let module = SimPinGroup::new(0);
        let eeprom = Eeprom::new(
            Bus::new("test", sim.clone()),
            ADDR_A0,
            Selector::new(
                Some(SelectTarget::new(PinGroupHandle::new("mux", mux.clone()), 1)),
                Some(SelectTarget::new(PinGroupHandle::new("module", module.clone()), 2)),
            ),
            Duration::ZERO,
            PagingScheme::Sff8636,
            crate::sim::discard_logger(),
        );
        // No device answers at the module address.
        assert!(eeprom.read(EepromAddress::paged(3, 128), &mut [0u8; 2]).is_err());
        assert_eq!(mux.acquired(), 1);
        assert_eq!(mux.released(), 1);
        assert_eq!(module.acquired(), 1);
        assert_eq!(module.released(), 1);
    }

    #[test]
    fn test_absent_module_is_never_selected() {
        let sim = SimBus::new();
        let presence = SimPinGroup::new(0);
        let module = SimPinGroup::new(0);
        let eeprom = Eeprom::new(
            Bus::new("test", sim.clone()),
            ADDR_A0,
            Selector::new(
                None,
                Some(SelectTarget::new(PinGroupHandle::new("module", module.clone()), 2)),
            ),
            Duration::ZERO,
            PagingScheme::Sff8636,
            crate::sim::discard_logger(),
        )
        .with_presence(GpioLine::new(PinGroupHandle::new("presence", presence), 0));
        let err = eeprom.read(EepromAddress::unpaged(0), &mut [0u8; 1]).unwrap_err();
        assert!(matches!(err, Error::NotPresent));
        assert_eq!(module.acquired(), 0);
        assert!(sim.journal().is_empty());
    }
}
