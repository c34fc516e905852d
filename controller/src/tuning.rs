// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Wavelength tuning of SFF-8690 tunable SFP modules.

use crate::eeprom::Selected;
use crate::Error;
use media_decode::regs::sfp;
use media_decode::regs::sfp::tunable;
use media_decode::tuning::tuning_settled;
use media_decode::tuning::wavelength_nm_to_thz;
use media_decode::tuning::wavelength_word;
use media_decode::utils::extract_bit;
use media_decode::TunableCapability;
use media_messages::DeviceAddr;
use media_messages::EepromAddress;
use media_messages::Page;
use media_messages::ADDR_A0;
use media_messages::ADDR_A2;
use slog::debug;
use slog::warn;
use std::time::Duration;
use std::time::Instant;

pub const fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

pub const fn default_poll_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Polling schedule of the tuning status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TuningTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for TuningTiming {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

/// How a module was asked to tune.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TuneRequest {
    /// A 1-based channel of the module's grid.
    Channel(u16),
    /// A wavelength, in units of 0.05 nm.
    Wavelength(u16),
}

/// The outcome of a successful tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuned {
    pub frequency_thz: f64,
    pub request: TuneRequest,
}

// Addresses on the tunable page, which the caller has already selected.
const fn tunable_addr(offset: u8) -> EepromAddress {
    EepromAddress {
        device: DeviceAddr::Explicit(ADDR_A2),
        page: Page::Ignore,
        offset,
    }
}

/// Return true if the serial ID advertises a tunable transmitter.
pub fn is_tunable(sel: &Selected<'_>) -> Result<bool, Error> {
    let options = sel.read_byte(EepromAddress {
        device: DeviceAddr::Explicit(ADDR_A0),
        page: Page::Ignore,
        offset: sfp::OPTIONS_TUNABLE,
    })?;
    Ok(extract_bit(options, sfp::TUNABLE_BIT)?)
}

/// Read the tuning range of a module, with the tunable page selected.
fn read_capability(sel: &Selected<'_>) -> Result<TunableCapability, Error> {
    let support = sel.read_byte(tunable_addr(tunable::TUNING_SUPPORT))?;
    let mut block = [0u8; tunable::CAPABILITIES_LEN];
    sel.read(tunable_addr(tunable::CAPABILITIES), &mut block)?;
    Ok(TunableCapability::parse(&block, support)?)
}

/// Read the tuning range of a tunable module.
pub fn capability(sel: &Selected<'_>) -> Result<TunableCapability, Error> {
    if !is_tunable(sel)? || !sel.paging_supported()? {
        return Err(Error::NotSupported);
    }
    sel.on_page(ADDR_A2, tunable::PAGE, || read_capability(sel))
}

/// Tune a module to `wavelength_nm`.
///
/// Channel tuning is used when the module supports it, and otherwise the
/// wavelength is written directly. The module is then polled until both
/// its current and latched status report a locked wavelength without
/// fault, or until `timing.timeout` elapses.
pub fn set_wavelength(
    sel: &Selected<'_>,
    wavelength_nm: f64,
    timing: TuningTiming,
) -> Result<Tuned, Error> {
    if !wavelength_nm.is_finite() || wavelength_nm <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "invalid wavelength {wavelength_nm} nm"
        )));
    }
    if !is_tunable(sel)? || !sel.paging_supported()? {
        return Err(Error::NotSupported);
    }
    sel.on_page(ADDR_A2, tunable::PAGE, || {
        let cap = read_capability(sel)?;
        let frequency_thz = wavelength_nm_to_thz(wavelength_nm);
        if !cap.contains(frequency_thz) {
            return Err(Error::InvalidArgument(format!(
                "{frequency_thz:.3} THz outside the tuning range {:.3} to {:.3} THz",
                cap.min_thz, cap.max_thz,
            )));
        }
        let request = if cap.channel_tuning {
            let channel = cap.channel_for(frequency_thz);
            sel.write(tunable_addr(tunable::CHANNEL_SET), &channel.to_be_bytes())?;
            TuneRequest::Channel(channel)
        } else if cap.wavelength_tuning {
            let word = wavelength_word(wavelength_nm);
            sel.write(tunable_addr(tunable::WAVELENGTH_SET), &word.to_be_bytes())?;
            TuneRequest::Wavelength(word)
        } else {
            return Err(Error::NotSupported);
        };
        debug!(
            sel.log(),
            "tuning requested";
            "frequency_thz" => frequency_thz,
            "request" => ?request,
        );
        wait_settled(sel, timing)?;
        Ok(Tuned {
            frequency_thz,
            request,
        })
    })
}

fn wait_settled(sel: &Selected<'_>, timing: TuningTiming) -> Result<(), Error> {
    let start = Instant::now();
    loop {
        let status = sel.read_byte(tunable_addr(tunable::STATUS))?;
        let latched = sel.read_byte(tunable_addr(tunable::LATCHED_STATUS))?;
        if tuning_settled(status, latched) {
            return Ok(());
        }
        if start.elapsed() >= timing.timeout {
            warn!(
                sel.log(),
                "wavelength did not settle";
                "status" => status,
                "latched" => latched,
            );
            return Err(Error::Timeout(timing.timeout));
        }
        std::thread::sleep(timing.interval);
    }
}

/// Write the target wavelength of a module without paged tuning support,
/// in units of 0.05 nm.
pub fn set_target_wavelength(sel: &Selected<'_>, wavelength_nm: f64) -> Result<(), Error> {
    if !is_tunable(sel)? {
        return Err(Error::NotSupported);
    }
    let word = wavelength_word(wavelength_nm);
    sel.write(
        EepromAddress {
            device: DeviceAddr::Explicit(ADDR_A2),
            page: Page::Ignore,
            offset: sfp::TARGET_WAVELENGTH,
        },
        &word.to_be_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::capability;
    use super::set_target_wavelength;
    use super::set_wavelength;
    use super::TuneRequest;
    use super::TuningTiming;
    use crate::bus::Bus;
    use crate::eeprom::Eeprom;
    use crate::eeprom::PagingScheme;
    use crate::selection::Selector;
    use crate::sim::discard_logger;
    use crate::sim::install_sfp;
    use crate::sim::install_tunable_sfp;
    use crate::sim::SimBus;
    use crate::sim::SimOp;
    use crate::Error;
    use media_decode::regs::sfp::tunable;
    use media_messages::ADDR_A0;
    use media_messages::ADDR_A2;
    use std::time::Duration;

    fn eeprom(sim: &SimBus) -> Eeprom {
        Eeprom::new(
            Bus::new("test", sim.clone()),
            ADDR_A0,
            Selector::default(),
            Duration::ZERO,
            PagingScheme::Sff8472,
            discard_logger(),
        )
    }

    fn fast() -> TuningTiming {
        TuningTiming {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
        }
    }

    fn writes_to(sim: &SimBus, offset: u8) -> Vec<Vec<u8>> {
        sim.journal()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::Write {
                    address: ADDR_A2,
                    offset: o,
                    data,
                } if o == offset => Some(data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_capability_block() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let e = eeprom(&sim);
        let cap = capability(&e.select().unwrap()).unwrap();
        assert_eq!(cap.min_thz, 191.0);
        assert_eq!(cap.max_thz, 196.0);
        assert_eq!(cap.channels, 101);
        assert!(cap.channel_tuning);
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_tune_by_channel() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let e = eeprom(&sim);
        let tuned = set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap();
        assert!((tuned.frequency_thz - 193.4).abs() < 0.01);
        assert_eq!(tuned.request, TuneRequest::Channel(49));
        assert_eq!(
            sim.peek_page(ADDR_A2, tunable::PAGE, tunable::CHANNEL_SET, 2),
            vec![0, 49]
        );
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_tune_by_wavelength() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        // Wavelength tuning only.
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::TUNING_SUPPORT, &[0x01]);
        let e = eeprom(&sim);
        let tuned = set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap();
        assert_eq!(tuned.request, TuneRequest::Wavelength(31002));
        assert!(writes_to(&sim, tunable::CHANNEL_SET).is_empty());
    }

    #[test]
    fn test_out_of_range_rejected_before_write() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let e = eeprom(&sim);
        let err = set_wavelength(&e.select().unwrap(), 1000.0, fast()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(writes_to(&sim, tunable::CHANNEL_SET).is_empty());
        assert!(writes_to(&sim, tunable::WAVELENGTH_SET).is_empty());
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_latched_fault_times_out_and_restores_page() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        // Wavelength unlocked, latched.
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::LATCHED_STATUS, &[0x20]);
        let e = eeprom(&sim);
        let err = set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_new_channel_acquired_settles() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::LATCHED_STATUS, &[0x08]);
        let e = eeprom(&sim);
        let tuned = set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap();
        assert_eq!(tuned.request, TuneRequest::Channel(49));
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_unmasked_status_bits_are_ignored() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        // Bit 7 and bits 2:0 of both bytes carry no fault.
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::STATUS, &[0x87]);
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::LATCHED_STATUS, &[0x8f]);
        let e = eeprom(&sim);
        set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap();
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_tuning_in_progress_times_out() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        sim.poke_page(ADDR_A2, tunable::PAGE, tunable::STATUS, &[0x10]);
        let e = eeprom(&sim);
        let err = set_wavelength(&e.select().unwrap(), 1550.12, fast()).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_fixed_module_not_supported() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let e = eeprom(&sim);
        let s = e.select().unwrap();
        assert!(set_wavelength(&s, 1550.12, fast()).unwrap_err().is_not_supported());
        assert!(set_target_wavelength(&s, 1550.12).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_target_wavelength_word() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let e = eeprom(&sim);
        set_target_wavelength(&e.select().unwrap(), 1550.0).unwrap();
        assert_eq!(sim.peek(ADDR_A2, 146, 2), vec![0x79, 0x18]);
    }
}
