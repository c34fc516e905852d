// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Control of the 1000BASE-T PHY found in copper SFP modules.
//!
//! The PHY answers at its own I2C address with the usual clause 22
//! register set, as 16-bit big-endian words. QSFP breakouts carrying four
//! such PHYs put a channel mux in front of them, see
//! [`select_breakout_channel`].

use crate::bus::Bus;
use crate::check_channel;
use crate::Error;
use media_messages::media::PhyMode;
use media_messages::media::Speed;
use slog::debug;
use slog::trace;
use slog::Logger;
use std::time::Duration;

/// The I2C address of the PHY.
pub const PHY_ADDR: u8 = 0x56;

pub mod regs {
    pub const CONTROL: u8 = 0x00;
    pub const CONTROL_RESET: u16 = 1 << 15;
    pub const CONTROL_AUTONEG: u16 = 1 << 12;
    pub const CONTROL_POWER_DOWN: u16 = 1 << 11;

    pub const ADVERTISE: u8 = 0x04;
    pub const ADVERTISE_10_HD: u16 = 1 << 5;
    pub const ADVERTISE_10_FD: u16 = 1 << 6;
    pub const ADVERTISE_100_HD: u16 = 1 << 7;
    pub const ADVERTISE_100_FD: u16 = 1 << 8;

    pub const GIGABIT_CONTROL: u8 = 0x09;
    pub const ADVERTISE_1000_HD: u16 = 1 << 8;
    pub const ADVERTISE_1000_FD: u16 = 1 << 9;

    pub const PHY_CONTROL: u8 = 0x10;
    pub const MAC_INTERFACE_POWER_DOWN: u16 = 1 << 3;

    pub const EXT_STATUS_1: u8 = 0x11;
    pub const EXT_STATUS_LINK: u16 = 1 << 10;

    pub const EXT_STATUS_2: u8 = 0x1b;
    /// Selects SGMII to copper with clock, per the vendor application note.
    pub const SGMII_MODE: u16 = 0x9084;

    pub const EXT_ADDRESS: u8 = 0x1d;
    pub const EXT_PHY_CONTROL: u8 = 0x1e;
    pub const EXT_SERDES_CONTROL: u16 = 0x001f;
    pub const SERDES_ENABLE: u16 = 0x0000;
    pub const SERDES_DISABLE: u16 = 0x2001;
}

/// The address of the channel mux of a QSFP 4x1 1000BASE-T breakout.
pub const BREAKOUT_MUX_ADDR: u8 = 0x74;
const BREAKOUT_MUX_OFFSET: u8 = 0x00;
const BREAKOUT_CHANNELS: u8 = 4;

pub const fn default_serdes_delay() -> Duration {
    Duration::from_millis(100)
}

/// Route the bus of a selected QSFP breakout to the PHY of `channel`.
pub fn select_breakout_channel(bus: &Bus, channel: u8) -> Result<(), Error> {
    check_channel(channel, BREAKOUT_CHANNELS)?;
    bus.write_byte(BREAKOUT_MUX_ADDR, BREAKOUT_MUX_OFFSET, 1 << channel)
}

/// The PHY of a selected copper module.
pub struct CopperPhy<'a> {
    bus: &'a Bus,
    log: &'a Logger,
    serdes_delay: Duration,
}

impl<'a> CopperPhy<'a> {
    pub fn new(bus: &'a Bus, log: &'a Logger) -> Self {
        Self {
            bus,
            log,
            serdes_delay: default_serdes_delay(),
        }
    }

    /// Set the wait between selecting the serdes register and writing it.
    pub fn with_serdes_delay(mut self, delay: Duration) -> Self {
        self.serdes_delay = delay;
        self
    }

    pub fn read(&self, reg: u8) -> Result<u16, Error> {
        let value = self.bus.read_word_be(PHY_ADDR, reg)?;
        trace!(self.log, "phy read"; "reg" => reg, "value" => value);
        Ok(value)
    }

    pub fn write(&self, reg: u8, value: u16) -> Result<(), Error> {
        trace!(self.log, "phy write"; "reg" => reg, "value" => value);
        self.bus.write_word_be(PHY_ADDR, reg, value)
    }

    fn update(&self, reg: u8, f: impl FnOnce(u16) -> u16) -> Result<u16, Error> {
        let value = f(self.read(reg)?);
        self.write(reg, value)?;
        Ok(value)
    }

    /// Request a software reset, which applies pending configuration.
    pub fn soft_reset(&self) -> Result<(), Error> {
        self.update(regs::CONTROL, |v| v | regs::CONTROL_RESET)
            .map(|_| ())
    }

    // Configuration changes take effect on a software reset, which is
    // skipped while the PHY is powered down.
    fn apply(&self) -> Result<(), Error> {
        let control = self.read(regs::CONTROL)?;
        if control & regs::CONTROL_POWER_DOWN == 0 {
            self.soft_reset()
        } else {
            debug!(self.log, "phy powered down, deferring reset");
            Ok(())
        }
    }

    pub fn set_autoneg(&self, enable: bool) -> Result<(), Error> {
        self.update(regs::CONTROL, |v| {
            if enable {
                v | regs::CONTROL_AUTONEG
            } else {
                v & !regs::CONTROL_AUTONEG
            }
        })?;
        self.apply()
    }

    /// Set the MAC side interface mode.
    ///
    /// Only SGMII changes the PHY configuration; other modes leave it as
    /// strapped.
    pub fn set_mode(&self, mode: PhyMode) -> Result<(), Error> {
        self.update(regs::EXT_STATUS_2, |v| match mode {
            PhyMode::Sgmii => regs::SGMII_MODE,
            PhyMode::Mii | PhyMode::Gmii => v,
        })?;
        self.apply()
    }

    /// Advertise only `speed` in autonegotiation.
    pub fn set_speed(&self, speed: Speed) -> Result<(), Error> {
        let (base, gigabit) = match speed {
            Speed::Speed1G => (0, regs::ADVERTISE_1000_FD),
            Speed::Speed100M => (regs::ADVERTISE_100_FD | regs::ADVERTISE_10_FD, 0),
            Speed::Speed10M => (regs::ADVERTISE_10_FD, 0),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "copper PHY cannot run at {other}"
                )))
            }
        };
        let base_mask = regs::ADVERTISE_10_HD
            | regs::ADVERTISE_10_FD
            | regs::ADVERTISE_100_HD
            | regs::ADVERTISE_100_FD;
        self.update(regs::ADVERTISE, |v| (v & !base_mask) | base)?;
        let gigabit_mask = regs::ADVERTISE_1000_HD | regs::ADVERTISE_1000_FD;
        self.update(regs::GIGABIT_CONTROL, |v| (v & !gigabit_mask) | gigabit)?;
        Ok(())
    }

    /// Return the real-time link state.
    pub fn link_up(&self) -> Result<bool, Error> {
        Ok(self.read(regs::EXT_STATUS_1)? & regs::EXT_STATUS_LINK != 0)
    }

    /// Power the copper interface down or up.
    ///
    /// A powered-down MAC interface is first brought back up, so the PHY
    /// stays reachable.
    pub fn set_power_down(&self, enable: bool) -> Result<(), Error> {
        let control = self.read(regs::CONTROL)?;
        let phy_control = self.read(regs::PHY_CONTROL)?;
        if phy_control & regs::MAC_INTERFACE_POWER_DOWN != 0 {
            self.write(
                regs::PHY_CONTROL,
                phy_control & !regs::MAC_INTERFACE_POWER_DOWN,
            )?;
            self.soft_reset()?;
        }
        let powered_down = control & regs::CONTROL_POWER_DOWN != 0;
        if powered_down == enable {
            return Ok(());
        }
        let control = if enable {
            control | regs::CONTROL_POWER_DOWN
        } else {
            control & !regs::CONTROL_POWER_DOWN
        };
        self.write(regs::CONTROL, control)
    }

    /// Enable or disable the serdes transmitter and receiver.
    pub fn set_serdes(&self, enable: bool) -> Result<(), Error> {
        self.write(regs::EXT_ADDRESS, regs::EXT_SERDES_CONTROL)?;
        if !self.serdes_delay.is_zero() {
            std::thread::sleep(self.serdes_delay);
        }
        let value = if enable {
            regs::SERDES_ENABLE
        } else {
            regs::SERDES_DISABLE
        };
        self.write(regs::EXT_PHY_CONTROL, value)
    }
}

#[cfg(test)]
mod tests {
    use super::regs;
    use super::select_breakout_channel;
    use super::CopperPhy;
    use super::BREAKOUT_MUX_ADDR;
    use super::PHY_ADDR;
    use crate::bus::Bus;
    use crate::sim::discard_logger;
    use crate::sim::SimBus;
    use crate::sim::SimOp;
    use crate::Error;
    use media_messages::media::PhyMode;
    use media_messages::media::Speed;
    use std::time::Duration;

    fn setup() -> (SimBus, Bus) {
        let sim = SimBus::new();
        sim.add_register_device(PHY_ADDR);
        (sim.clone(), Bus::new("test", sim))
    }

    #[test]
    fn test_autoneg_resets_powered_phy() {
        let (sim, bus) = setup();
        let log = discard_logger();
        let phy = CopperPhy::new(&bus, &log);
        phy.set_autoneg(true).unwrap();
        let control = sim.register(PHY_ADDR, regs::CONTROL).unwrap();
        assert_eq!(control, regs::CONTROL_AUTONEG | regs::CONTROL_RESET);
    }

    #[test]
    fn test_autoneg_skips_reset_when_powered_down() {
        let (sim, bus) = setup();
        sim.set_register(
            PHY_ADDR,
            regs::CONTROL,
            regs::CONTROL_POWER_DOWN | regs::CONTROL_AUTONEG,
        );
        let log = discard_logger();
        CopperPhy::new(&bus, &log).set_autoneg(false).unwrap();
        assert_eq!(
            sim.register(PHY_ADDR, regs::CONTROL),
            Some(regs::CONTROL_POWER_DOWN)
        );
    }

    #[test]
    fn test_sgmii_mode() {
        let (sim, bus) = setup();
        let log = discard_logger();
        CopperPhy::new(&bus, &log).set_mode(PhyMode::Sgmii).unwrap();
        assert_eq!(sim.register(PHY_ADDR, regs::EXT_STATUS_2), Some(0x9084));
    }

    #[test]
    fn test_speed_advertisement() {
        let (sim, bus) = setup();
        sim.set_register(PHY_ADDR, regs::ADVERTISE, 0x01e1);
        sim.set_register(PHY_ADDR, regs::GIGABIT_CONTROL, 0x0300);
        let log = discard_logger();
        let phy = CopperPhy::new(&bus, &log);
        phy.set_speed(Speed::Speed100M).unwrap();
        assert_eq!(sim.register(PHY_ADDR, regs::ADVERTISE), Some(0x0141));
        assert_eq!(sim.register(PHY_ADDR, regs::GIGABIT_CONTROL), Some(0x0000));
        phy.set_speed(Speed::Speed1G).unwrap();
        assert_eq!(sim.register(PHY_ADDR, regs::ADVERTISE), Some(0x0001));
        assert_eq!(sim.register(PHY_ADDR, regs::GIGABIT_CONTROL), Some(0x0200));
        assert!(matches!(
            phy.set_speed(Speed::Speed10G),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_link_and_power_down() {
        let (sim, bus) = setup();
        sim.set_register(PHY_ADDR, regs::EXT_STATUS_1, regs::EXT_STATUS_LINK);
        sim.set_register(PHY_ADDR, regs::PHY_CONTROL, regs::MAC_INTERFACE_POWER_DOWN);
        let log = discard_logger();
        let phy = CopperPhy::new(&bus, &log);
        assert!(phy.link_up().unwrap());
        phy.set_power_down(true).unwrap();
        assert_eq!(sim.register(PHY_ADDR, regs::PHY_CONTROL), Some(0));
        let control = sim.register(PHY_ADDR, regs::CONTROL).unwrap();
        assert_ne!(control & regs::CONTROL_POWER_DOWN, 0);
    }

    #[test]
    fn test_serdes_control_sequence() {
        let (sim, bus) = setup();
        let log = discard_logger();
        CopperPhy::new(&bus, &log)
            .with_serdes_delay(Duration::ZERO)
            .set_serdes(false)
            .unwrap();
        let writes: Vec<_> = sim
            .journal()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::Write { offset, data, .. } => Some((offset, data)),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                (regs::EXT_ADDRESS, vec![0x00, 0x1f]),
                (regs::EXT_PHY_CONTROL, vec![0x20, 0x01]),
            ]
        );
    }

    #[test]
    fn test_breakout_channel_select() {
        let sim = SimBus::new();
        sim.add_register_device(BREAKOUT_MUX_ADDR);
        let bus = Bus::new("test", sim.clone());
        select_breakout_channel(&bus, 2).unwrap();
        assert_eq!(sim.register(BREAKOUT_MUX_ADDR, 0), Some(0x04));
        assert!(matches!(
            select_breakout_channel(&bus, 4),
            Err(Error::InvalidArgument(_))
        ));
    }
}
