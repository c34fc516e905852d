// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Driver for SFP, SFP+ and SFP28 cages.
//!
//! The serial ID is read from A0h and the diagnostics from A2h, per
//! SFF-8472. Transmitter and status lines are used through GPIO when the
//! platform wires them, and otherwise through the soft control and status
//! byte of the diagnostic memory, when the module implements it.
//!
//! The same driver serves an SFP module sitting in a QSFP cage behind a QSA
//! adapter, in which case it is owned by the QSFP driver.

use crate::aquantia::Aquantia;
use crate::aquantia::LineStatus;
use crate::aquantia::SystemStatus;
use crate::bus::Bus;
use crate::check_channel;
use crate::config::DeviceConfig;
use crate::copper::CopperPhy;
use crate::eeprom::Eeprom;
use crate::eeprom::PagingScheme;
use crate::eeprom::Selected;
use crate::gpio::GpioLine;
use crate::mailbox::Mailbox;
use crate::media::MediaControl;
use crate::tuning;
use crate::tuning::TuningTiming;
use crate::Error;
use media_decode::regs::sfp;
use media_decode::units;
use media_decode::units::Calibration;
use media_decode::units::RxPowerCalibration;
use media_decode::units::RX_POWER_COEFFS_LEN;
use media_decode::utils::assign_bit;
use media_decode::utils::be_uint;
use media_decode::utils::extract_bit;
use media_decode::vendor::decode_field;
use media_decode::TransceiverCode;
use media_messages::mailbox::MailboxPacket;
use media_messages::media::ChannelMonitor;
use media_messages::media::FeatureSupport;
use media_messages::media::MediaType;
use media_messages::media::ModuleMonitor;
use media_messages::media::Parameter;
use media_messages::media::PhyMode;
use media_messages::media::PortInfo;
use media_messages::media::Quantity;
use media_messages::media::SfpFeatures;
use media_messages::media::Speed;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::status::reduce_flags;
use media_messages::ChannelMonitorStatus;
use media_messages::ChannelStatus;
use media_messages::EepromAddress;
use media_messages::ModuleStatus;
use media_messages::ADDR_A2;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;

/// SFP cages carry a single channel.
const CHANNELS: u8 = 1;

const MODULE_ALARMS: ModuleStatus = ModuleStatus::TEMP_HIGH_ALARM
    .union(ModuleStatus::TEMP_LOW_ALARM)
    .union(ModuleStatus::VOLT_HIGH_ALARM)
    .union(ModuleStatus::VOLT_LOW_ALARM);

const CHANNEL_TX_ALARMS: ChannelMonitorStatus = ChannelMonitorStatus::TX_BIAS_HIGH_ALARM
    .union(ChannelMonitorStatus::TX_BIAS_LOW_ALARM)
    .union(ChannelMonitorStatus::TX_PWR_HIGH_ALARM)
    .union(ChannelMonitorStatus::TX_PWR_LOW_ALARM);

const CHANNEL_RX_ALARMS: ChannelMonitorStatus =
    ChannelMonitorStatus::RX_PWR_HIGH_ALARM.union(ChannelMonitorStatus::RX_PWR_LOW_ALARM);

const CHANNEL_TX_WARNINGS: ChannelMonitorStatus = ChannelMonitorStatus::TX_BIAS_HIGH_WARNING
    .union(ChannelMonitorStatus::TX_BIAS_LOW_WARNING)
    .union(ChannelMonitorStatus::TX_PWR_HIGH_WARNING)
    .union(ChannelMonitorStatus::TX_PWR_LOW_WARNING);

const CHANNEL_RX_WARNINGS: ChannelMonitorStatus =
    ChannelMonitorStatus::RX_PWR_HIGH_WARNING.union(ChannelMonitorStatus::RX_PWR_LOW_WARNING);

// An unpaged address in the diagnostic memory.
const fn diag(offset: u8) -> EepromAddress {
    EepromAddress::unpaged(offset).with_device(ADDR_A2)
}

/// How the diagnostic monitors of a module are calibrated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CalibrationKind {
    Internal,
    External,
}

/// A module in an SFP cage.
#[derive(Debug)]
pub struct Sfp {
    config: DeviceConfig,
    eeprom: Eeprom,
    aquantia: Aquantia,
    tuning: TuningTiming,
    log: Logger,
}

impl Sfp {
    pub fn new(bus: Bus, config: DeviceConfig, log: &Logger) -> Self {
        let log = log.new(o!(
            "cage" => config.alias.clone(),
            "driver" => "sfp",
        ));
        let eeprom = Eeprom::new(
            bus,
            config.address,
            config.selector.clone(),
            config.select_delay,
            PagingScheme::Sff8472,
            log.clone(),
        )
        .with_presence(config.presence.clone());
        Self {
            config,
            eeprom,
            aquantia: Aquantia::default(),
            tuning: TuningTiming::default(),
            log,
        }
    }

    /// Use `mailbox` to reach the PHY of a 10GBASE-T module.
    pub fn with_mailbox(mut self, mailbox: Mailbox) -> Self {
        self.aquantia = Aquantia::new(mailbox);
        self
    }

    pub fn with_aquantia(mut self, aquantia: Aquantia) -> Self {
        self.aquantia = aquantia;
        self
    }

    pub fn with_tuning_timing(mut self, timing: TuningTiming) -> Self {
        self.tuning = timing;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    fn enhanced_options(sel: &Selected<'_>) -> Result<u8, Error> {
        sel.lower_byte(sfp::ENHANCED_OPTIONS)
    }

    fn alarm_flags_supported(sel: &Selected<'_>) -> Result<bool, Error> {
        Ok(extract_bit(
            Self::enhanced_options(sel)?,
            sfp::ENHANCED_ALARM_BIT,
        )?)
    }

    // Check that the module implements digital diagnostics, and report how
    // they are calibrated.
    fn calibration_kind(sel: &Selected<'_>) -> Result<CalibrationKind, Error> {
        let diag_type = sel.lower_byte(sfp::DIAG_MON_TYPE)?;
        if !extract_bit(diag_type, sfp::DIAG_DDM_BIT)? {
            return Err(Error::NotSupported);
        }
        if extract_bit(diag_type, sfp::DIAG_EXTERNAL_CAL_BIT)? {
            Ok(CalibrationKind::External)
        } else if extract_bit(diag_type, sfp::DIAG_INTERNAL_CAL_BIT)? {
            Ok(CalibrationKind::Internal)
        } else {
            debug!(
                sel.log(),
                "module reports no calibration type";
                "diag_mon_type" => diag_type,
            );
            Err(Error::NotSupported)
        }
    }

    fn scalar_calibration(
        sel: &Selected<'_>,
        kind: CalibrationKind,
        offset: u8,
    ) -> Result<Calibration, Error> {
        match kind {
            CalibrationKind::Internal => Ok(Calibration::Internal),
            CalibrationKind::External => {
                let mut buf = [0u8; 4];
                sel.read(diag(offset), &mut buf)?;
                Ok(Calibration::external_from_bytes(&buf)?)
            }
        }
    }

    fn rx_power_calibration(
        sel: &Selected<'_>,
        kind: CalibrationKind,
    ) -> Result<RxPowerCalibration, Error> {
        match kind {
            CalibrationKind::Internal => Ok(RxPowerCalibration::Internal),
            CalibrationKind::External => {
                let mut buf = [0u8; RX_POWER_COEFFS_LEN];
                sel.read(diag(sfp::RX_POWER_CAL), &mut buf)?;
                Ok(RxPowerCalibration::external_from_bytes(&buf)?)
            }
        }
    }

    // Convert a raw monitor or threshold word. Optical powers are in dBm.
    fn convert(
        sel: &Selected<'_>,
        kind: CalibrationKind,
        quantity: Quantity,
        raw: [u8; 2],
    ) -> Result<f64, Error> {
        let value = match quantity {
            Quantity::Temperature => units::temperature(
                raw,
                &Self::scalar_calibration(sel, kind, sfp::TEMPERATURE_CAL)?,
            ),
            Quantity::Voltage => {
                units::voltage(raw, &Self::scalar_calibration(sel, kind, sfp::VOLTAGE_CAL)?)
            }
            Quantity::TxBias => units::bias_current(
                raw,
                &Self::scalar_calibration(sel, kind, sfp::TX_BIAS_CAL)?,
            ),
            Quantity::TxPower => units::mw_to_dbm(units::tx_power_mw(
                raw,
                &Self::scalar_calibration(sel, kind, sfp::TX_POWER_CAL)?,
            )),
            Quantity::RxPower => units::mw_to_dbm(units::rx_power_mw(
                raw,
                &Self::rx_power_calibration(sel, kind)?,
            )),
        };
        Ok(value)
    }

    fn read_monitor(&self, offset: u8, quantity: Quantity) -> Result<f64, Error> {
        let sel = self.eeprom.select()?;
        let kind = Self::calibration_kind(&sel)?;
        let raw = sel.read_word(diag(offset))?;
        Self::convert(&sel, kind, quantity, raw)
    }

    // Read the soft status byte, or `None` if the module implements no
    // enhanced options.
    fn soft_status(sel: &Selected<'_>) -> Result<(u8, Option<u8>), Error> {
        let options = Self::enhanced_options(sel)?;
        if options == 0 {
            return Ok((options, None));
        }
        let status = sel.read_byte(diag(sfp::STATUS_CONTROL))?;
        Ok((options, Some(status)))
    }

    // Evaluate one channel condition from its GPIO line, or from the soft
    // status byte if the module advertises the bit.
    fn line_or_soft(
        line: Option<&GpioLine>,
        soft: (u8, Option<u8>),
        support_bit: u8,
        state_bit: u8,
    ) -> Result<bool, Error> {
        if let Some(line) = line {
            return line.read();
        }
        match soft {
            (options, Some(status)) if extract_bit(options, support_bit)? => {
                Ok(extract_bit(status, state_bit)?)
            }
            _ => Err(Error::NotSupported),
        }
    }

    fn copper<T>(&self, f: impl FnOnce(&CopperPhy<'_>) -> Result<T, Error>) -> Result<T, Error> {
        let sel = self.eeprom.select()?;
        let phy = CopperPhy::new(sel.bus(), sel.log());
        f(&phy)
    }

    fn aquantia<T>(
        &self,
        f: impl FnOnce(&Aquantia, &Selected<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let sel = self.eeprom.select()?;
        f(&self.aquantia, &sel)
    }
}

impl MediaControl for Sfp {
    fn presence(&self) -> Result<bool, Error> {
        self.config.presence.read()
    }

    fn module_init(&mut self, _present: bool) -> Result<(), Error> {
        Ok(())
    }

    fn module_monitor_status(&self, flags: ModuleStatus) -> Result<ModuleStatus, Error> {
        let sel = self.eeprom.select()?;
        if !Self::alarm_flags_supported(&sel)? {
            return Err(Error::NotSupported);
        }
        let alarms = if flags.intersects(MODULE_ALARMS) {
            sel.read_byte(diag(sfp::ALARM_FLAGS))?
        } else {
            0
        };
        let warnings = if flags.intersects(!MODULE_ALARMS) {
            sel.read_byte(diag(sfp::WARNING_FLAGS))?
        } else {
            0
        };
        let temp = reduce_flags(
            alarms & sfp::FLAG_TEMP_HIGH != 0,
            alarms & sfp::FLAG_TEMP_LOW != 0,
            warnings & sfp::FLAG_TEMP_HIGH != 0,
            warnings & sfp::FLAG_TEMP_LOW != 0,
            [
                ModuleStatus::TEMP_HIGH_ALARM,
                ModuleStatus::TEMP_LOW_ALARM,
                ModuleStatus::TEMP_HIGH_WARNING,
                ModuleStatus::TEMP_LOW_WARNING,
            ],
        );
        let volt = reduce_flags(
            alarms & sfp::FLAG_VOLT_HIGH != 0,
            alarms & sfp::FLAG_VOLT_LOW != 0,
            warnings & sfp::FLAG_VOLT_HIGH != 0,
            warnings & sfp::FLAG_VOLT_LOW != 0,
            [
                ModuleStatus::VOLT_HIGH_ALARM,
                ModuleStatus::VOLT_LOW_ALARM,
                ModuleStatus::VOLT_HIGH_WARNING,
                ModuleStatus::VOLT_LOW_WARNING,
            ],
        );
        Ok((temp | volt) & flags)
    }

    fn channel_monitor_status(
        &self,
        channel: u8,
        flags: ChannelMonitorStatus,
    ) -> Result<ChannelMonitorStatus, Error> {
        check_channel(channel, CHANNELS)?;
        let sel = self.eeprom.select()?;
        if !Self::alarm_flags_supported(&sel)? {
            return Err(Error::NotSupported);
        }
        let read_if = |wanted: ChannelMonitorStatus, offset: u8| -> Result<u8, Error> {
            if flags.intersects(wanted) {
                sel.read_byte(diag(offset))
            } else {
                Ok(0)
            }
        };
        let tx_alarm = read_if(CHANNEL_TX_ALARMS, sfp::ALARM_FLAGS)?;
        let rx_alarm = read_if(CHANNEL_RX_ALARMS, sfp::ALARM_FLAGS + 1)?;
        let tx_warn = read_if(CHANNEL_TX_WARNINGS, sfp::WARNING_FLAGS)?;
        let rx_warn = read_if(CHANNEL_RX_WARNINGS, sfp::WARNING_FLAGS + 1)?;

        let bias = reduce_flags(
            tx_alarm & sfp::FLAG_BIAS_HIGH != 0,
            tx_alarm & sfp::FLAG_BIAS_LOW != 0,
            tx_warn & sfp::FLAG_BIAS_HIGH != 0,
            tx_warn & sfp::FLAG_BIAS_LOW != 0,
            [
                ChannelMonitorStatus::TX_BIAS_HIGH_ALARM,
                ChannelMonitorStatus::TX_BIAS_LOW_ALARM,
                ChannelMonitorStatus::TX_BIAS_HIGH_WARNING,
                ChannelMonitorStatus::TX_BIAS_LOW_WARNING,
            ],
        );
        let tx_power = reduce_flags(
            tx_alarm & sfp::FLAG_TX_POWER_HIGH != 0,
            tx_alarm & sfp::FLAG_TX_POWER_LOW != 0,
            tx_warn & sfp::FLAG_TX_POWER_HIGH != 0,
            tx_warn & sfp::FLAG_TX_POWER_LOW != 0,
            [
                ChannelMonitorStatus::TX_PWR_HIGH_ALARM,
                ChannelMonitorStatus::TX_PWR_LOW_ALARM,
                ChannelMonitorStatus::TX_PWR_HIGH_WARNING,
                ChannelMonitorStatus::TX_PWR_LOW_WARNING,
            ],
        );
        let rx_power = reduce_flags(
            rx_alarm & sfp::FLAG_RX_POWER_HIGH != 0,
            rx_alarm & sfp::FLAG_RX_POWER_LOW != 0,
            rx_warn & sfp::FLAG_RX_POWER_HIGH != 0,
            rx_warn & sfp::FLAG_RX_POWER_LOW != 0,
            [
                ChannelMonitorStatus::RX_PWR_HIGH_ALARM,
                ChannelMonitorStatus::RX_PWR_LOW_ALARM,
                ChannelMonitorStatus::RX_PWR_HIGH_WARNING,
                ChannelMonitorStatus::RX_PWR_LOW_WARNING,
            ],
        );
        Ok((bias | tx_power | rx_power) & flags)
    }

    fn channel_status(&self, channel: u8, flags: ChannelStatus) -> Result<ChannelStatus, Error> {
        check_channel(channel, CHANNELS)?;
        if flags.contains(ChannelStatus::TX_LOSS) {
            return Err(Error::NotSupported);
        }
        let config = &self.config;
        let all_wired =
            config.tx_control.is_some() && config.rx_los.is_some() && config.tx_fault.is_some();
        let soft = if all_wired {
            (0, None)
        } else {
            let sel = self.eeprom.select()?;
            Self::soft_status(&sel)?
        };

        let mut status = ChannelStatus::empty();
        if flags.contains(ChannelStatus::TX_DISABLE)
            && Self::line_or_soft(
                config.tx_control.as_ref(),
                soft,
                sfp::ENHANCED_SOFT_TX_DISABLE_BIT,
                sfp::STATUS_TX_DISABLE_STATE_BIT,
            )?
        {
            status |= ChannelStatus::TX_DISABLE;
        }
        if flags.contains(ChannelStatus::TX_FAULT)
            && Self::line_or_soft(
                config.tx_fault.as_ref(),
                soft,
                sfp::ENHANCED_SOFT_TX_FAULT_BIT,
                sfp::STATUS_TX_FAULT_BIT,
            )?
        {
            status |= ChannelStatus::TX_FAULT;
        }
        if flags.contains(ChannelStatus::RX_LOSS)
            && Self::line_or_soft(
                config.rx_los.as_ref(),
                soft,
                sfp::ENHANCED_SOFT_RX_LOS_BIT,
                sfp::STATUS_RX_LOS_BIT,
            )?
        {
            status |= ChannelStatus::RX_LOSS;
        }
        Ok(status)
    }

    fn tx_control(&self, channel: u8, enable: bool) -> Result<(), Error> {
        check_channel(channel, CHANNELS)?;
        if let Some(line) = &self.config.tx_control {
            // The line disables the transmitter when set.
            return line.write(!enable);
        }
        let sel = self.eeprom.select()?;
        if !extract_bit(
            Self::enhanced_options(&sel)?,
            sfp::ENHANCED_SOFT_TX_DISABLE_BIT,
        )? {
            return Err(Error::NotSupported);
        }
        sel.modify(diag(sfp::STATUS_CONTROL), |status| {
            Ok(assign_bit(status, sfp::STATUS_SOFT_TX_DISABLE_BIT, !enable)?)
        })?;
        debug!(self.log, "soft tx control"; "enable" => enable);
        Ok(())
    }

    fn tx_control_status(&self, channel: u8) -> Result<bool, Error> {
        check_channel(channel, CHANNELS)?;
        if let Some(line) = &self.config.tx_control {
            return Ok(!line.read()?);
        }
        let sel = self.eeprom.select()?;
        if !extract_bit(
            Self::enhanced_options(&sel)?,
            sfp::ENHANCED_SOFT_TX_DISABLE_BIT,
        )? {
            return Err(Error::NotSupported);
        }
        let status = sel.read_byte(diag(sfp::STATUS_CONTROL))?;
        Ok(!extract_bit(status, sfp::STATUS_SOFT_TX_DISABLE_BIT)?)
    }

    fn speed(&self) -> Result<Speed, Error> {
        Ok(self.config.port_type.capability())
    }

    fn parameter(&self, param: Parameter) -> Result<u32, Error> {
        let info = (sfp::MAP.param)(param);
        if !info.is_supported() {
            debug!(self.log, "parameter not in memory map"; "param" => ?param);
            return Err(Error::NotSupported);
        }
        let mut buf = vec![0u8; usize::from(info.size)];
        self.eeprom
            .read(EepromAddress::unpaged(info.offset), &mut buf)?;
        Ok(be_uint(&buf)?)
    }

    fn vendor_info(&self, field: VendorField) -> Result<String, Error> {
        let info = (sfp::MAP.vendor)(field);
        let mut buf = vec![0u8; info.vendor_read_len()];
        self.eeprom
            .read(EepromAddress::unpaged(info.offset), &mut buf)?;
        Ok(decode_field(&buf, &info))
    }

    fn transceiver_code(&self) -> Result<TransceiverCode, Error> {
        let mut buf = [0u8; sfp::COMPLIANCE_LEN];
        self.eeprom
            .read(EepromAddress::unpaged(sfp::COMPLIANCE), &mut buf)?;
        Ok(TransceiverCode::from_sfp(&buf)?)
    }

    fn threshold(&self, threshold: Threshold) -> Result<f64, Error> {
        let Some((addr, _)) = sfp::MAP.threshold_address(threshold) else {
            return Err(Error::NotSupported);
        };
        let sel = self.eeprom.select()?;
        let kind = Self::calibration_kind(&sel)?;
        let raw = sel.read_word(addr)?;
        Self::convert(&sel, kind, threshold.quantity(), raw)
    }

    fn module_monitor(&self, monitor: ModuleMonitor) -> Result<f64, Error> {
        match monitor {
            ModuleMonitor::Temperature => {
                self.read_monitor(sfp::TEMPERATURE, Quantity::Temperature)
            }
            ModuleMonitor::Voltage => self.read_monitor(sfp::VOLTAGE, Quantity::Voltage),
        }
    }

    fn channel_monitor(&self, channel: u8, monitor: ChannelMonitor) -> Result<f64, Error> {
        check_channel(channel, CHANNELS)?;
        match monitor {
            ChannelMonitor::RxPower => self.read_monitor(sfp::RX_POWER, Quantity::RxPower),
            ChannelMonitor::TxBias => self.read_monitor(sfp::TX_BIAS, Quantity::TxBias),
            ChannelMonitor::TxPower => self.read_monitor(sfp::TX_POWER, Quantity::TxPower),
        }
    }

    fn feature_support(&self) -> Result<FeatureSupport, Error> {
        let sel = self.eeprom.select()?;
        let options = Self::enhanced_options(&sel)?;
        let diag_type = sel.lower_byte(sfp::DIAG_MON_TYPE)?;
        Ok(FeatureSupport::Sfp(SfpFeatures {
            rate_select: extract_bit(options, sfp::ENHANCED_RATE_SELECT_BIT)?,
            alarm_warning: extract_bit(options, sfp::ENHANCED_ALARM_BIT)?,
            diag_monitoring: extract_bit(diag_type, sfp::DIAG_DDM_BIT)?,
        }))
    }

    fn read_generic(&self, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
        self.eeprom.read(addr, buf)
    }

    fn write_generic(&self, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
        self.eeprom.write(addr, data)
    }

    fn led_set(&self, channel: u8, speed: Speed) -> Result<(), Error> {
        check_channel(channel, CHANNELS)?;
        let Some(led) = &self.config.port_led else {
            return Err(Error::NotSupported);
        };
        let level = match speed {
            Speed::Speed1G => led.value_1g,
            Speed::Speed10G => led.value_10g,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "no LED mode for {other}"
                )))
            }
        };
        led.line.write(level)
    }

    fn wavelength_set(&self, wavelength_nm: f64) -> Result<(), Error> {
        let sel = self.eeprom.select()?;
        if !tuning::is_tunable(&sel)? {
            return Err(Error::NotSupported);
        }
        if sel.paging_supported()? {
            let tuned = tuning::set_wavelength(&sel, wavelength_nm, self.tuning)?;
            info!(
                self.log,
                "tuned transmitter";
                "wavelength_nm" => wavelength_nm,
                "frequency_thz" => tuned.frequency_thz,
                "request" => ?tuned.request,
            );
            Ok(())
        } else {
            tuning::set_target_wavelength(&sel, wavelength_nm)
        }
    }

    fn port_info(&self) -> Result<PortInfo, Error> {
        let capability = self.config.port_type.capability().mbps();
        Ok(PortInfo {
            max_port_speed_mbps: self.config.default_speed_mbps.unwrap_or(capability),
            port_density: self.config.port_type.port_density(),
            max_port_power_mw: self.config.max_port_power_mw,
        })
    }

    fn phy_autoneg_set(&self, _channel: u8, _media: MediaType, enable: bool) -> Result<(), Error> {
        self.copper(|phy| phy.set_autoneg(enable))
    }

    fn phy_mode_set(&self, _channel: u8, _media: MediaType, mode: PhyMode) -> Result<(), Error> {
        self.copper(|phy| phy.set_mode(mode))
    }

    fn phy_speed_set(&self, _channel: u8, _media: MediaType, speed: Speed) -> Result<(), Error> {
        self.copper(|phy| phy.set_speed(speed))
    }

    fn phy_link_status(&self, _channel: u8, _media: MediaType) -> Result<bool, Error> {
        self.copper(|phy| phy.link_up())
    }

    fn phy_power_down(&self, _channel: u8, _media: MediaType, enable: bool) -> Result<(), Error> {
        self.copper(|phy| phy.set_power_down(enable))
    }

    fn phy_serdes_control(
        &self,
        _channel: u8,
        _media: MediaType,
        enable: bool,
    ) -> Result<(), Error> {
        self.copper(|phy| phy.set_serdes(enable))
    }

    fn mailbox_chain(&self, packets: &mut [MailboxPacket]) -> Result<(), Error> {
        let sel = self.eeprom.select()?;
        self.aquantia.mailbox().chain(&sel, packets)
    }

    fn aq_set_rate(&self, speed: Speed) -> Result<(), Error> {
        self.aquantia(|phy, sel| phy.set_rate(sel, speed))
    }

    fn aq_tx_state(&self) -> Result<bool, Error> {
        self.aquantia(|phy, sel| phy.tx_enabled(sel))
    }

    fn aq_set_tx_state(&self, enable: bool) -> Result<(), Error> {
        self.aquantia(|phy, sel| phy.set_tx_enabled(sel, enable))
    }

    fn aq_system_status(&self) -> Result<SystemStatus, Error> {
        self.aquantia(|phy, sel| phy.system_status(sel))
    }

    fn aq_line_status(&self) -> Result<LineStatus, Error> {
        self.aquantia(|phy, sel| phy.line_status(sel))
    }

    fn aq_link_status(&self) -> Result<bool, Error> {
        self.aquantia(|phy, sel| phy.link_up(sel))
    }
}

#[cfg(test)]
mod tests {
    use super::Sfp;
    use crate::aquantia::Aquantia;
    use crate::bus::Bus;
    use crate::config::DeviceConfigBuilder;
    use crate::config::Family;
    use crate::config::PortLed;
    use crate::copper::regs;
    use crate::copper::PHY_ADDR;
    use crate::gpio::GpioLine;
    use crate::gpio::PinGroupHandle;
    use crate::mailbox::Mailbox;
    use crate::mailbox::MailboxTiming;
    use crate::media::MediaControl;
    use crate::sim::discard_logger;
    use crate::sim::install_sfp;
    use crate::sim::install_tunable_sfp;
    use crate::sim::SimBus;
    use crate::sim::SimOp;
    use crate::sim::SimPinGroup;
    use crate::tuning::TuningTiming;
    use crate::Error;
    use media_decode::regs::sfp;
    use media_decode::regs::sfp::tunable;
    use media_messages::mailbox::MailboxPacket;
    use media_messages::media::ChannelMonitor;
    use media_messages::media::FeatureSupport;
    use media_messages::media::MediaType;
    use media_messages::media::ModuleMonitor;
    use media_messages::media::Parameter;
    use media_messages::media::Speed;
    use media_messages::media::Threshold;
    use media_messages::media::VendorField;
    use media_messages::ChannelMonitorStatus;
    use media_messages::ChannelStatus;
    use media_messages::ModuleStatus;
    use media_messages::ADDR_A0;
    use media_messages::ADDR_A2;
    use std::time::Duration;

    // Presence on bit 0 of a dedicated pin group, which starts populated.
    fn cage(sim: &SimBus) -> (Sfp, SimPinGroup) {
        let pins = SimPinGroup::new(0x1);
        let group = PinGroupHandle::new("sfp-pins", pins.clone());
        let config = DeviceConfigBuilder::new("sfp-1", Family::Sfp)
            .presence(GpioLine::new(group, 0))
            .build()
            .unwrap();
        let sfp = Sfp::new(Bus::new("i2c-0", sim.clone()), config, &discard_logger());
        (sfp, pins)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_presence_follows_line() {
        let sim = SimBus::new();
        let (sfp, pins) = cage(&sim);
        assert!(sfp.presence().unwrap());
        pins.set_level(0);
        assert!(!sfp.presence().unwrap());
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_vendor_info() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        assert_eq!(sfp.vendor_info(VendorField::Name).unwrap(), "ACME");
        assert_eq!(sfp.vendor_info(VendorField::PartNumber).unwrap(), "SFP-10G-SR");
        assert_eq!(sfp.vendor_info(VendorField::SerialNumber).unwrap(), "SN12345678");
        assert_eq!(sfp.vendor_info(VendorField::Revision).unwrap(), "A");
    }

    #[test]
    fn test_parameters() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        assert_eq!(sfp.parameter(Parameter::Identifier).unwrap(), 0x03);
        assert_eq!(sfp.parameter(Parameter::Wavelength).unwrap(), 0x0352);
        assert_eq!(sfp.parameter(Parameter::NominalBitrate).unwrap(), 0x67);
        assert!(sfp
            .parameter(Parameter::MaxCaseTemp)
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_internally_calibrated_monitors() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        assert!(close(
            sfp.module_monitor(ModuleMonitor::Temperature).unwrap(),
            30.0
        ));
        assert!(close(sfp.module_monitor(ModuleMonitor::Voltage).unwrap(), 3.3));
        assert!(close(
            sfp.channel_monitor(0, ChannelMonitor::TxBias).unwrap(),
            6.0
        ));
        // 0.5 mW and 0.4 mW.
        assert!(close(
            sfp.channel_monitor(0, ChannelMonitor::TxPower).unwrap(),
            -3.0103
        ));
        assert!(close(
            sfp.channel_monitor(0, ChannelMonitor::RxPower).unwrap(),
            -3.9794
        ));
        assert!(matches!(
            sfp.channel_monitor(1, ChannelMonitor::RxPower),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_externally_calibrated_temperature() {
        let sim = SimBus::new();
        install_sfp(&sim);
        // External calibration, with a slope of 2 and an offset of 256.
        sim.poke(ADDR_A0, sfp::DIAG_MON_TYPE, &[0x50]);
        sim.poke(ADDR_A2, sfp::TEMPERATURE_CAL, &[0x02, 0x00, 0x01, 0x00]);
        let (sfp, _) = cage(&sim);
        // (2 * 0x1e00 + 0x100) / 256
        assert!(close(
            sfp.module_monitor(ModuleMonitor::Temperature).unwrap(),
            61.0
        ));
    }

    #[test]
    fn test_monitors_need_diagnostics() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A0, sfp::DIAG_MON_TYPE, &[0x00]);
        let (sfp, _) = cage(&sim);
        assert!(sfp
            .module_monitor(ModuleMonitor::Voltage)
            .unwrap_err()
            .is_not_supported());
        assert!(sfp
            .threshold(Threshold::TempHighAlarm)
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_thresholds() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        assert!(close(sfp.threshold(Threshold::TempHighAlarm).unwrap(), 80.0));
        assert!(close(sfp.threshold(Threshold::TempLowAlarm).unwrap(), -10.0));
        assert!(close(sfp.threshold(Threshold::VoltHighAlarm).unwrap(), 3.6));
        // 1 mW.
        assert!(close(sfp.threshold(Threshold::RxPowerHighAlarm).unwrap(), 0.0));
    }

    #[test]
    fn test_module_monitor_status() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A2, sfp::ALARM_FLAGS, &[sfp::FLAG_TEMP_HIGH | sfp::FLAG_TEMP_LOW]);
        sim.poke(ADDR_A2, sfp::WARNING_FLAGS, &[sfp::FLAG_VOLT_LOW]);
        let (sfp, _) = cage(&sim);
        assert_eq!(
            sfp.module_monitor_status(ModuleStatus::all()).unwrap(),
            ModuleStatus::TEMP_HIGH_ALARM | ModuleStatus::VOLT_LOW_WARNING
        );
        sim.clear_journal();
        assert_eq!(
            sfp.module_monitor_status(ModuleStatus::VOLT).unwrap(),
            ModuleStatus::VOLT_LOW_WARNING
        );
    }

    #[test]
    fn test_channel_monitor_status_reads_rx_low_from_second_byte() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A2, sfp::ALARM_FLAGS, &[0x00, sfp::FLAG_RX_POWER_LOW]);
        sim.poke(ADDR_A2, sfp::WARNING_FLAGS, &[sfp::FLAG_BIAS_HIGH, 0x00]);
        let (sfp, _) = cage(&sim);
        assert_eq!(
            sfp.channel_monitor_status(0, ChannelMonitorStatus::all())
                .unwrap(),
            ChannelMonitorStatus::RX_PWR_LOW_ALARM | ChannelMonitorStatus::TX_BIAS_HIGH_WARNING
        );
    }

    #[test]
    fn test_status_flags_need_alarm_support() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A0, sfp::ENHANCED_OPTIONS, &[0x00]);
        let (sfp, _) = cage(&sim);
        assert!(sfp
            .module_monitor_status(ModuleStatus::all())
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_soft_tx_control() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        sfp.tx_control(0, false).unwrap();
        assert_eq!(sim.peek(ADDR_A2, sfp::STATUS_CONTROL, 1), vec![0x40]);
        assert!(!sfp.tx_control_status(0).unwrap());
        sfp.tx_control(0, true).unwrap();
        assert_eq!(sim.peek(ADDR_A2, sfp::STATUS_CONTROL, 1), vec![0x00]);
        assert!(sfp.tx_control_status(0).unwrap());
    }

    #[test]
    fn test_tx_control_unsupported_without_soft_control() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A0, sfp::ENHANCED_OPTIONS, &[0x80]);
        let (sfp, _) = cage(&sim);
        assert!(sfp.tx_control(0, false).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_gpio_tx_control_and_status() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let pins = SimPinGroup::new(0x1);
        let group = PinGroupHandle::new("sfp-pins", pins.clone());
        let config = DeviceConfigBuilder::new("sfp-1", Family::Sfp)
            .presence(GpioLine::new(group.clone(), 0))
            .tx_control(GpioLine::new(group.clone(), 1))
            .rx_los(GpioLine::new(group.clone(), 2))
            .tx_fault(GpioLine::new(group, 3))
            .build()
            .unwrap();
        let sfp = Sfp::new(Bus::new("i2c-0", sim.clone()), config, &discard_logger());

        sfp.tx_control(0, false).unwrap();
        assert_eq!(pins.level(), 0x3);
        pins.set_level(0x3 | 0x4);
        let status = sfp.channel_status(0, ChannelStatus::all() - ChannelStatus::TX_LOSS);
        assert_eq!(status.unwrap(), ChannelStatus::TX_DISABLE | ChannelStatus::RX_LOSS);
        // Every line is wired, so the module is never touched.
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_soft_channel_status() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.poke(ADDR_A2, sfp::STATUS_CONTROL, &[0x86]);
        let (sfp, _) = cage(&sim);
        assert_eq!(
            sfp.channel_status(0, ChannelStatus::TX_DISABLE | ChannelStatus::TX_FAULT | ChannelStatus::RX_LOSS)
                .unwrap(),
            ChannelStatus::TX_DISABLE | ChannelStatus::TX_FAULT | ChannelStatus::RX_LOSS
        );
        assert!(sfp
            .channel_status(0, ChannelStatus::TX_LOSS)
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_feature_support() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        let FeatureSupport::Sfp(features) = sfp.feature_support().unwrap() else {
            panic!("expected SFP features");
        };
        assert!(features.rate_select);
        assert!(features.alarm_warning);
        assert!(features.diag_monitoring);
    }

    #[test]
    fn test_led_set() {
        let sim = SimBus::new();
        let pins = SimPinGroup::new(0x1);
        let group = PinGroupHandle::new("sfp-pins", pins.clone());
        let config = DeviceConfigBuilder::new("sfp-1", Family::Sfp)
            .presence(GpioLine::new(group.clone(), 0))
            .port_led(PortLed {
                line: GpioLine::new(group, 4),
                value_1g: true,
                value_10g: false,
            })
            .build()
            .unwrap();
        let sfp = Sfp::new(Bus::new("i2c-0", sim), config, &discard_logger());
        sfp.led_set(0, Speed::Speed1G).unwrap();
        assert_eq!(pins.level(), 0x11);
        sfp.led_set(0, Speed::Speed10G).unwrap();
        assert_eq!(pins.level(), 0x01);
        assert!(matches!(
            sfp.led_set(0, Speed::Speed25G),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_led_set_without_led() {
        let sim = SimBus::new();
        let (sfp, _) = cage(&sim);
        assert!(sfp.led_set(0, Speed::Speed1G).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_wavelength_tunes_by_channel() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let (sfp, _) = cage(&sim);
        let sfp = sfp.with_tuning_timing(TuningTiming {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
        });
        sfp.wavelength_set(1550.12).unwrap();
        let channel = sim.peek_page(ADDR_A2, tunable::PAGE, tunable::CHANNEL_SET, 2);
        assert_ne!(channel, vec![0, 0]);
        assert_eq!(sim.current_page(ADDR_A2), 0);
    }

    #[test]
    fn test_wavelength_out_of_range_writes_nothing() {
        let sim = SimBus::new();
        install_tunable_sfp(&sim);
        let (sfp, _) = cage(&sim);
        sim.clear_journal();
        assert!(matches!(
            sfp.wavelength_set(1000.0),
            Err(Error::InvalidArgument(_))
        ));
        let writes: Vec<SimOp> = sim
            .journal()
            .into_iter()
            .filter(|op| matches!(op, SimOp::Write { offset, .. } if *offset != sfp::PAGE_SELECT))
            .collect();
        assert!(writes.is_empty());
    }

    #[test]
    fn test_wavelength_requires_tunable_module() {
        let sim = SimBus::new();
        install_sfp(&sim);
        let (sfp, _) = cage(&sim);
        assert!(sfp.wavelength_set(1550.0).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_copper_phy_link() {
        let sim = SimBus::new();
        sim.add_register_device(PHY_ADDR);
        sim.set_register(PHY_ADDR, regs::EXT_STATUS_1, regs::EXT_STATUS_LINK);
        let (sfp, _) = cage(&sim);
        assert!(sfp.phy_link_status(0, MediaType::Default).unwrap());
    }

    #[test]
    fn test_mailbox_chain_and_aquantia() {
        let sim = SimBus::new();
        install_sfp(&sim);
        sim.attach_mailbox(ADDR_A2);
        sim.set_phy_register(ADDR_A2, 1, 0xe812, 0x3300);
        let timing = MailboxTiming {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        };
        let (sfp, _) = cage(&sim);
        let sfp = sfp.with_aquantia(Aquantia::new(Mailbox::new(timing)).with_settle(Duration::ZERO));
        let mut packets = [MailboxPacket::read(1, 0xe812), MailboxPacket::write(1, 0xe813, 7)];
        sfp.mailbox_chain(&mut packets).unwrap();
        assert_eq!(packets[0].data, 0x3300);
        assert_eq!(sim.phy_register(ADDR_A2, 1, 0xe813), Some(7));

        // The mailbox has already seen two packets.
        sim.mailbox_fail_packet(ADDR_A2, 3);
        let mut packets = [
            MailboxPacket::read(1, 0xe812),
            MailboxPacket::read(1, 0xe812),
            MailboxPacket::read(1, 0xe812),
        ];
        assert!(matches!(
            sfp.mailbox_chain(&mut packets),
            Err(Error::ChainFailed { index: 1, .. })
        ));
        assert_eq!(sim.mailbox_packets(ADDR_A2).len(), 4);
    }

    #[test]
    fn test_speed_and_port_info() {
        let sim = SimBus::new();
        let (sfp, _) = cage(&sim);
        assert_eq!(sfp.speed().unwrap(), Speed::Speed10G);
        let info = sfp.port_info().unwrap();
        assert_eq!(info.max_port_speed_mbps, 10_000);
        assert_eq!(info.max_port_power_mw, 2000);
        assert!(sfp.module_info().unwrap_err().is_not_supported());
    }
}
