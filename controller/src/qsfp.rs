// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Driver for QSFP, QSFP+, QSFP28 and QSFP28-DD cages.
//!
//! The lower memory layout of a module depends on what [`Qsfp::module_init`]
//! finds in the cage. SFF-8636 modules share one layout, while QSFP28-DD
//! modules pick theirs from the memory map revision in byte 1. Monitors
//! always use internal calibration.
//!
//! A QSFP-to-SFP adapter (QSA) presents the serial ID of the SFP module it
//! carries. When one is found, the driver materializes an [`Sfp`] for the
//! adapted module and forwards most operations to it, until the module is
//! removed.

use crate::aquantia::LineStatus;
use crate::aquantia::SystemStatus;
use crate::bus::Bus;
use crate::check_channel;
use crate::config::DeviceConfig;
use crate::config::Family;
use crate::config::PortType;
use crate::copper::select_breakout_channel;
use crate::copper::CopperPhy;
use crate::eeprom::Eeprom;
use crate::eeprom::PagingScheme;
use crate::eeprom::Selected;
use crate::media::MediaControl;
use crate::sfp::Sfp;
use crate::Error;
use media_decode::power;
use media_decode::regs::qsfp;
use media_decode::regs::qsfp_dd;
use media_decode::regs::ChannelBit;
use media_decode::regs::ChannelFlags;
use media_decode::regs::QsfpLayout;
use media_decode::regs::MODULE_FLAG_BITS;
use media_decode::units;
use media_decode::units::Calibration;
use media_decode::units::RxPowerCalibration;
use media_decode::utils::assign_bit;
use media_decode::utils::be_uint;
use media_decode::utils::extract_bit;
use media_decode::vendor::decode_field;
use media_decode::Identifier;
use media_decode::MaxPower;
use media_decode::QsfpCategory;
use media_decode::TransceiverCode;
use media_messages::mailbox::MailboxPacket;
use media_messages::media::ChannelMonitor;
use media_messages::media::FeatureSupport;
use media_messages::media::FirmwareRevision;
use media_messages::media::MediaType;
use media_messages::media::ModuleControl;
use media_messages::media::ModuleInfo;
use media_messages::media::ModuleMonitor;
use media_messages::media::Parameter;
use media_messages::media::PhyMode;
use media_messages::media::PortInfo;
use media_messages::media::QsaAdapter;
use media_messages::media::QsfpFeatures;
use media_messages::media::Quantity;
use media_messages::media::RxPowerType;
use media_messages::media::Speed;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::status::reduce_flags;
use media_messages::ChannelMonitorStatus;
use media_messages::ChannelStatus;
use media_messages::EepromAddress;
use media_messages::ModuleStatus;
use media_messages::NO_MAX_POWER_DEFINED;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use std::time::Duration;

pub const fn default_tx_enable_settle() -> Duration {
    Duration::from_millis(400)
}

pub const fn default_tx_disable_settle() -> Duration {
    Duration::from_millis(100)
}

/// How long to wait after switching a transmitter on or off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxSettle {
    pub enable: Duration,
    pub disable: Duration,
}

impl TxSettle {
    pub const ZERO: Self = Self {
        enable: Duration::ZERO,
        disable: Duration::ZERO,
    };
}

impl Default for TxSettle {
    fn default() -> Self {
        Self {
            enable: default_tx_enable_settle(),
            disable: default_tx_disable_settle(),
        }
    }
}

// What module_init learned about the inserted module.
struct Discovery {
    category: QsfpCategory,
    revision: u8,
    max_power: Option<MaxPower>,
    qsa: bool,
}

/// A module in a QSFP cage.
#[derive(Debug)]
pub struct Qsfp {
    config: DeviceConfig,
    eeprom: Eeprom,
    category: QsfpCategory,
    revision: u8,
    max_power: Option<MaxPower>,
    qsa: Option<Sfp>,
    tx_settle: TxSettle,
    log: Logger,
}

impl Qsfp {
    pub fn new(bus: Bus, config: DeviceConfig, log: &Logger) -> Self {
        let log = log.new(o!(
            "cage" => config.alias.clone(),
            "driver" => "qsfp",
        ));
        let eeprom = Eeprom::new(
            bus,
            config.address,
            config.selector.clone(),
            config.select_delay,
            PagingScheme::Sff8636,
            log.clone(),
        )
        .with_presence(config.presence.clone());
        Self {
            config,
            eeprom,
            category: QsfpCategory::default(),
            revision: 0,
            max_power: None,
            qsa: None,
            tx_settle: TxSettle::default(),
            log,
        }
    }

    pub fn with_tx_settle(mut self, settle: TxSettle) -> Self {
        self.tx_settle = settle;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    pub(crate) fn log(&self) -> &Logger {
        &self.log
    }

    /// The kind of module found by the last [`MediaControl::module_init`].
    pub fn category(&self) -> QsfpCategory {
        self.category
    }

    /// The memory map revision of the module.
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// The power class of the module, if it could be read.
    pub fn max_power(&self) -> Option<MaxPower> {
        self.max_power
    }

    /// The SFP behind a QSA adapter, if one is inserted.
    pub fn qsa(&self) -> Option<&Sfp> {
        self.qsa.as_ref()
    }

    pub fn layout(&self) -> &'static QsfpLayout {
        qsfp_dd::layout_for(self.category, self.revision)
    }

    fn channels(&self) -> u8 {
        self.layout().channels
    }

    /// Force the module into high or low power through the software
    /// override of the power control byte.
    pub fn force_power_mode(&self, high_power: bool) -> Result<(), Error> {
        let sel = self.eeprom.select()?;
        Self::force_power(&sel, high_power)
    }

    fn force_power(sel: &Selected<'_>, high_power: bool) -> Result<(), Error> {
        let ext_id = sel.lower_byte(qsfp::EXT_IDENTIFIER)?;
        if !power::software_power_supported(ext_id) {
            return Err(Error::NotSupported);
        }
        sel.modify(EepromAddress::unpaged(qsfp::POWER_CONTROL), |control| {
            Ok(power::force_power_mode(control, high_power)?)
        })?;
        Ok(())
    }

    fn options_bit(sel: &Selected<'_>, offset: u8, bit: u8) -> Result<bool, Error> {
        Ok(extract_bit(sel.lower_byte(offset)?, bit)?)
    }

    // Build the SFP driver for a module behind a QSA adapter. The adapter
    // routes none of the SFP control lines.
    fn qsa_device(&self) -> Sfp {
        let mut config = self.config.clone();
        config.family = Family::Sfp;
        config.port_type = PortType::SfpPlus;
        config.reset = None;
        config.low_power = None;
        config.tx_control = None;
        config.rx_los = None;
        config.tx_fault = None;
        config.port_led = None;
        Sfp::new(self.eeprom.bus().clone(), config, &self.log)
    }

    fn discover(&self) -> Result<Discovery, Error> {
        let sel = self.eeprom.select()?;
        let id = Identifier::from(sel.lower_byte(qsfp::IDENTIFIER)?);
        if id.is_qsa() {
            return Ok(Discovery {
                category: QsfpCategory::Qsfp,
                revision: 0,
                max_power: None,
                qsa: true,
            });
        }

        match sel.paging_supported() {
            Ok(true) => {
                if let Err(e) = sel.select_page(sel.address(), 0) {
                    warn!(self.log, "failed to select page 0"; "reason" => %e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!(self.log, "failed to read paging support"; "reason" => %e),
        }

        let category = QsfpCategory::from(id);
        let revision = sel.lower_byte(qsfp::REVISION)?;
        let mut max_power = None;
        if category == QsfpCategory::QsfpDD {
            if let Some(addr) = qsfp_dd::datapath_control(revision) {
                self.power_up_datapath(&sel, addr);
            }
        } else {
            match sel.lower_byte(qsfp::EXT_IDENTIFIER) {
                Ok(ext_id) => {
                    let power = MaxPower::from(ext_id);
                    if power.software_controlled {
                        if let Err(e) = Self::force_power(&sel, false) {
                            warn!(self.log, "failed to force low power"; "reason" => %e);
                        }
                    }
                    max_power = Some(power);
                }
                Err(e) => warn!(self.log, "failed to read max power"; "reason" => %e),
            }
        }
        Ok(Discovery {
            category,
            revision,
            max_power,
            qsa: false,
        })
    }

    // Enable every datapath lane and check that the module took it. A
    // module that does not is still usable, so nothing here fails init.
    fn power_up_datapath(&self, sel: &Selected<'_>, addr: EepromAddress) {
        let result = sel
            .write_byte(addr, qsfp_dd::DATAPATH_POWER_UP)
            .and_then(|_| sel.read_byte(addr));
        match result {
            Ok(qsfp_dd::DATAPATH_POWER_UP) => {
                debug!(self.log, "datapath powered up"; "addr" => %addr);
            }
            Ok(value) => warn!(
                self.log,
                "datapath power up did not take";
                "addr" => %addr,
                "value" => value,
            ),
            Err(e) => warn!(
                self.log,
                "datapath power up failed";
                "addr" => %addr,
                "reason" => %e,
            ),
        }
    }

    fn read_monitor(&self, offset: u8, quantity: Quantity) -> Result<f64, Error> {
        let raw = self.eeprom.select()?.read_word(EepromAddress::unpaged(offset))?;
        Ok(convert(quantity, raw))
    }

    fn channel_bit(&self, channel: u8, bit: ChannelBit) -> Result<bool, Error> {
        let byte = self.eeprom.select()?.lower_byte(bit.offset)?;
        Ok(byte & bit.mask(channel) != 0)
    }

    fn read_qsa_oui(&self) -> Result<[u8; 3], Error> {
        let mut oui = [0u8; 3];
        self.eeprom
            .read(EepromAddress::unpaged(qsfp::QSA_OUI), &mut oui)?;
        Ok(oui)
    }

    fn breakout<T>(
        &self,
        channel: u8,
        media: MediaType,
        f: impl FnOnce(&CopperPhy<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if media != MediaType::Qsfp4x1_1000BaseT {
            return Err(Error::InvalidArgument(format!(
                "media type {media:?} has no copper PHY in a QSFP cage"
            )));
        }
        let sel = self.eeprom.select()?;
        select_breakout_channel(sel.bus(), channel)?;
        let phy = CopperPhy::new(sel.bus(), sel.log());
        f(&phy)
    }

    fn qsa_or_unsupported(&self) -> Result<&Sfp, Error> {
        self.qsa.as_ref().ok_or(Error::NotSupported)
    }
}

// QSFP monitors and thresholds are internally calibrated.
fn convert(quantity: Quantity, raw: [u8; 2]) -> f64 {
    match quantity {
        Quantity::Temperature => units::temperature(raw, &Calibration::Internal),
        Quantity::Voltage => units::voltage(raw, &Calibration::Internal),
        Quantity::TxBias => units::bias_current(raw, &Calibration::Internal),
        Quantity::TxPower => units::mw_to_dbm(units::tx_power_mw(raw, &Calibration::Internal)),
        Quantity::RxPower => {
            units::mw_to_dbm(units::rx_power_mw(raw, &RxPowerCalibration::Internal))
        }
    }
}

// Decode the four flags of one channel from the flag bytes of a monitor.
fn channel_flags(
    sel: &Selected<'_>,
    flags: &ChannelFlags,
    rx_power: bool,
    channel: u8,
) -> Result<[bool; 4], Error> {
    match flags {
        ChannelFlags::Nibbles {
            rx_power: rx,
            tx_bias: tx,
        } => {
            let base = if rx_power { *rx } else { *tx };
            let byte = sel.lower_byte(base + channel / 2)?;
            let nibble = if channel % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            Ok([
                nibble & 0x8 != 0,
                nibble & 0x4 != 0,
                nibble & 0x2 != 0,
                nibble & 0x1 != 0,
            ])
        }
        ChannelFlags::Lanes {
            rx_power: rx,
            tx_bias: tx,
        } => {
            let offsets = if rx_power { rx } else { tx };
            let mut out = [false; 4];
            for (flag, offset) in out.iter_mut().zip(offsets) {
                if let Some(offset) = offset {
                    *flag = sel.lower_byte(*offset)? & (1 << channel) != 0;
                }
            }
            Ok(out)
        }
    }
}

impl MediaControl for Qsfp {
    fn presence(&self) -> Result<bool, Error> {
        self.config.presence.read()
    }

    fn module_init(&mut self, present: bool) -> Result<(), Error> {
        if !present {
            if self.qsa.take().is_some() {
                info!(self.log, "QSA adapter removed");
            }
            self.category = QsfpCategory::default();
            self.revision = 0;
            self.max_power = None;
            return Ok(());
        }
        let found = self.discover()?;
        self.category = found.category;
        self.revision = found.revision;
        self.max_power = found.max_power;
        self.qsa = found.qsa.then(|| self.qsa_device());
        info!(
            self.log,
            "module initialized";
            "category" => %self.category,
            "revision" => self.revision,
            "qsa" => found.qsa,
        );
        Ok(())
    }

    fn module_monitor_status(&self, flags: ModuleStatus) -> Result<ModuleStatus, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.module_monitor_status(flags);
        }
        let layout = self.layout();
        let sel = self.eeprom.select()?;
        let mut status = ModuleStatus::empty();
        if flags.intersects(ModuleStatus::TEMP) {
            let byte = sel.lower_byte(layout.temp_flags)?;
            status |= reduce_flags(
                byte & MODULE_FLAG_BITS[0] != 0,
                byte & MODULE_FLAG_BITS[1] != 0,
                byte & MODULE_FLAG_BITS[2] != 0,
                byte & MODULE_FLAG_BITS[3] != 0,
                [
                    ModuleStatus::TEMP_HIGH_ALARM,
                    ModuleStatus::TEMP_LOW_ALARM,
                    ModuleStatus::TEMP_HIGH_WARNING,
                    ModuleStatus::TEMP_LOW_WARNING,
                ],
            );
        }
        if flags.intersects(ModuleStatus::VOLT) {
            let byte = sel.lower_byte(layout.volt_flags)?;
            status |= reduce_flags(
                byte & MODULE_FLAG_BITS[0] != 0,
                byte & MODULE_FLAG_BITS[1] != 0,
                byte & MODULE_FLAG_BITS[2] != 0,
                byte & MODULE_FLAG_BITS[3] != 0,
                [
                    ModuleStatus::VOLT_HIGH_ALARM,
                    ModuleStatus::VOLT_LOW_ALARM,
                    ModuleStatus::VOLT_HIGH_WARNING,
                    ModuleStatus::VOLT_LOW_WARNING,
                ],
            );
        }
        Ok(status & flags)
    }

    fn channel_monitor_status(
        &self,
        channel: u8,
        flags: ChannelMonitorStatus,
    ) -> Result<ChannelMonitorStatus, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.channel_monitor_status(channel, flags);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        let sel = self.eeprom.select()?;
        let mut status = ChannelMonitorStatus::empty();
        if flags.intersects(ChannelMonitorStatus::RX_PWR) {
            let [ha, la, hw, lw] = channel_flags(&sel, &layout.channel_flags, true, channel)?;
            status |= reduce_flags(
                ha,
                la,
                hw,
                lw,
                [
                    ChannelMonitorStatus::RX_PWR_HIGH_ALARM,
                    ChannelMonitorStatus::RX_PWR_LOW_ALARM,
                    ChannelMonitorStatus::RX_PWR_HIGH_WARNING,
                    ChannelMonitorStatus::RX_PWR_LOW_WARNING,
                ],
            );
        }
        if flags.intersects(ChannelMonitorStatus::TX_BIAS) {
            let [ha, la, hw, lw] = channel_flags(&sel, &layout.channel_flags, false, channel)?;
            status |= reduce_flags(
                ha,
                la,
                hw,
                lw,
                [
                    ChannelMonitorStatus::TX_BIAS_HIGH_ALARM,
                    ChannelMonitorStatus::TX_BIAS_LOW_ALARM,
                    ChannelMonitorStatus::TX_BIAS_HIGH_WARNING,
                    ChannelMonitorStatus::TX_BIAS_LOW_WARNING,
                ],
            );
        }
        Ok(status & flags)
    }

    fn channel_status(&self, channel: u8, flags: ChannelStatus) -> Result<ChannelStatus, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.channel_status(channel, flags);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        let sel = self.eeprom.select()?;
        let checks = [
            (ChannelStatus::TX_DISABLE, layout.tx_disable),
            (ChannelStatus::TX_FAULT, layout.tx_fault),
            (ChannelStatus::TX_LOSS, layout.tx_los),
            (ChannelStatus::RX_LOSS, layout.rx_los),
        ];
        let mut status = ChannelStatus::empty();
        for (flag, bit) in checks {
            if flags.contains(flag) && sel.lower_byte(bit.offset)? & bit.mask(channel) != 0 {
                status |= flag;
            }
        }
        Ok(status)
    }

    fn tx_control(&self, channel: u8, enable: bool) -> Result<(), Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.tx_control(channel, enable);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        {
            let sel = self.eeprom.select()?;
            if !Self::options_bit(&sel, qsfp::OPTIONS_CONTROL, qsfp::TX_DISABLE_SUPPORT_BIT)? {
                return Err(Error::NotSupported);
            }
            let bit = layout.tx_disable;
            sel.modify(EepromAddress::unpaged(bit.offset), |byte| {
                Ok(if enable {
                    byte & !bit.mask(channel)
                } else {
                    byte | bit.mask(channel)
                })
            })?;
        }
        let settle = if enable {
            self.tx_settle.enable
        } else {
            self.tx_settle.disable
        };
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        debug!(self.log, "tx control"; "channel" => channel, "enable" => enable);
        Ok(())
    }

    fn tx_control_status(&self, channel: u8) -> Result<bool, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.tx_control_status(channel);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        Ok(!self.channel_bit(channel, layout.tx_disable)?)
    }

    fn cdr_set(&self, channel: u8, enable: bool) -> Result<(), Error> {
        if self.qsa.is_some() {
            return Err(Error::NotSupported);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        let sel = self.eeprom.select()?;
        let options = sel.lower_byte(qsfp::OPTIONS_CDR)?;
        let tx = extract_bit(options, qsfp::TX_CDR_SUPPORT_BIT)?;
        let rx = extract_bit(options, qsfp::RX_CDR_SUPPORT_BIT)?;
        if !tx && !rx {
            return Err(Error::NotSupported);
        }
        for (supported, bit) in [(tx, layout.cdr_tx), (rx, layout.cdr_rx)] {
            if supported {
                sel.modify(EepromAddress::unpaged(bit.offset), |byte| {
                    Ok(assign_bit(byte, (bit.shift + channel) & 0x7, enable)?)
                })?;
            }
        }
        Ok(())
    }

    fn cdr_status(&self, channel: u8) -> Result<bool, Error> {
        if self.qsa.is_some() {
            return Err(Error::NotSupported);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        let sel = self.eeprom.select()?;
        let options = sel.lower_byte(qsfp::OPTIONS_CDR)?;
        let tx = extract_bit(options, qsfp::TX_CDR_SUPPORT_BIT)?;
        let rx = extract_bit(options, qsfp::RX_CDR_SUPPORT_BIT)?;
        if !tx && !rx {
            return Err(Error::NotSupported);
        }
        let mut on = false;
        for (supported, bit) in [(tx, layout.cdr_tx), (rx, layout.cdr_rx)] {
            if supported {
                on |= sel.lower_byte(bit.offset)? & bit.mask(channel) != 0;
            }
        }
        Ok(on)
    }

    fn speed(&self) -> Result<Speed, Error> {
        match &self.qsa {
            Some(sfp) => sfp.speed(),
            None => Ok(self.config.port_type.capability()),
        }
    }

    fn parameter(&self, param: Parameter) -> Result<u32, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.parameter(param);
        }
        let layout = self.layout();
        let info = (layout.map.param)(param);
        if !info.is_supported() {
            debug!(
                self.log,
                "parameter not in memory map";
                "param" => ?param,
                "map" => layout.map.name,
            );
            return Err(Error::NotSupported);
        }
        let sel = self.eeprom.select()?;
        let mut buf = vec![0u8; usize::from(info.size)];
        sel.read(EepromAddress::unpaged(info.offset), &mut buf)?;
        let raw = be_uint(&buf)?;
        let value = match param {
            Parameter::Wavelength => raw / units::WAVELENGTH_DIVIDER as u32,
            Parameter::WavelengthTolerance => raw / units::WAVELENGTH_TOLERANCE_DIVIDER as u32,
            Parameter::DiagMonType => {
                let average = extract_bit(buf[0], qsfp::DIAG_RX_POWER_AVERAGE_BIT)?;
                if average {
                    RxPowerType::Average as u32
                } else {
                    RxPowerType::Oma as u32
                }
            }
            Parameter::LengthCableAssembly
                if self.category == QsfpCategory::QsfpDD
                    && self.revision >= qsfp_dd::REVISION_3
                    && sel.lower_byte(qsfp_dd::LANE_ASSIGNMENT)? != 0 =>
            {
                units::length_code(buf[0]) as u32
            }
            _ => raw,
        };
        Ok(value)
    }

    fn vendor_info(&self, field: VendorField) -> Result<String, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.vendor_info(field);
        }
        let info = (self.layout().map.vendor)(field);
        let mut buf = vec![0u8; info.vendor_read_len()];
        self.eeprom
            .read(EepromAddress::unpaged(info.offset), &mut buf)?;
        Ok(decode_field(&buf, &info))
    }

    fn transceiver_code(&self) -> Result<TransceiverCode, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.transceiver_code();
        }
        let mut buf = [0u8; qsfp::COMPLIANCE_LEN];
        self.eeprom
            .read(EepromAddress::unpaged(qsfp::COMPLIANCE), &mut buf)?;
        Ok(TransceiverCode::from_qsfp(&buf)?)
    }

    fn threshold(&self, threshold: Threshold) -> Result<f64, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.threshold(threshold);
        }
        let Some((addr, _)) = self.layout().map.threshold_address(threshold) else {
            return Err(Error::NotSupported);
        };
        let sel = self.eeprom.select()?;
        // Thresholds live in upper pages only.
        if !sel.paging_supported()? {
            return Err(Error::NotSupported);
        }
        let raw = sel.read_word(addr)?;
        Ok(convert(threshold.quantity(), raw))
    }

    fn module_control(&self, control: ModuleControl, enable: bool) -> Result<(), Error> {
        if self.qsa.is_some() {
            return Err(Error::NotSupported);
        }
        match control {
            ModuleControl::LowPowerMode => {
                if let Some(power) = self.max_power {
                    if !enable && power.milliwatts > self.config.max_port_power_mw {
                        error!(
                            self.log,
                            "module power exceeds port budget, refusing high power";
                            "module_mw" => power.milliwatts,
                            "port_mw" => self.config.max_port_power_mw,
                        );
                        return Err(Error::NotSupported);
                    }
                    if power.software_controlled {
                        match self.force_power_mode(!enable) {
                            Ok(()) => debug!(
                                self.log,
                                "power class set";
                                "module_mw" => power.milliwatts,
                                "high_power" => !enable,
                            ),
                            Err(e) if e.is_not_supported() => {}
                            Err(e) => error!(
                                self.log,
                                "failed to set power class, module may not work";
                                "reason" => %e,
                            ),
                        }
                    }
                }
                let line = self.config.low_power.as_ref().ok_or(Error::NotSupported)?;
                line.write(enable)
            }
            ModuleControl::Reset => {
                let line = self.config.reset.as_ref().ok_or(Error::NotSupported)?;
                line.write(enable)
            }
        }
    }

    fn module_control_status(&self, control: ModuleControl) -> Result<bool, Error> {
        if self.qsa.is_some() {
            return Err(Error::NotSupported);
        }
        let line = match control {
            ModuleControl::LowPowerMode => self.config.low_power.as_ref(),
            ModuleControl::Reset => self.config.reset.as_ref(),
        };
        line.ok_or(Error::NotSupported)?.read()
    }

    fn module_monitor(&self, monitor: ModuleMonitor) -> Result<f64, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.module_monitor(monitor);
        }
        let layout = self.layout();
        match monitor {
            ModuleMonitor::Temperature => {
                self.read_monitor(layout.temperature, Quantity::Temperature)
            }
            ModuleMonitor::Voltage => self.read_monitor(layout.voltage, Quantity::Voltage),
        }
    }

    fn channel_monitor(&self, channel: u8, monitor: ChannelMonitor) -> Result<f64, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.channel_monitor(channel, monitor);
        }
        let layout = self.layout();
        check_channel(channel, layout.channels)?;
        let (base, quantity) = match monitor {
            ChannelMonitor::RxPower => (layout.rx_power, Quantity::RxPower),
            ChannelMonitor::TxBias => (layout.tx_bias, Quantity::TxBias),
            ChannelMonitor::TxPower => (
                layout.tx_power.ok_or(Error::NotSupported)?,
                Quantity::TxPower,
            ),
        };
        self.read_monitor(QsfpLayout::channel_word(base, channel), quantity)
    }

    fn feature_support(&self) -> Result<FeatureSupport, Error> {
        if let Some(sfp) = &self.qsa {
            return sfp.feature_support();
        }
        let sel = self.eeprom.select()?;
        let options = sel.lower_byte(qsfp::OPTIONS_CONTROL)?;
        Ok(FeatureSupport::Qsfp(QsfpFeatures {
            rate_select: extract_bit(options, qsfp::RATE_SELECT_SUPPORT_BIT)?,
            tx_control: extract_bit(options, qsfp::TX_DISABLE_SUPPORT_BIT)?,
            paging: sel.paging_supported()?,
            software_power_mode: power::software_power_supported(
                sel.lower_byte(qsfp::EXT_IDENTIFIER)?,
            ),
        }))
    }

    fn read_generic(&self, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
        self.eeprom.read(addr, buf)
    }

    fn write_generic(&self, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
        self.eeprom.write(addr, data)
    }

    fn ext_rate_select(
        &self,
        channel: u8,
        revision: FirmwareRevision,
        cdr_enable: bool,
    ) -> Result<(), Error> {
        if self.qsa.is_some() {
            return Err(Error::NotSupported);
        }
        check_channel(channel, self.channels())?;
        let value = match (revision, cdr_enable) {
            (FirmwareRevision::Rev0, true) => qsfp::RATE_SELECT_REV0_CDR_ON,
            (FirmwareRevision::Rev0, false) => qsfp::RATE_SELECT_REV0_CDR_OFF,
            (FirmwareRevision::Rev1, true) => qsfp::RATE_SELECT_REV1_CDR_ON,
            (FirmwareRevision::Rev1, false) => qsfp::RATE_SELECT_REV1_CDR_OFF,
        };
        let sel = self.eeprom.select()?;
        for offset in [qsfp::RX_RATE_SELECT, qsfp::TX_RATE_SELECT] {
            sel.modify(EepromAddress::unpaged(offset), |_| Ok(value))?;
        }
        Ok(())
    }

    fn wavelength_set(&self, wavelength_nm: f64) -> Result<(), Error> {
        self.qsa_or_unsupported()?.wavelength_set(wavelength_nm)
    }

    fn qsa_adapter_type(&self) -> Result<QsaAdapter, Error> {
        if self.qsa.is_none() {
            return Ok(QsaAdapter::None);
        }
        let reset = self.config.reset.as_ref().ok_or(Error::NotSupported)?;
        // The adapter only answers with its own OUI while the module is
        // held in reset.
        reset.write(true)?;
        if !self.config.reset_delay.is_zero() {
            std::thread::sleep(self.config.reset_delay);
        }
        let adapter = match self.read_qsa_oui() {
            Ok(qsfp::QSA28_OUI) => QsaAdapter::Qsa28,
            Ok(_) => QsaAdapter::Qsa,
            Err(e) => {
                warn!(self.log, "failed to read QSA adapter OUI"; "reason" => %e);
                QsaAdapter::Unknown
            }
        };
        reset.write(false)?;
        Ok(adapter)
    }

    fn port_info(&self) -> Result<PortInfo, Error> {
        let capability = self.config.port_type.capability().mbps();
        Ok(PortInfo {
            max_port_speed_mbps: self.config.default_speed_mbps.unwrap_or(capability),
            port_density: self.config.port_type.port_density(),
            max_port_power_mw: self.config.max_port_power_mw,
        })
    }

    fn module_info(&self) -> Result<ModuleInfo, Error> {
        Ok(ModuleInfo {
            module_density: self.config.port_type.port_density(),
            eeprom_map_version: self.revision,
            software_controlled_power_mode: self
                .max_power
                .map(|p| p.software_controlled)
                .unwrap_or(false),
            max_module_power_mw: self
                .max_power
                .map(|p| p.milliwatts)
                .unwrap_or(NO_MAX_POWER_DEFINED),
        })
    }

    fn phy_autoneg_set(&self, channel: u8, media: MediaType, enable: bool) -> Result<(), Error> {
        match &self.qsa {
            Some(sfp) => sfp.phy_autoneg_set(channel, media, enable),
            None => self.breakout(channel, media, |phy| phy.set_autoneg(enable)),
        }
    }

    fn phy_mode_set(&self, channel: u8, media: MediaType, mode: PhyMode) -> Result<(), Error> {
        match &self.qsa {
            Some(sfp) => sfp.phy_mode_set(channel, media, mode),
            None => self.breakout(channel, media, |phy| phy.set_mode(mode)),
        }
    }

    fn phy_speed_set(&self, channel: u8, media: MediaType, speed: Speed) -> Result<(), Error> {
        match &self.qsa {
            Some(sfp) => sfp.phy_speed_set(channel, media, speed),
            None => self.breakout(channel, media, |phy| phy.set_speed(speed)),
        }
    }

    fn phy_link_status(&self, channel: u8, media: MediaType) -> Result<bool, Error> {
        self.qsa_or_unsupported()?.phy_link_status(channel, media)
    }

    fn phy_power_down(&self, channel: u8, media: MediaType, enable: bool) -> Result<(), Error> {
        self.qsa_or_unsupported()?
            .phy_power_down(channel, media, enable)
    }

    fn phy_serdes_control(
        &self,
        channel: u8,
        media: MediaType,
        enable: bool,
    ) -> Result<(), Error> {
        self.qsa_or_unsupported()?
            .phy_serdes_control(channel, media, enable)
    }

    fn mailbox_chain(&self, packets: &mut [MailboxPacket]) -> Result<(), Error> {
        self.qsa_or_unsupported()?.mailbox_chain(packets)
    }

    fn aq_set_rate(&self, speed: Speed) -> Result<(), Error> {
        self.qsa_or_unsupported()?.aq_set_rate(speed)
    }

    fn aq_tx_state(&self) -> Result<bool, Error> {
        self.qsa_or_unsupported()?.aq_tx_state()
    }

    fn aq_set_tx_state(&self, enable: bool) -> Result<(), Error> {
        self.qsa_or_unsupported()?.aq_set_tx_state(enable)
    }

    fn aq_system_status(&self) -> Result<SystemStatus, Error> {
        self.qsa_or_unsupported()?.aq_system_status()
    }

    fn aq_line_status(&self) -> Result<LineStatus, Error> {
        self.qsa_or_unsupported()?.aq_line_status()
    }

    fn aq_link_status(&self) -> Result<bool, Error> {
        self.qsa_or_unsupported()?.aq_link_status()
    }
}
