// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Driver for one logical port of a QSFP28-DD cage.
//!
//! A double density cage carries two logical ports. Each is a [`QsfpDD`]
//! wrapping its own [`Qsfp`], and shifts channel numbers by the channel
//! offset of its sub-port before handing them on.

use crate::aquantia::LineStatus;
use crate::aquantia::SystemStatus;
use crate::bus::Bus;
use crate::config::DeviceConfig;
use crate::media::MediaControl;
use crate::qsfp::Qsfp;
use crate::qsfp::TxSettle;
use crate::Error;
use media_decode::regs::qsfp;
use media_decode::Identifier;
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
use media_messages::media::Speed;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::ChannelMonitorStatus;
use media_messages::ChannelStatus;
use media_messages::EepromAddress;
use media_messages::ModuleStatus;
use slog::warn;

/// A logical port of a QSFP28-DD cage.
#[derive(Debug)]
pub struct QsfpDD {
    inner: Qsfp,
    offset: u8,
    secondary: bool,
}

impl QsfpDD {
    pub fn new(bus: Bus, config: DeviceConfig, log: &slog::Logger) -> Self {
        let offset = config.sub_port_channel_offset;
        let secondary = config.port_type.sub_port_rank() == 1;
        Self {
            inner: Qsfp::new(bus, config, log),
            offset,
            secondary,
        }
    }

    pub fn with_tx_settle(mut self, settle: TxSettle) -> Self {
        self.inner = self.inner.with_tx_settle(settle);
        self
    }

    pub fn inner(&self) -> &Qsfp {
        &self.inner
    }

    pub fn channel_offset(&self) -> u8 {
        self.offset
    }

    fn channel(&self, channel: u8) -> Result<u8, Error> {
        channel.checked_add(self.offset).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "channel {channel} out of range with offset {}",
                self.offset
            ))
        })
    }

    // The secondary port only exists when a double density module fills
    // the cage. A failed identifier read counts as absent.
    fn double_density(&self) -> bool {
        match self
            .inner
            .eeprom()
            .select()
            .and_then(|sel| sel.lower_byte(qsfp::IDENTIFIER))
        {
            Ok(id) => Identifier::from(id) == Identifier::QsfpDD,
            Err(e) => {
                warn!(
                    self.inner.log(),
                    "failed to read identifier of secondary port";
                    "reason" => %e,
                );
                false
            }
        }
    }
}

impl MediaControl for QsfpDD {
    fn presence(&self) -> Result<bool, Error> {
        if !self.inner.presence()? {
            return Ok(false);
        }
        Ok(!self.secondary || self.double_density())
    }

    fn module_init(&mut self, present: bool) -> Result<(), Error> {
        self.inner.module_init(present)
    }

    fn module_monitor_status(&self, flags: ModuleStatus) -> Result<ModuleStatus, Error> {
        self.inner.module_monitor_status(flags)
    }

    fn channel_monitor_status(
        &self,
        channel: u8,
        flags: ChannelMonitorStatus,
    ) -> Result<ChannelMonitorStatus, Error> {
        self.inner
            .channel_monitor_status(self.channel(channel)?, flags)
    }

    fn channel_status(&self, channel: u8, flags: ChannelStatus) -> Result<ChannelStatus, Error> {
        self.inner.channel_status(self.channel(channel)?, flags)
    }

    fn tx_control(&self, channel: u8, enable: bool) -> Result<(), Error> {
        self.inner.tx_control(self.channel(channel)?, enable)
    }

    fn tx_control_status(&self, channel: u8) -> Result<bool, Error> {
        self.inner.tx_control_status(self.channel(channel)?)
    }

    fn cdr_set(&self, channel: u8, enable: bool) -> Result<(), Error> {
        self.inner.cdr_set(self.channel(channel)?, enable)
    }

    fn cdr_status(&self, channel: u8) -> Result<bool, Error> {
        self.inner.cdr_status(self.channel(channel)?)
    }

    fn speed(&self) -> Result<Speed, Error> {
        self.inner.speed()
    }

    fn parameter(&self, param: Parameter) -> Result<u32, Error> {
        self.inner.parameter(param)
    }

    fn vendor_info(&self, field: VendorField) -> Result<String, Error> {
        self.inner.vendor_info(field)
    }

    fn transceiver_code(&self) -> Result<TransceiverCode, Error> {
        self.inner.transceiver_code()
    }

    fn threshold(&self, threshold: Threshold) -> Result<f64, Error> {
        self.inner.threshold(threshold)
    }

    fn module_control(&self, control: ModuleControl, enable: bool) -> Result<(), Error> {
        self.inner.module_control(control, enable)
    }

    fn module_control_status(&self, control: ModuleControl) -> Result<bool, Error> {
        self.inner.module_control_status(control)
    }

    fn module_monitor(&self, monitor: ModuleMonitor) -> Result<f64, Error> {
        self.inner.module_monitor(monitor)
    }

    fn channel_monitor(&self, channel: u8, monitor: ChannelMonitor) -> Result<f64, Error> {
        self.inner.channel_monitor(self.channel(channel)?, monitor)
    }

    fn feature_support(&self) -> Result<FeatureSupport, Error> {
        self.inner.feature_support()
    }

    fn read_generic(&self, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_generic(addr, buf)
    }

    fn write_generic(&self, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
        self.inner.write_generic(addr, data)
    }

    fn ext_rate_select(
        &self,
        channel: u8,
        revision: FirmwareRevision,
        cdr_enable: bool,
    ) -> Result<(), Error> {
        self.inner
            .ext_rate_select(self.channel(channel)?, revision, cdr_enable)
    }

    fn wavelength_set(&self, wavelength_nm: f64) -> Result<(), Error> {
        self.inner.wavelength_set(wavelength_nm)
    }

    fn qsa_adapter_type(&self) -> Result<QsaAdapter, Error> {
        self.inner.qsa_adapter_type()
    }

    fn port_info(&self) -> Result<PortInfo, Error> {
        self.inner.port_info()
    }

    fn module_info(&self) -> Result<ModuleInfo, Error> {
        self.inner.module_info()
    }

    fn phy_autoneg_set(&self, channel: u8, media: MediaType, enable: bool) -> Result<(), Error> {
        self.inner
            .phy_autoneg_set(self.channel(channel)?, media, enable)
    }

    fn phy_mode_set(&self, channel: u8, media: MediaType, mode: PhyMode) -> Result<(), Error> {
        self.inner.phy_mode_set(self.channel(channel)?, media, mode)
    }

    fn phy_speed_set(&self, channel: u8, media: MediaType, speed: Speed) -> Result<(), Error> {
        self.inner
            .phy_speed_set(self.channel(channel)?, media, speed)
    }

    fn phy_link_status(&self, channel: u8, media: MediaType) -> Result<bool, Error> {
        self.inner.phy_link_status(self.channel(channel)?, media)
    }

    fn phy_power_down(&self, channel: u8, media: MediaType, enable: bool) -> Result<(), Error> {
        self.inner
            .phy_power_down(self.channel(channel)?, media, enable)
    }

    fn phy_serdes_control(
        &self,
        channel: u8,
        media: MediaType,
        enable: bool,
    ) -> Result<(), Error> {
        self.inner
            .phy_serdes_control(self.channel(channel)?, media, enable)
    }

    fn mailbox_chain(&self, packets: &mut [MailboxPacket]) -> Result<(), Error> {
        self.inner.mailbox_chain(packets)
    }

    fn aq_set_rate(&self, speed: Speed) -> Result<(), Error> {
        self.inner.aq_set_rate(speed)
    }

    fn aq_tx_state(&self) -> Result<bool, Error> {
        self.inner.aq_tx_state()
    }

    fn aq_set_tx_state(&self, enable: bool) -> Result<(), Error> {
        self.inner.aq_set_tx_state(enable)
    }

    fn aq_system_status(&self) -> Result<SystemStatus, Error> {
        self.inner.aq_system_status()
    }

    fn aq_line_status(&self) -> Result<LineStatus, Error> {
        self.inner.aq_line_status()
    }

    fn aq_link_status(&self) -> Result<bool, Error> {
        self.inner.aq_link_status()
    }
}
