// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The capability surface of transceiver media, and the functions through
//! which upper layers reach it.
//!
//! Each module family implements [`MediaControl`]. Capabilities a family
//! lacks keep the default implementation, which reports
//! [`Error::NotSupported`]. Upper layers hold a [`Resource`] and call the
//! free functions of this module, which check that the resource is media,
//! forward to its driver, and log any failure under the resource's alias.

use crate::aquantia::LineStatus;
use crate::aquantia::SystemStatus;
use crate::bus::Bus;
use crate::config::DeviceConfig;
use crate::config::Family;
use crate::qsfp::Qsfp;
use crate::qsfp_dd::QsfpDD;
use crate::sfp::Sfp;
use crate::Error;
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
use slog::debug;
use slog::error;
use slog::Logger;
use std::fmt;

/// Operations on the module in one cage.
///
/// Channels count from 0 within the logical port. Status operations take
/// the set of flags the caller is interested in, and report the subset that
/// is currently raised.
pub trait MediaControl: Send {
    /// Return true if a module is inserted.
    fn presence(&self) -> Result<bool, Error>;

    /// Prepare a newly inserted module, or forget a removed one.
    fn module_init(&mut self, _present: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn module_monitor_status(&self, _flags: ModuleStatus) -> Result<ModuleStatus, Error> {
        Err(Error::NotSupported)
    }

    fn channel_monitor_status(
        &self,
        _channel: u8,
        _flags: ChannelMonitorStatus,
    ) -> Result<ChannelMonitorStatus, Error> {
        Err(Error::NotSupported)
    }

    fn channel_status(&self, _channel: u8, _flags: ChannelStatus) -> Result<ChannelStatus, Error> {
        Err(Error::NotSupported)
    }

    /// Enable or disable the transmitter of a channel.
    fn tx_control(&self, _channel: u8, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    /// Return true if the transmitter of a channel is enabled.
    fn tx_control_status(&self, _channel: u8) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }

    fn cdr_set(&self, _channel: u8, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn cdr_status(&self, _channel: u8) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }

    /// The fastest speed of the port.
    fn speed(&self) -> Result<Speed, Error> {
        Err(Error::NotSupported)
    }

    fn parameter(&self, _param: Parameter) -> Result<u32, Error> {
        Err(Error::NotSupported)
    }

    fn vendor_info(&self, _field: VendorField) -> Result<String, Error> {
        Err(Error::NotSupported)
    }

    fn transceiver_code(&self) -> Result<TransceiverCode, Error> {
        Err(Error::NotSupported)
    }

    /// Read an alarm or warning threshold, in the units of its monitor.
    fn threshold(&self, _threshold: Threshold) -> Result<f64, Error> {
        Err(Error::NotSupported)
    }

    fn module_control(&self, _control: ModuleControl, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn module_control_status(&self, _control: ModuleControl) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }

    fn module_monitor(&self, _monitor: ModuleMonitor) -> Result<f64, Error> {
        Err(Error::NotSupported)
    }

    fn channel_monitor(&self, _channel: u8, _monitor: ChannelMonitor) -> Result<f64, Error> {
        Err(Error::NotSupported)
    }

    fn feature_support(&self) -> Result<FeatureSupport, Error> {
        Err(Error::NotSupported)
    }

    fn read_generic(&self, _addr: EepromAddress, _buf: &mut [u8]) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn write_generic(&self, _addr: EepromAddress, _data: &[u8]) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    /// Read lower memory of the module's own address, unpaged.
    fn read(&self, offset: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.read_generic(EepromAddress::unpaged(offset), buf)
    }

    fn write(&self, offset: u8, data: &[u8]) -> Result<(), Error> {
        self.write_generic(EepromAddress::unpaged(offset), data)
    }

    /// Drive the port LED for a link at `speed`.
    fn led_set(&self, _channel: u8, _speed: Speed) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn ext_rate_select(
        &self,
        _channel: u8,
        _revision: FirmwareRevision,
        _cdr_enable: bool,
    ) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    /// Tune the transmitter to `wavelength_nm`.
    fn wavelength_set(&self, _wavelength_nm: f64) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn qsa_adapter_type(&self) -> Result<QsaAdapter, Error> {
        Err(Error::NotSupported)
    }

    fn port_info(&self) -> Result<PortInfo, Error> {
        Err(Error::NotSupported)
    }

    fn module_info(&self) -> Result<ModuleInfo, Error> {
        Err(Error::NotSupported)
    }

    fn phy_autoneg_set(&self, _channel: u8, _media: MediaType, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn phy_mode_set(&self, _channel: u8, _media: MediaType, _mode: PhyMode) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn phy_speed_set(&self, _channel: u8, _media: MediaType, _speed: Speed) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn phy_link_status(&self, _channel: u8, _media: MediaType) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }

    fn phy_power_down(&self, _channel: u8, _media: MediaType, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn phy_serdes_control(
        &self,
        _channel: u8,
        _media: MediaType,
        _enable: bool,
    ) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    /// Run mailbox packets in order, stopping at the first failure.
    fn mailbox_chain(&self, _packets: &mut [MailboxPacket]) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn aq_set_rate(&self, _speed: Speed) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn aq_tx_state(&self) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }

    fn aq_set_tx_state(&self, _enable: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn aq_system_status(&self) -> Result<SystemStatus, Error> {
        Err(Error::NotSupported)
    }

    fn aq_line_status(&self) -> Result<LineStatus, Error> {
        Err(Error::NotSupported)
    }

    fn aq_link_status(&self) -> Result<bool, Error> {
        Err(Error::NotSupported)
    }
}

/// The kind of a registered resource.
pub enum ResourceKind {
    Media(Box<dyn MediaControl>),
    Thermal,
    Fan,
    Led,
}

impl ResourceKind {
    fn name(&self) -> &'static str {
        match self {
            ResourceKind::Media(_) => "media",
            ResourceKind::Thermal => "thermal",
            ResourceKind::Fan => "fan",
            ResourceKind::Led => "led",
        }
    }
}

/// A named resource, as handed to upper layers.
pub struct Resource {
    alias: String,
    kind: ResourceKind,
    log: Logger,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("alias", &self.alias)
            .field("kind", &self.kind.name())
            .finish()
    }
}

impl Resource {
    pub fn new(alias: impl AsRef<str>, kind: ResourceKind, log: &Logger) -> Self {
        let alias = String::from(alias.as_ref());
        let log = log.new(slog::o!("resource" => alias.clone()));
        Self { alias, kind, log }
    }

    /// Wrap a media driver.
    pub fn media(alias: impl AsRef<str>, driver: impl MediaControl + 'static, log: &Logger) -> Self {
        Self::new(alias, ResourceKind::Media(Box::new(driver)), log)
    }

    /// Build the driver for the family of a configured cage.
    pub fn register(bus: Bus, config: DeviceConfig, log: &Logger) -> Self {
        let alias = config.alias.clone();
        let driver: Box<dyn MediaControl> = match config.family {
            Family::Sfp => Box::new(Sfp::new(bus, config, log)),
            Family::Qsfp => Box::new(Qsfp::new(bus, config, log)),
            Family::QsfpDD => Box::new(QsfpDD::new(bus, config, log)),
        };
        Self::new(alias, ResourceKind::Media(driver), log)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    fn permission_error(alias: &str, kind: &ResourceKind) -> Error {
        Error::Permission(format!("resource '{alias}' is {}, not media", kind.name()))
    }

    fn driver(&self) -> Result<&dyn MediaControl, Error> {
        match &self.kind {
            ResourceKind::Media(m) => Ok(m.as_ref()),
            other => Err(Self::permission_error(&self.alias, other)),
        }
    }

    fn driver_mut(&mut self) -> Result<&mut dyn MediaControl, Error> {
        let Self { alias, kind, .. } = self;
        match kind {
            ResourceKind::Media(m) => Ok(m.as_mut()),
            other => Err(Self::permission_error(alias, other)),
        }
    }

    fn report<T>(&self, op: &'static str, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            if e.is_not_supported() {
                debug!(self.log, "operation not supported"; "op" => op);
            } else if matches!(e, Error::NotPresent) {
                debug!(self.log, "no module present"; "op" => op);
            } else {
                error!(self.log, "media operation failed"; "op" => op, "reason" => %e);
            }
        }
        result
    }

    fn call<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn MediaControl) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let driver = self.driver()?;
        self.report(op, f(driver))
    }
}

pub fn presence(res: &Resource) -> Result<bool, Error> {
    res.call("presence", |m| m.presence())
}

pub fn module_init(res: &mut Resource, present: bool) -> Result<(), Error> {
    let result = res.driver_mut()?.module_init(present);
    res.report("module_init", result)
}

pub fn module_monitor_status(res: &Resource, flags: ModuleStatus) -> Result<ModuleStatus, Error> {
    res.call("module_monitor_status", |m| m.module_monitor_status(flags))
}

pub fn channel_monitor_status(
    res: &Resource,
    channel: u8,
    flags: ChannelMonitorStatus,
) -> Result<ChannelMonitorStatus, Error> {
    res.call("channel_monitor_status", |m| {
        m.channel_monitor_status(channel, flags)
    })
}

pub fn channel_status(
    res: &Resource,
    channel: u8,
    flags: ChannelStatus,
) -> Result<ChannelStatus, Error> {
    res.call("channel_status", |m| m.channel_status(channel, flags))
}

pub fn tx_control(res: &Resource, channel: u8, enable: bool) -> Result<(), Error> {
    res.call("tx_control", |m| m.tx_control(channel, enable))
}

pub fn tx_control_status(res: &Resource, channel: u8) -> Result<bool, Error> {
    res.call("tx_control_status", |m| m.tx_control_status(channel))
}

pub fn cdr_set(res: &Resource, channel: u8, enable: bool) -> Result<(), Error> {
    res.call("cdr_set", |m| m.cdr_set(channel, enable))
}

pub fn cdr_status(res: &Resource, channel: u8) -> Result<bool, Error> {
    res.call("cdr_status", |m| m.cdr_status(channel))
}

pub fn speed(res: &Resource) -> Result<Speed, Error> {
    res.call("speed", |m| m.speed())
}

pub fn parameter(res: &Resource, param: Parameter) -> Result<u32, Error> {
    res.call("parameter", |m| m.parameter(param))
}

pub fn vendor_info(res: &Resource, field: VendorField) -> Result<String, Error> {
    res.call("vendor_info", |m| m.vendor_info(field))
}

pub fn transceiver_code(res: &Resource) -> Result<TransceiverCode, Error> {
    res.call("transceiver_code", |m| m.transceiver_code())
}

pub fn threshold(res: &Resource, threshold: Threshold) -> Result<f64, Error> {
    res.call("threshold", |m| m.threshold(threshold))
}

/// Superseded by [`threshold`].
pub fn module_monitor_threshold(res: &Resource, _monitor: ModuleMonitor) -> Result<u32, Error> {
    res.driver()?;
    Err(Error::Unimplemented("module_monitor_threshold"))
}

/// Superseded by [`threshold`].
pub fn channel_monitor_threshold(
    res: &Resource,
    _channel: u8,
    _monitor: ChannelMonitor,
) -> Result<u32, Error> {
    res.driver()?;
    Err(Error::Unimplemented("channel_monitor_threshold"))
}

pub fn module_control(res: &Resource, control: ModuleControl, enable: bool) -> Result<(), Error> {
    res.call("module_control", |m| m.module_control(control, enable))
}

pub fn module_control_status(res: &Resource, control: ModuleControl) -> Result<bool, Error> {
    res.call("module_control_status", |m| m.module_control_status(control))
}

pub fn module_monitor(res: &Resource, monitor: ModuleMonitor) -> Result<f64, Error> {
    res.call("module_monitor", |m| m.module_monitor(monitor))
}

pub fn channel_monitor(res: &Resource, channel: u8, monitor: ChannelMonitor) -> Result<f64, Error> {
    res.call("channel_monitor", |m| m.channel_monitor(channel, monitor))
}

pub fn feature_support(res: &Resource) -> Result<FeatureSupport, Error> {
    res.call("feature_support", |m| m.feature_support())
}

pub fn read_generic(res: &Resource, addr: EepromAddress, buf: &mut [u8]) -> Result<(), Error> {
    res.call("read_generic", |m| m.read_generic(addr, buf))
}

pub fn write_generic(res: &Resource, addr: EepromAddress, data: &[u8]) -> Result<(), Error> {
    res.call("write_generic", |m| m.write_generic(addr, data))
}

pub fn read(res: &Resource, offset: u8, buf: &mut [u8]) -> Result<(), Error> {
    res.call("read", |m| m.read(offset, buf))
}

pub fn write(res: &Resource, offset: u8, data: &[u8]) -> Result<(), Error> {
    res.call("write", |m| m.write(offset, data))
}

pub fn led_set(res: &Resource, channel: u8, speed: Speed) -> Result<(), Error> {
    res.call("led_set", |m| m.led_set(channel, speed))
}

pub fn ext_rate_select(
    res: &Resource,
    channel: u8,
    revision: FirmwareRevision,
    cdr_enable: bool,
) -> Result<(), Error> {
    res.call("ext_rate_select", |m| {
        m.ext_rate_select(channel, revision, cdr_enable)
    })
}

pub fn wavelength_set(res: &Resource, wavelength_nm: f64) -> Result<(), Error> {
    res.call("wavelength_set", |m| m.wavelength_set(wavelength_nm))
}

pub fn qsa_adapter_type(res: &Resource) -> Result<QsaAdapter, Error> {
    res.call("qsa_adapter_type", |m| m.qsa_adapter_type())
}

pub fn port_info(res: &Resource) -> Result<PortInfo, Error> {
    res.call("port_info", |m| m.port_info())
}

pub fn module_info(res: &Resource) -> Result<ModuleInfo, Error> {
    res.call("module_info", |m| m.module_info())
}

pub fn phy_autoneg_set(
    res: &Resource,
    channel: u8,
    media: MediaType,
    enable: bool,
) -> Result<(), Error> {
    res.call("phy_autoneg_set", |m| m.phy_autoneg_set(channel, media, enable))
}

pub fn phy_mode_set(res: &Resource, channel: u8, media: MediaType, mode: PhyMode) -> Result<(), Error> {
    res.call("phy_mode_set", |m| m.phy_mode_set(channel, media, mode))
}

/// Apply each of `speeds` in turn.
///
/// Every speed is attempted even if an earlier one fails, and the result of
/// the last attempt is returned.
pub fn phy_speed_set(
    res: &Resource,
    channel: u8,
    media: MediaType,
    speeds: &[Speed],
) -> Result<(), Error> {
    let driver = res.driver()?;
    let mut result = Ok(());
    for speed in speeds {
        result = res.report("phy_speed_set", driver.phy_speed_set(channel, media, *speed));
    }
    result
}

pub fn phy_link_status(res: &Resource, channel: u8, media: MediaType) -> Result<bool, Error> {
    res.call("phy_link_status", |m| m.phy_link_status(channel, media))
}

pub fn phy_power_down(
    res: &Resource,
    channel: u8,
    media: MediaType,
    enable: bool,
) -> Result<(), Error> {
    res.call("phy_power_down", |m| m.phy_power_down(channel, media, enable))
}

pub fn phy_serdes_control(
    res: &Resource,
    channel: u8,
    media: MediaType,
    enable: bool,
) -> Result<(), Error> {
    res.call("phy_serdes_control", |m| {
        m.phy_serdes_control(channel, media, enable)
    })
}

pub fn mailbox_chain(res: &Resource, packets: &mut [MailboxPacket]) -> Result<(), Error> {
    res.call("mailbox_chain", |m| m.mailbox_chain(packets))
}

pub fn aq_set_rate(res: &Resource, speed: Speed) -> Result<(), Error> {
    res.call("aq_set_rate", |m| m.aq_set_rate(speed))
}

pub fn aq_tx_state(res: &Resource) -> Result<bool, Error> {
    res.call("aq_tx_state", |m| m.aq_tx_state())
}

pub fn aq_set_tx_state(res: &Resource, enable: bool) -> Result<(), Error> {
    res.call("aq_set_tx_state", |m| m.aq_set_tx_state(enable))
}

pub fn aq_system_status(res: &Resource) -> Result<SystemStatus, Error> {
    res.call("aq_system_status", |m| m.aq_system_status())
}

pub fn aq_line_status(res: &Resource) -> Result<LineStatus, Error> {
    res.call("aq_line_status", |m| m.aq_line_status())
}

pub fn aq_link_status(res: &Resource) -> Result<bool, Error> {
    res.call("aq_link_status", |m| m.aq_link_status())
}
