// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Configuration of one transceiver cage.
//!
//! A [`DeviceConfig`] describes the wiring of a cage: its bus address, the
//! pin groups selecting it on a shared bus, and the GPIO lines reporting
//! presence and controlling the module. Configs are built either with a
//! [`DeviceConfigBuilder`], or from the textual attributes produced by the
//! platform configuration with [`DeviceConfig::from_attributes`].

use crate::gpio::GpioLine;
use crate::gpio::PinGroupRegistry;
use crate::selection::SelectTarget;
use crate::selection::Selector;
use crate::Error;
use media_messages::media::Speed;
use media_messages::ADDR_A0;
use media_messages::NO_MAX_POWER_DEFINED;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The module-select group name meaning the module is alone on its bus.
pub const MODULE_ALWAYS_ENABLED: &str = "module_always_enabled";

/// Return the default settle time after selecting a module.
pub const fn default_select_delay() -> Duration {
    Duration::ZERO
}

/// Return the default time to hold a module after releasing reset.
pub const fn default_reset_delay() -> Duration {
    Duration::ZERO
}

/// Return the default bus address of a module.
pub const fn default_address() -> u8 {
    ADDR_A0
}

/// The driver family of a cage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Sfp,
    Qsfp,
    #[serde(rename = "qsfp28_dd")]
    QsfpDD,
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sfp" => Ok(Family::Sfp),
            "qsfp" => Ok(Family::Qsfp),
            "qsfp28_dd" | "qsfp-dd" => Ok(Family::QsfpDD),
            _ => Err(Error::Config(format!("unknown driver family '{s}'"))),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Sfp => write!(f, "sfp"),
            Family::Qsfp => write!(f, "qsfp"),
            Family::QsfpDD => write!(f, "qsfp28_dd"),
        }
    }
}

/// The kind of port a cage provides.
///
/// Serialized with the names used in device attributes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum PortType {
    #[serde(rename = "SFP")]
    Sfp,
    #[serde(rename = "SFPPLUS")]
    SfpPlus,
    #[serde(rename = "SFP28")]
    Sfp28,
    #[serde(rename = "QSFP")]
    Qsfp,
    #[serde(rename = "QSFP28")]
    Qsfp28,
    /// The first logical port of a QSFP28-DD cage.
    #[serde(rename = "QSFP28-DD-1")]
    QsfpDD1,
    /// The second logical port of a QSFP28-DD cage.
    #[serde(rename = "QSFP28-DD-2")]
    QsfpDD2,
    #[serde(rename = "BACKPLANE")]
    Backplane,
    #[serde(rename = "RJ45")]
    Rj45,
}

impl PortType {
    /// The port type assumed when a family's config names none.
    pub const fn default_for(family: Family) -> Self {
        match family {
            Family::Sfp => PortType::SfpPlus,
            Family::Qsfp => PortType::Qsfp,
            Family::QsfpDD => PortType::QsfpDD1,
        }
    }

    /// The fastest speed the port supports.
    pub const fn capability(&self) -> Speed {
        match self {
            PortType::Sfp | PortType::Rj45 => Speed::Speed1G,
            PortType::SfpPlus | PortType::Backplane => Speed::Speed10G,
            PortType::Sfp28 => Speed::Speed25G,
            PortType::Qsfp => Speed::Speed40G,
            PortType::Qsfp28 => Speed::Speed100G,
            PortType::QsfpDD1 | PortType::QsfpDD2 => Speed::Speed200G,
        }
    }

    /// The power budget of the port, in milliwatts, when the config sets
    /// none.
    pub const fn default_max_power_mw(&self) -> i32 {
        match self {
            PortType::Sfp | PortType::SfpPlus | PortType::Sfp28 => 2000,
            PortType::Qsfp => 3500,
            PortType::Qsfp28 => 4500,
            PortType::QsfpDD1 | PortType::QsfpDD2 => 7000,
            PortType::Backplane | PortType::Rj45 => NO_MAX_POWER_DEFINED,
        }
    }

    /// The number of logical ports sharing the cage.
    pub const fn port_density(&self) -> u8 {
        match self {
            PortType::QsfpDD1 | PortType::QsfpDD2 => 2,
            _ => 1,
        }
    }

    /// The rank of this logical port within its cage, counting from 0.
    pub const fn sub_port_rank(&self) -> u8 {
        match self {
            PortType::QsfpDD2 => 1,
            _ => 0,
        }
    }
}

impl FromStr for PortType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SFP" => Ok(PortType::Sfp),
            "SFPPLUS" => Ok(PortType::SfpPlus),
            "SFP28" => Ok(PortType::Sfp28),
            "QSFP" => Ok(PortType::Qsfp),
            "QSFP28" => Ok(PortType::Qsfp28),
            "QSFP28-DD-1" => Ok(PortType::QsfpDD1),
            "QSFP28-DD-2" => Ok(PortType::QsfpDD2),
            "BACKPLANE" => Ok(PortType::Backplane),
            "RJ45" => Ok(PortType::Rj45),
            _ => Err(Error::Config(format!("unknown port type '{s}'"))),
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Sfp => "SFP",
            PortType::SfpPlus => "SFPPLUS",
            PortType::Sfp28 => "SFP28",
            PortType::Qsfp => "QSFP",
            PortType::Qsfp28 => "QSFP28",
            PortType::QsfpDD1 => "QSFP28-DD-1",
            PortType::QsfpDD2 => "QSFP28-DD-2",
            PortType::Backplane => "BACKPLANE",
            PortType::Rj45 => "RJ45",
        };
        write!(f, "{s}")
    }
}

/// The speed LED of an SFP port.
#[derive(Clone, Debug)]
pub struct PortLed {
    pub line: GpioLine,
    /// Level of the line for 1G operation.
    pub value_1g: bool,
    /// Level of the line for 10G operation.
    pub value_10g: bool,
}

/// The wiring of one cage.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub instance: u32,
    pub alias: String,
    pub family: Family,
    pub port_type: PortType,

    /// The bus address of the module's serial ID memory.
    pub address: u8,

    /// The groups routing the shared bus to the module.
    pub selector: Selector,

    /// The time to wait after selecting the module, before the first
    /// transaction.
    pub select_delay: Duration,

    pub presence: GpioLine,
    pub reset: Option<GpioLine>,

    /// The time a module needs after reset is released.
    pub reset_delay: Duration,

    pub low_power: Option<GpioLine>,

    /// The transmitter disable line of an SFP cage.
    pub tx_control: Option<GpioLine>,
    pub rx_los: Option<GpioLine>,
    pub tx_fault: Option<GpioLine>,
    pub port_led: Option<PortLed>,

    /// The default speed of the port, if the platform names one.
    pub default_speed_mbps: Option<u32>,

    /// Added to every channel of a QSFP28-DD logical port.
    pub sub_port_channel_offset: u8,

    /// The power budget of the port, in milliwatts.
    pub max_port_power_mw: i32,
}

/// A builder interface for generating a [`DeviceConfig`].
#[derive(Debug)]
pub struct DeviceConfigBuilder {
    alias: String,
    family: Family,
    instance: Option<u32>,
    port_type: Option<PortType>,
    address: Option<u8>,
    mux: Option<SelectTarget>,
    module: Option<SelectTarget>,
    select_delay: Option<Duration>,
    presence: Option<GpioLine>,
    reset: Option<GpioLine>,
    reset_delay: Option<Duration>,
    low_power: Option<GpioLine>,
    tx_control: Option<GpioLine>,
    rx_los: Option<GpioLine>,
    tx_fault: Option<GpioLine>,
    port_led: Option<PortLed>,
    default_speed_mbps: Option<u32>,
    sub_port_channel_offset: Option<u8>,
    max_port_power_mw: Option<i32>,
}

impl DeviceConfigBuilder {
    /// Create a new builder for a cage of `family`, named `alias`.
    pub fn new(alias: impl AsRef<str>, family: Family) -> Self {
        Self {
            alias: String::from(alias.as_ref()),
            family,
            instance: None,
            port_type: None,
            address: None,
            mux: None,
            module: None,
            select_delay: None,
            presence: None,
            reset: None,
            reset_delay: None,
            low_power: None,
            tx_control: None,
            rx_los: None,
            tx_fault: None,
            port_led: None,
            default_speed_mbps: None,
            sub_port_channel_offset: None,
            max_port_power_mw: None,
        }
    }

    pub fn instance(mut self, instance: u32) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn port_type(mut self, port_type: PortType) -> Self {
        self.port_type = Some(port_type);
        self
    }

    /// Set the bus address of the module.
    pub fn address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the mux group and the value that routes the bus to this cage.
    pub fn mux(mut self, target: SelectTarget) -> Self {
        self.mux = Some(target);
        self
    }

    /// Set the module-select group and the value that selects this cage.
    pub fn module_select(mut self, target: SelectTarget) -> Self {
        self.module = Some(target);
        self
    }

    pub fn select_delay(mut self, delay: Duration) -> Self {
        self.select_delay = Some(delay);
        self
    }

    pub fn presence(mut self, line: GpioLine) -> Self {
        self.presence = Some(line);
        self
    }

    pub fn reset(mut self, line: GpioLine) -> Self {
        self.reset = Some(line);
        self
    }

    pub fn reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = Some(delay);
        self
    }

    pub fn low_power(mut self, line: GpioLine) -> Self {
        self.low_power = Some(line);
        self
    }

    pub fn tx_control(mut self, line: GpioLine) -> Self {
        self.tx_control = Some(line);
        self
    }

    pub fn rx_los(mut self, line: GpioLine) -> Self {
        self.rx_los = Some(line);
        self
    }

    pub fn tx_fault(mut self, line: GpioLine) -> Self {
        self.tx_fault = Some(line);
        self
    }

    pub fn port_led(mut self, led: PortLed) -> Self {
        self.port_led = Some(led);
        self
    }

    pub fn default_speed_mbps(mut self, mbps: u32) -> Self {
        self.default_speed_mbps = Some(mbps);
        self
    }

    pub fn sub_port_channel_offset(mut self, offset: u8) -> Self {
        self.sub_port_channel_offset = Some(offset);
        self
    }

    pub fn max_port_power_mw(mut self, mw: i32) -> Self {
        self.max_port_power_mw = Some(mw);
        self
    }

    /// Build a `DeviceConfig` from `self`.
    pub fn build(self) -> Result<DeviceConfig, Error> {
        let presence = self.presence.ok_or_else(|| {
            Error::Config(format!("cage '{}' has no presence line", self.alias))
        })?;
        if let (Some(mux), Some(module)) = (&self.mux, &self.module) {
            if mux.group.same_group(&module.group) {
                return Err(Error::Config(format!(
                    "cage '{}' uses pin group '{}' for both mux and module select",
                    self.alias,
                    mux.group.name(),
                )));
            }
        }
        let port_type = self
            .port_type
            .unwrap_or_else(|| PortType::default_for(self.family));
        let family_matches = match self.family {
            Family::Sfp => matches!(
                port_type,
                PortType::Sfp
                    | PortType::SfpPlus
                    | PortType::Sfp28
                    | PortType::Backplane
                    | PortType::Rj45
            ),
            Family::Qsfp => matches!(
                port_type,
                PortType::Qsfp | PortType::Qsfp28 | PortType::QsfpDD1 | PortType::QsfpDD2
            ),
            Family::QsfpDD => matches!(port_type, PortType::QsfpDD1 | PortType::QsfpDD2),
        };
        if !family_matches {
            return Err(Error::Config(format!(
                "port type {port_type} is not valid for a {} cage",
                self.family
            )));
        }
        Ok(DeviceConfig {
            instance: self.instance.unwrap_or(0),
            alias: self.alias,
            family: self.family,
            port_type,
            address: self.address.unwrap_or_else(default_address),
            selector: Selector::new(self.mux, self.module),
            select_delay: self.select_delay.unwrap_or_else(default_select_delay),
            presence,
            reset: self.reset,
            reset_delay: self.reset_delay.unwrap_or_else(default_reset_delay),
            low_power: self.low_power,
            tx_control: self.tx_control,
            rx_los: self.rx_los,
            tx_fault: self.tx_fault,
            port_led: self.port_led,
            default_speed_mbps: self.default_speed_mbps,
            sub_port_channel_offset: self.sub_port_channel_offset.unwrap_or(0),
            max_port_power_mw: self
                .max_port_power_mw
                .unwrap_or_else(|| port_type.default_max_power_mw()),
        })
    }
}

// Parse an unsigned attribute, hexadecimal with a `0x` prefix and decimal
// otherwise.
fn parse_number<T: TryFrom<u64>>(key: &str, value: &str) -> Result<T, Error> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed
        .ok()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| Error::Config(format!("invalid value '{value}' for '{key}'")))
}

struct Attributes<'a> {
    attrs: &'a BTreeMap<String, String>,
    registry: &'a PinGroupRegistry,
}

impl Attributes<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str, Error> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("missing attribute '{key}'")))
    }

    fn number<T: TryFrom<u64>>(&self, key: &str) -> Result<Option<T>, Error> {
        self.get(key).map(|v| parse_number(key, v)).transpose()
    }

    fn millis(&self, key: &str) -> Result<Option<Duration>, Error> {
        Ok(self.number::<u64>(key)?.map(Duration::from_millis))
    }

    // A GPIO line named by a `<prefix>_bus` group and `<prefix>_bitmask`
    // bit position.
    fn line(&self, bus_key: &str, bit_key: &str) -> Result<Option<GpioLine>, Error> {
        let Some(name) = self.get(bus_key) else {
            return Ok(None);
        };
        let group = self.registry.resolve(name)?;
        let bit = parse_number(bit_key, self.require(bit_key)?)?;
        Ok(Some(GpioLine::new(group, bit)))
    }
}

impl DeviceConfig {
    /// Build a config from textual attributes, resolving pin groups by name
    /// through `registry`.
    pub fn from_attributes(
        alias: impl AsRef<str>,
        family: Family,
        attrs: &BTreeMap<String, String>,
        registry: &PinGroupRegistry,
    ) -> Result<Self, Error> {
        let a = Attributes { attrs, registry };
        let mut builder = DeviceConfigBuilder::new(alias, family);

        if let Some(instance) = a.number("instance")? {
            builder = builder.instance(instance);
        }
        if let Some(address) = a.number("addr")? {
            builder = builder.address(address);
        }
        if let Some(port_type) = a.get("port_type") {
            builder = builder.port_type(port_type.parse()?);
        }
        if let Some(name) = a.get("mux_sel_bus") {
            let value = a.number("mux_sel_value")?.unwrap_or(0);
            builder = builder.mux(SelectTarget::new(registry.resolve(name)?, value));
        }
        match a.require("mod_sel_bus")? {
            MODULE_ALWAYS_ENABLED => {}
            name => {
                let value = parse_number("mod_sel_value", a.require("mod_sel_value")?)?;
                builder = builder.module_select(SelectTarget::new(registry.resolve(name)?, value));
            }
        }
        if let Some(delay) = a.millis("mod_sel_delay")? {
            builder = builder.select_delay(delay);
        }
        if let Some(line) = a.line("mod_pres_bus", "mod_pres_bitmask")? {
            builder = builder.presence(line);
        }
        if let Some(line) = a.line("mod_reset_bus", "mod_reset_bitmask")? {
            builder = builder.reset(line);
        }
        if let Some(delay) = a.millis("mod_reset_delay_ms")? {
            builder = builder.reset_delay(delay);
        }
        if let Some(line) = a.line("mod_lpmode_bus", "mod_lpmode_bitmask")? {
            builder = builder.low_power(line);
        }
        if let Some(line) = a.line("mod_tx_control_bus", "mod_tx_control_bitmask")? {
            builder = builder.tx_control(line);
        }
        if let Some(line) = a.line("mod_rx_los_bus", "mod_rx_los_bitmask")? {
            builder = builder.rx_los(line);
        }
        if let Some(line) = a.line("mod_tx_fault_bus", "mod_tx_fault_bitmask")? {
            builder = builder.tx_fault(line);
        }
        if let Some(line) = a.line("port_led_bus", "port_led_bit_mask")? {
            let value_1g: u32 =
                parse_number("port_led_1g_mode_value", a.require("port_led_1g_mode_value")?)?;
            let value_10g: u32 = parse_number(
                "port_led_10g_mode_value",
                a.require("port_led_10g_mode_value")?,
            )?;
            builder = builder.port_led(PortLed {
                line,
                value_1g: value_1g != 0,
                value_10g: value_10g != 0,
            });
        }
        if let Some(mbps) = a.number("port_default_speed_mbps")? {
            builder = builder.default_speed_mbps(mbps);
        }
        if let Some(offset) = a.number("sub_port_channel_offset")? {
            builder = builder.sub_port_channel_offset(offset);
        }
        if let Some(mw) = a.number::<u32>("max_port_power_mw")? {
            let mw = i32::try_from(mw).map_err(|_| {
                Error::Config(format!("max_port_power_mw {mw} out of range"))
            })?;
            builder = builder.max_port_power_mw(mw);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceConfig;
    use super::DeviceConfigBuilder;
    use super::Family;
    use super::PortType;
    use crate::gpio::GpioLine;
    use crate::gpio::PinGroupHandle;
    use crate::gpio::PinGroupRegistry;
    use crate::selection::SelectTarget;
    use crate::sim::SimPinGroup;
    use crate::Error;
    use media_messages::media::Speed;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn registry() -> PinGroupRegistry {
        let mut r = PinGroupRegistry::new();
        for name in ["mux", "modsel", "present", "reset", "lpmode", "txdis", "led"] {
            r.insert(PinGroupHandle::new(name, SimPinGroup::new(0)));
        }
        r
    }

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_serialized_names_match_attributes() {
        for port_type in [PortType::Sfp, PortType::Qsfp28, PortType::QsfpDD2, PortType::Rj45] {
            let json = serde_json::to_string(&port_type).unwrap();
            assert_eq!(json, format!("\"{port_type}\""));
            assert_eq!(serde_json::from_str::<PortType>(&json).unwrap(), port_type);
        }
        assert_eq!(serde_json::to_string(&Family::QsfpDD).unwrap(), "\"qsfp28_dd\"");
        assert_eq!(
            serde_json::from_str::<Family>("\"sfp\"").unwrap(),
            Family::Sfp
        );
    }

    #[test]
    fn test_port_type_defaults() {
        assert_eq!(PortType::Sfp.capability(), Speed::Speed1G);
        assert_eq!(PortType::SfpPlus.capability(), Speed::Speed10G);
        assert_eq!(PortType::Qsfp28.capability(), Speed::Speed100G);
        assert_eq!(PortType::QsfpDD2.capability(), Speed::Speed200G);
        assert_eq!(PortType::Sfp28.default_max_power_mw(), 2000);
        assert_eq!(PortType::Qsfp.default_max_power_mw(), 3500);
        assert_eq!(PortType::Qsfp28.default_max_power_mw(), 4500);
        assert_eq!(PortType::QsfpDD1.default_max_power_mw(), 7000);
        assert_eq!(PortType::QsfpDD2.sub_port_rank(), 1);
        assert_eq!(PortType::QsfpDD1.port_density(), 2);
        assert_eq!("QSFP28-DD-2".parse::<PortType>().unwrap(), PortType::QsfpDD2);
        assert!(matches!("QSFP56".parse::<PortType>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let present = PinGroupHandle::new("present", SimPinGroup::new(0));
        let config = DeviceConfigBuilder::new("port1", Family::Qsfp)
            .presence(GpioLine::new(present, 3))
            .build()
            .unwrap();
        assert_eq!(config.address, 0x50);
        assert_eq!(config.port_type, PortType::Qsfp);
        assert_eq!(config.max_port_power_mw, 3500);
        assert_eq!(config.select_delay, Duration::ZERO);
        assert!(config.selector.mux.is_none());
    }

    #[test]
    fn test_builder_requires_presence() {
        let err = DeviceConfigBuilder::new("port1", Family::Sfp).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_rejects_shared_select_group() {
        let group = PinGroupHandle::new("mux", SimPinGroup::new(0));
        let present = PinGroupHandle::new("present", SimPinGroup::new(0));
        let err = DeviceConfigBuilder::new("port1", Family::Qsfp)
            .presence(GpioLine::new(present, 0))
            .mux(SelectTarget::new(group.clone(), 1))
            .module_select(SelectTarget::new(group, 2))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_rejects_mismatched_port_type() {
        let present = PinGroupHandle::new("present", SimPinGroup::new(0));
        let err = DeviceConfigBuilder::new("port1", Family::Sfp)
            .presence(GpioLine::new(present, 0))
            .port_type(PortType::Qsfp28)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_attributes_qsfp() {
        let config = DeviceConfig::from_attributes(
            "fp-port-3",
            Family::Qsfp,
            &attrs(&[
                ("instance", "3"),
                ("addr", "0x50"),
                ("mux_sel_bus", "mux"),
                ("mux_sel_value", "0x2"),
                ("mod_sel_bus", "modsel"),
                ("mod_sel_value", "0x8"),
                ("mod_sel_delay", "2"),
                ("mod_pres_bus", "present"),
                ("mod_pres_bitmask", "3"),
                ("mod_reset_bus", "reset"),
                ("mod_reset_bitmask", "3"),
                ("mod_reset_delay_ms", "1500"),
                ("mod_lpmode_bus", "lpmode"),
                ("mod_lpmode_bitmask", "3"),
                ("port_type", "QSFP28"),
            ]),
            &registry(),
        )
        .unwrap();
        assert_eq!(config.instance, 3);
        assert_eq!(config.port_type, PortType::Qsfp28);
        assert_eq!(config.max_port_power_mw, 4500);
        assert_eq!(config.select_delay, Duration::from_millis(2));
        assert_eq!(config.reset_delay, Duration::from_millis(1500));
        assert_eq!(config.selector.mux.as_ref().unwrap().value, 2);
        assert_eq!(config.selector.module.as_ref().unwrap().value, 8);
        assert_eq!(config.presence.bit, 3);
        assert_eq!(config.low_power.as_ref().unwrap().group.name(), "lpmode");
    }

    #[test]
    fn test_from_attributes_module_always_enabled() {
        let config = DeviceConfig::from_attributes(
            "sfp-1",
            Family::Sfp,
            &attrs(&[
                ("mod_sel_bus", "module_always_enabled"),
                ("mod_pres_bus", "present"),
                ("mod_pres_bitmask", "0"),
                ("mod_tx_control_bus", "txdis"),
                ("mod_tx_control_bitmask", "1"),
                ("port_led_bus", "led"),
                ("port_led_bit_mask", "4"),
                ("port_led_1g_mode_value", "0"),
                ("port_led_10g_mode_value", "1"),
                ("max_port_power_mw", "1500"),
            ]),
            &registry(),
        )
        .unwrap();
        assert!(config.selector.module.is_none());
        assert_eq!(config.port_type, PortType::SfpPlus);
        assert_eq!(config.max_port_power_mw, 1500);
        let led = config.port_led.unwrap();
        assert!(!led.value_1g);
        assert!(led.value_10g);
        assert_eq!(led.line.bit, 4);
    }

    #[test]
    fn test_from_attributes_errors() {
        let r = registry();
        // Module select is mandatory.
        let err = DeviceConfig::from_attributes(
            "p",
            Family::Qsfp,
            &attrs(&[("mod_pres_bus", "present"), ("mod_pres_bitmask", "0")]),
            &r,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // Unknown group.
        let err = DeviceConfig::from_attributes(
            "p",
            Family::Qsfp,
            &attrs(&[
                ("mod_sel_bus", "module_always_enabled"),
                ("mod_pres_bus", "nope"),
                ("mod_pres_bitmask", "0"),
            ]),
            &r,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // Bad number.
        let err = DeviceConfig::from_attributes(
            "p",
            Family::Qsfp,
            &attrs(&[
                ("mod_sel_bus", "module_always_enabled"),
                ("mod_pres_bus", "present"),
                ("mod_pres_bitmask", "zero"),
            ]),
            &r,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_dd_sub_port() {
        let config = DeviceConfig::from_attributes(
            "dd-2",
            Family::QsfpDD,
            &attrs(&[
                ("mod_sel_bus", "module_always_enabled"),
                ("mod_pres_bus", "present"),
                ("mod_pres_bitmask", "0"),
                ("port_type", "QSFP28-DD-2"),
                ("sub_port_channel_offset", "4"),
            ]),
            &registry(),
        )
        .unwrap();
        assert_eq!(config.sub_port_channel_offset, 4);
        assert_eq!(config.port_type.sub_port_rank(), 1);
        assert_eq!(config.max_port_power_mw, 7000);
    }
}
