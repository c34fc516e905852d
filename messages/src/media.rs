// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Logical parameters, fields and controls of transceiver media.

use core::fmt;
use serde::Deserialize;
use serde::Serialize;

/// A port or media speed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum Speed {
    Speed10M,
    Speed100M,
    Speed1G,
    Speed2500M,
    Speed5G,
    Speed10G,
    Speed25G,
    Speed40G,
    Speed100G,
    Speed20G,
    Speed50G,
    Speed200G,
    Speed400G,
    Fc4G,
    Fc8G,
    Fc16G,
    Fc32G,
}

impl Speed {
    /// Return the nominal rate in megabits per second.
    pub const fn mbps(&self) -> u32 {
        match self {
            Speed::Speed10M => 10,
            Speed::Speed100M => 100,
            Speed::Speed1G => 1_000,
            Speed::Speed2500M => 2_500,
            Speed::Speed5G => 5_000,
            Speed::Speed10G => 10_000,
            Speed::Speed25G => 25_000,
            Speed::Speed40G => 40_000,
            Speed::Speed100G => 100_000,
            Speed::Speed20G => 20_000,
            Speed::Speed50G => 50_000,
            Speed::Speed200G => 200_000,
            Speed::Speed400G => 400_000,
            Speed::Fc4G => 4_000,
            Speed::Fc8G => 8_000,
            Speed::Fc16G => 16_000,
            Speed::Fc32G => 32_000,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Speed::Fc4G | Speed::Fc8G | Speed::Fc16G | Speed::Fc32G => {
                write!(f, "{}GFC", self.mbps() / 1000)
            }
            Speed::Speed10M | Speed::Speed100M => write!(f, "{}M", self.mbps()),
            Speed::Speed2500M => write!(f, "2.5G"),
            _ => write!(f, "{}G", self.mbps() / 1000),
        }
    }
}

/// A module-wide monitored quantity.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum ModuleMonitor {
    /// Module case temperature, in degrees C.
    Temperature,
    /// Module supply voltage, in volts.
    Voltage,
}

/// A per-channel monitored quantity.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum ChannelMonitor {
    /// Received optical power, in dBm.
    RxPower,
    /// Transmitter bias current, in mA.
    TxBias,
    /// Transmitted optical power, in dBm.
    TxPower,
}

/// A logical parameter in a module's serial ID memory.
///
/// The declaration order is significant: the register map tables are
/// indexed by it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum Parameter {
    Wavelength,
    WavelengthTolerance,
    MaxCaseTemp,
    CcBase,
    CcExt,
    Connector,
    EncodingType,
    NominalBitrate,
    Identifier,
    ExtIdentifier,
    LengthSmfKm,
    LengthOm1,
    LengthOm2,
    LengthOm3,
    LengthCableAssembly,
    LengthSmf,
    Options,
    EnhancedOptions,
    DiagMonType,
    DeviceTech,
    MaxBitrate,
    MinBitrate,
    ExtComplianceCode,
    FreeSideDevProp,
}

impl Parameter {
    pub const COUNT: usize = 24;

    pub const ALL: [Parameter; Self::COUNT] = [
        Parameter::Wavelength,
        Parameter::WavelengthTolerance,
        Parameter::MaxCaseTemp,
        Parameter::CcBase,
        Parameter::CcExt,
        Parameter::Connector,
        Parameter::EncodingType,
        Parameter::NominalBitrate,
        Parameter::Identifier,
        Parameter::ExtIdentifier,
        Parameter::LengthSmfKm,
        Parameter::LengthOm1,
        Parameter::LengthOm2,
        Parameter::LengthOm3,
        Parameter::LengthCableAssembly,
        Parameter::LengthSmf,
        Parameter::Options,
        Parameter::EnhancedOptions,
        Parameter::DiagMonType,
        Parameter::DeviceTech,
        Parameter::MaxBitrate,
        Parameter::MinBitrate,
        Parameter::ExtComplianceCode,
        Parameter::FreeSideDevProp,
    ];

    /// Position of this parameter in a register map table.
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// A vendor identification field.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum VendorField {
    Name,
    Oui,
    SerialNumber,
    Date,
    PartNumber,
    Revision,
}

impl VendorField {
    pub const COUNT: usize = 6;

    pub const ALL: [VendorField; Self::COUNT] = [
        VendorField::Name,
        VendorField::Oui,
        VendorField::SerialNumber,
        VendorField::Date,
        VendorField::PartNumber,
        VendorField::Revision,
    ];

    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for VendorField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            VendorField::Name => "name",
            VendorField::Oui => "oui",
            VendorField::SerialNumber => "serial",
            VendorField::Date => "date",
            VendorField::PartNumber => "part",
            VendorField::Revision => "revision",
        };
        write!(f, "{s}")
    }
}

/// An alarm or warning threshold.
///
/// Grouped by quantity (temperature, voltage, rx power, tx bias, tx power),
/// and within each group ordered high alarm, low alarm, high warning, low
/// warning.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum Threshold {
    TempHighAlarm,
    TempLowAlarm,
    TempHighWarning,
    TempLowWarning,
    VoltHighAlarm,
    VoltLowAlarm,
    VoltHighWarning,
    VoltLowWarning,
    RxPowerHighAlarm,
    RxPowerLowAlarm,
    RxPowerHighWarning,
    RxPowerLowWarning,
    TxBiasHighAlarm,
    TxBiasLowAlarm,
    TxBiasHighWarning,
    TxBiasLowWarning,
    TxPowerHighAlarm,
    TxPowerLowAlarm,
    TxPowerHighWarning,
    TxPowerLowWarning,
}

/// The physical quantity a threshold applies to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum Quantity {
    Temperature,
    Voltage,
    RxPower,
    TxBias,
    TxPower,
}

impl Threshold {
    pub const COUNT: usize = 20;

    pub const ALL: [Threshold; Self::COUNT] = [
        Threshold::TempHighAlarm,
        Threshold::TempLowAlarm,
        Threshold::TempHighWarning,
        Threshold::TempLowWarning,
        Threshold::VoltHighAlarm,
        Threshold::VoltLowAlarm,
        Threshold::VoltHighWarning,
        Threshold::VoltLowWarning,
        Threshold::RxPowerHighAlarm,
        Threshold::RxPowerLowAlarm,
        Threshold::RxPowerHighWarning,
        Threshold::RxPowerLowWarning,
        Threshold::TxBiasHighAlarm,
        Threshold::TxBiasLowAlarm,
        Threshold::TxBiasHighWarning,
        Threshold::TxBiasLowWarning,
        Threshold::TxPowerHighAlarm,
        Threshold::TxPowerLowAlarm,
        Threshold::TxPowerHighWarning,
        Threshold::TxPowerLowWarning,
    ];

    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// The quantity this threshold bounds.
    pub const fn quantity(&self) -> Quantity {
        match self.index() / 4 {
            0 => Quantity::Temperature,
            1 => Quantity::Voltage,
            2 => Quantity::RxPower,
            3 => Quantity::TxBias,
            _ => Quantity::TxPower,
        }
    }
}

/// A hardware control line of a module.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[cfg_attr(feature = "std", derive(clap::ValueEnum))]
pub enum ModuleControl {
    /// The low-power mode pin.
    LowPowerMode,
    /// The reset pin.
    Reset,
}

/// How a module measures received optical power.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum RxPowerType {
    /// Optical modulation amplitude.
    Oma = 0,
    /// Average power.
    Average = 1,
}

/// The kind of media attached to a port, for the PHY control helpers.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
#[allow(non_camel_case_types)]
pub enum MediaType {
    #[default]
    Default,
    /// A QSFP breakout carrying four 1000BASE-T copper PHYs.
    Qsfp4x1_1000BaseT,
    /// A QSFP-to-SFP adapter.
    QsaAdapter,
    /// An SFP+ carrying a 10GBASE-T PHY reached through the module mailbox.
    SfpPlus10GBaseT,
}

/// The kind of QSFP-to-SFP adapter in a QSFP cage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum QsaAdapter {
    None,
    Unknown,
    Qsa,
    Qsa28,
}

/// Firmware revision selecting the extended rate select encoding.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum FirmwareRevision {
    Rev0,
    Rev1,
}

/// The MAC interface mode of a copper PHY.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum PhyMode {
    Mii,
    Gmii,
    Sgmii,
}

/// Optional features of an SFP module.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct SfpFeatures {
    pub rate_select: bool,
    pub alarm_warning: bool,
    pub diag_monitoring: bool,
}

/// Optional features of a QSFP module.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct QsfpFeatures {
    pub rate_select: bool,
    pub tx_control: bool,
    pub paging: bool,
    pub software_power_mode: bool,
}

/// The optional features supported by a module.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum FeatureSupport {
    Sfp(SfpFeatures),
    Qsfp(QsfpFeatures),
}

/// Static properties of a port.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct PortInfo {
    pub max_port_speed_mbps: u32,
    /// The number of logical ports sharing the cage.
    pub port_density: u8,
    pub max_port_power_mw: i32,
}

/// Properties of the module currently inserted in a port.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct ModuleInfo {
    pub module_density: u8,
    pub eeprom_map_version: u8,
    pub software_controlled_power_mode: bool,
    pub max_module_power_mw: i32,
}
