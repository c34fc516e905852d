// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! SFF-8472 memory map of SFP modules.
//!
//! The serial ID lives at A0h, and the diagnostics at A2h. Neither half is
//! paged below byte 128.

use super::RegInfo;
use super::RegMap;
use media_messages::media::Parameter;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::DeviceAddr;
use media_messages::Page;
use media_messages::ADDR_A2;
use media_messages::VENDOR_DATE_LEN;
use media_messages::VENDOR_NAME_LEN;
use media_messages::VENDOR_OUI_LEN;
use media_messages::VENDOR_PART_NUMBER_LEN;
use media_messages::VENDOR_REVISION_LEN;
use media_messages::VENDOR_SERIAL_NUMBER_LEN;

// A0h.
pub const IDENTIFIER: u8 = 0;
pub const COMPLIANCE: u8 = 3;
pub const COMPLIANCE_LEN: usize = 8;
pub const OPTIONS: u8 = 64;
/// Set when the diagnostic memory implements SFF-8472 paging.
pub const OPTIONS_PAGING_BIT: u8 = 4;
/// Second options byte, holding the tunable transmitter bit.
pub const OPTIONS_TUNABLE: u8 = 65;
pub const TUNABLE_BIT: u8 = 6;
pub const DIAG_MON_TYPE: u8 = 92;
pub const DIAG_DDM_BIT: u8 = 6;
pub const DIAG_INTERNAL_CAL_BIT: u8 = 5;
pub const DIAG_EXTERNAL_CAL_BIT: u8 = 4;
pub const DIAG_RX_POWER_AVERAGE_BIT: u8 = 3;
pub const ENHANCED_OPTIONS: u8 = 93;
pub const ENHANCED_ALARM_BIT: u8 = 7;
pub const ENHANCED_SOFT_TX_DISABLE_BIT: u8 = 6;
pub const ENHANCED_SOFT_TX_FAULT_BIT: u8 = 5;
pub const ENHANCED_SOFT_RX_LOS_BIT: u8 = 4;
pub const ENHANCED_RATE_SELECT_BIT: u8 = 1;

// A2h.
pub const RX_POWER_CAL: u8 = 56;
pub const TX_BIAS_CAL: u8 = 76;
pub const TX_POWER_CAL: u8 = 80;
pub const TEMPERATURE_CAL: u8 = 84;
pub const VOLTAGE_CAL: u8 = 88;
pub const TEMPERATURE: u8 = 96;
pub const VOLTAGE: u8 = 98;
pub const TX_BIAS: u8 = 100;
pub const TX_POWER: u8 = 102;
pub const RX_POWER: u8 = 104;
pub const STATUS_CONTROL: u8 = 110;
pub const STATUS_RX_LOS_BIT: u8 = 1;
pub const STATUS_TX_FAULT_BIT: u8 = 2;
pub const STATUS_SOFT_TX_DISABLE_BIT: u8 = 6;
pub const STATUS_TX_DISABLE_STATE_BIT: u8 = 7;
pub const ALARM_FLAGS: u8 = 112;
pub const WARNING_FLAGS: u8 = 116;
pub const PAGE_SELECT: u8 = 127;
pub const TARGET_WAVELENGTH: u8 = 146;

/// Flags in the first alarm or warning byte.
pub const FLAG_TEMP_HIGH: u8 = 0x80;
pub const FLAG_TEMP_LOW: u8 = 0x40;
pub const FLAG_VOLT_HIGH: u8 = 0x20;
pub const FLAG_VOLT_LOW: u8 = 0x10;
pub const FLAG_BIAS_HIGH: u8 = 0x08;
pub const FLAG_BIAS_LOW: u8 = 0x04;
pub const FLAG_TX_POWER_HIGH: u8 = 0x02;
pub const FLAG_TX_POWER_LOW: u8 = 0x01;
/// Flags in the second alarm or warning byte.
pub const FLAG_RX_POWER_HIGH: u8 = 0x80;
pub const FLAG_RX_POWER_LOW: u8 = 0x40;

/// SFF-8690 tunable page, selected through A2h byte 127.
pub mod tunable {
    pub const PAGE: u8 = 2;
    pub const CAPABILITIES: u8 = 132;
    pub const CAPABILITIES_LEN: usize = 10;
    pub const TUNING_SUPPORT: u8 = 128;
    pub const CHANNEL_TUNING_BIT: u8 = 1;
    pub const WAVELENGTH_TUNING_BIT: u8 = 0;
    pub const CHANNEL_SET: u8 = 144;
    pub const WAVELENGTH_SET: u8 = 146;
    pub const STATUS: u8 = 168;
    /// TEC fault, wavelength unlocked, tuning in progress.
    pub const STATUS_MASK: u8 = 0x70;
    pub const LATCHED_STATUS: u8 = 172;
    /// TEC fault, wavelength unlocked, bad channel. Bit 3 (new channel
    /// acquired) is a success indication and is not part of the mask.
    pub const LATCHED_STATUS_MASK: u8 = 0x70;
}

const fn param(p: Parameter) -> RegInfo {
    match p {
        Parameter::Wavelength => RegInfo::new(60, 2),
        Parameter::WavelengthTolerance => RegInfo::NOT_SUPPORTED,
        Parameter::MaxCaseTemp => RegInfo::NOT_SUPPORTED,
        Parameter::CcBase => RegInfo::new(63, 1),
        Parameter::CcExt => RegInfo::new(95, 1),
        Parameter::Connector => RegInfo::new(2, 1),
        Parameter::EncodingType => RegInfo::new(11, 1),
        Parameter::NominalBitrate => RegInfo::new(12, 1),
        Parameter::Identifier => RegInfo::new(IDENTIFIER, 1),
        Parameter::ExtIdentifier => RegInfo::new(1, 1),
        Parameter::LengthSmfKm => RegInfo::new(14, 1),
        Parameter::LengthOm1 => RegInfo::new(17, 1),
        Parameter::LengthOm2 => RegInfo::new(16, 1),
        Parameter::LengthOm3 => RegInfo::new(19, 1),
        Parameter::LengthCableAssembly => RegInfo::new(18, 1),
        Parameter::LengthSmf => RegInfo::new(15, 1),
        Parameter::Options => RegInfo::new(OPTIONS, 2),
        Parameter::EnhancedOptions => RegInfo::new(ENHANCED_OPTIONS, 1),
        Parameter::DiagMonType => RegInfo::new(DIAG_MON_TYPE, 1),
        Parameter::DeviceTech => RegInfo::NOT_SUPPORTED,
        Parameter::MaxBitrate => RegInfo::new(66, 1),
        Parameter::MinBitrate => RegInfo::new(67, 1),
        Parameter::ExtComplianceCode => RegInfo::new(36, 1),
        Parameter::FreeSideDevProp => RegInfo::NOT_SUPPORTED,
    }
}

const fn vendor(v: VendorField) -> RegInfo {
    match v {
        VendorField::Name => RegInfo::printable(20, VENDOR_NAME_LEN as u8),
        VendorField::Oui => RegInfo::new(37, VENDOR_OUI_LEN as u8),
        VendorField::SerialNumber => RegInfo::printable(68, VENDOR_SERIAL_NUMBER_LEN as u8),
        VendorField::Date => RegInfo::printable(84, VENDOR_DATE_LEN as u8),
        VendorField::PartNumber => RegInfo::printable(40, VENDOR_PART_NUMBER_LEN as u8),
        VendorField::Revision => RegInfo::printable(56, VENDOR_REVISION_LEN as u8),
    }
}

const fn threshold(t: Threshold) -> RegInfo {
    let offset = match t {
        Threshold::TempHighAlarm => 0,
        Threshold::TempLowAlarm => 2,
        Threshold::TempHighWarning => 4,
        Threshold::TempLowWarning => 6,
        Threshold::VoltHighAlarm => 8,
        Threshold::VoltLowAlarm => 10,
        Threshold::VoltHighWarning => 12,
        Threshold::VoltLowWarning => 14,
        Threshold::TxBiasHighAlarm => 16,
        Threshold::TxBiasLowAlarm => 18,
        Threshold::TxBiasHighWarning => 20,
        Threshold::TxBiasLowWarning => 22,
        Threshold::TxPowerHighAlarm => 24,
        Threshold::TxPowerLowAlarm => 26,
        Threshold::TxPowerHighWarning => 28,
        Threshold::TxPowerLowWarning => 30,
        Threshold::RxPowerHighAlarm => 32,
        Threshold::RxPowerLowAlarm => 34,
        Threshold::RxPowerHighWarning => 36,
        Threshold::RxPowerLowWarning => 38,
    };
    RegInfo::new(offset, 2)
}

/// The SFF-8472 register map.
pub const MAP: RegMap = RegMap {
    name: "SFF-8472",
    param,
    vendor,
    threshold,
    threshold_device: DeviceAddr::Explicit(ADDR_A2),
    threshold_page: Page::Ignore,
};

#[cfg(test)]
mod tests {
    use super::MAP;
    use media_messages::media::Parameter;
    use media_messages::media::Threshold;
    use media_messages::media::VendorField;

    #[test]
    fn test_thresholds_are_contiguous_words() {
        let mut offsets: Vec<u8> = Threshold::ALL
            .iter()
            .map(|t| (MAP.threshold)(*t).offset)
            .collect();
        offsets.sort();
        assert_eq!(offsets, (0..40).step_by(2).collect::<Vec<u8>>());
    }

    #[test]
    fn test_unsupported_params() {
        let unsupported: Vec<_> = Parameter::ALL
            .iter()
            .filter(|p| !(MAP.param)(**p).is_supported())
            .copied()
            .collect();
        assert_eq!(
            unsupported,
            vec![
                Parameter::WavelengthTolerance,
                Parameter::MaxCaseTemp,
                Parameter::DeviceTech,
                Parameter::FreeSideDevProp,
            ]
        );
    }

    #[test]
    fn test_vendor_fields_fit_lower_page() {
        for v in VendorField::ALL {
            let info = (MAP.vendor)(v);
            assert!(usize::from(info.offset) + info.vendor_read_len() <= 128);
        }
        assert!(!(MAP.vendor)(VendorField::Oui).printable);
    }
}
