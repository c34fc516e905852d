// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! SFF-8436 / SFF-8636 memory map of QSFP, QSFP+ and QSFP28 modules.

use super::ChannelBit;
use super::ChannelFlags;
use super::QsfpLayout;
use super::RegInfo;
use super::RegMap;
use media_messages::media::Parameter;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::DeviceAddr;
use media_messages::Page;
use media_messages::VENDOR_DATE_LEN;
use media_messages::VENDOR_NAME_LEN;
use media_messages::VENDOR_OUI_LEN;
use media_messages::VENDOR_PART_NUMBER_LEN;
use media_messages::VENDOR_REVISION_LEN;
use media_messages::VENDOR_SERIAL_NUMBER_LEN;

pub const IDENTIFIER: u8 = 0;
/// EEPROM map revision, used by QSFP28-DD modules.
pub const REVISION: u8 = 1;
pub const STATUS: u8 = 2;
/// Set when the memory is flat, i.e. paging is not supported.
pub const STATUS_FLAT_MEM_BIT: u8 = 2;
pub const RX_RATE_SELECT: u8 = 87;
pub const TX_RATE_SELECT: u8 = 88;
pub const POWER_CONTROL: u8 = 93;
pub const POWER_OVERRIDE_BIT: u8 = 0;
pub const POWER_SET_BIT: u8 = 1;
pub const HIGH_POWER_CLASS_BIT: u8 = 2;
pub const PAGE_SELECT: u8 = 127;
pub const EXT_IDENTIFIER: u8 = 129;
pub const COMPLIANCE: u8 = 131;
pub const COMPLIANCE_LEN: usize = 8;
/// Options byte holding the CDR support bits.
pub const OPTIONS_CDR: u8 = 194;
pub const TX_CDR_SUPPORT_BIT: u8 = 7;
pub const RX_CDR_SUPPORT_BIT: u8 = 6;
/// Options byte holding the transmit disable and rate select support bits.
pub const OPTIONS_CONTROL: u8 = 195;
pub const TX_DISABLE_SUPPORT_BIT: u8 = 4;
pub const RATE_SELECT_SUPPORT_BIT: u8 = 5;
pub const DIAG_RX_POWER_AVERAGE_BIT: u8 = 3;

/// OUI of a QSA adapter, read through the SFP identity at this offset.
pub const QSA_OUI: u8 = 64;
pub const QSA28_OUI: [u8; 3] = [0x00, 0x02, 0xc9];

/// Extended rate select values, by firmware revision and CDR state.
pub const RATE_SELECT_REV0_CDR_ON: u8 = 0xaa;
pub const RATE_SELECT_REV0_CDR_OFF: u8 = 0x00;
pub const RATE_SELECT_REV1_CDR_ON: u8 = 0xff;
pub const RATE_SELECT_REV1_CDR_OFF: u8 = 0x55;

const fn param(p: Parameter) -> RegInfo {
    match p {
        Parameter::Wavelength => RegInfo::new(186, 2),
        Parameter::WavelengthTolerance => RegInfo::new(188, 2),
        Parameter::MaxCaseTemp => RegInfo::new(190, 1),
        Parameter::CcBase => RegInfo::new(191, 1),
        Parameter::CcExt => RegInfo::new(223, 1),
        Parameter::Connector => RegInfo::new(130, 1),
        Parameter::EncodingType => RegInfo::new(139, 1),
        Parameter::NominalBitrate => RegInfo::new(140, 1),
        Parameter::Identifier => RegInfo::new(128, 1),
        Parameter::ExtIdentifier => RegInfo::new(EXT_IDENTIFIER, 1),
        Parameter::LengthSmfKm => RegInfo::new(142, 1),
        Parameter::LengthOm1 => RegInfo::new(145, 1),
        Parameter::LengthOm2 => RegInfo::new(144, 1),
        Parameter::LengthOm3 => RegInfo::new(143, 1),
        Parameter::LengthCableAssembly => RegInfo::new(146, 1),
        Parameter::LengthSmf => RegInfo::NOT_SUPPORTED,
        Parameter::Options => RegInfo::new(192, 4),
        Parameter::EnhancedOptions => RegInfo::new(221, 1),
        Parameter::DiagMonType => RegInfo::new(220, 1),
        Parameter::DeviceTech => RegInfo::new(147, 1),
        Parameter::MaxBitrate => RegInfo::NOT_SUPPORTED,
        Parameter::MinBitrate => RegInfo::NOT_SUPPORTED,
        Parameter::ExtComplianceCode => RegInfo::NOT_SUPPORTED,
        Parameter::FreeSideDevProp => RegInfo::new(113, 1),
    }
}

const fn vendor(v: VendorField) -> RegInfo {
    match v {
        VendorField::Name => RegInfo::printable(148, VENDOR_NAME_LEN as u8),
        VendorField::Oui => RegInfo::new(165, VENDOR_OUI_LEN as u8),
        VendorField::SerialNumber => RegInfo::printable(196, VENDOR_SERIAL_NUMBER_LEN as u8),
        VendorField::Date => RegInfo::printable(212, VENDOR_DATE_LEN as u8),
        VendorField::PartNumber => RegInfo::printable(168, VENDOR_PART_NUMBER_LEN as u8),
        VendorField::Revision => RegInfo::printable(184, VENDOR_REVISION_LEN as u8),
    }
}

const fn threshold(t: Threshold) -> RegInfo {
    match t {
        Threshold::TempHighAlarm => RegInfo::new(128, 2),
        Threshold::TempLowAlarm => RegInfo::new(130, 2),
        Threshold::TempHighWarning => RegInfo::new(132, 2),
        Threshold::TempLowWarning => RegInfo::new(134, 2),
        Threshold::VoltHighAlarm => RegInfo::new(144, 2),
        Threshold::VoltLowAlarm => RegInfo::new(146, 2),
        Threshold::VoltHighWarning => RegInfo::new(148, 2),
        Threshold::VoltLowWarning => RegInfo::new(150, 2),
        Threshold::RxPowerHighAlarm => RegInfo::new(176, 2),
        Threshold::RxPowerLowAlarm => RegInfo::new(178, 2),
        Threshold::RxPowerHighWarning => RegInfo::new(180, 2),
        Threshold::RxPowerLowWarning => RegInfo::new(182, 2),
        Threshold::TxBiasHighAlarm => RegInfo::new(184, 2),
        Threshold::TxBiasLowAlarm => RegInfo::new(186, 2),
        Threshold::TxBiasHighWarning => RegInfo::new(188, 2),
        Threshold::TxBiasLowWarning => RegInfo::new(190, 2),
        Threshold::TxPowerHighAlarm
        | Threshold::TxPowerLowAlarm
        | Threshold::TxPowerHighWarning
        | Threshold::TxPowerLowWarning => RegInfo::NOT_SUPPORTED,
    }
}

/// The SFF-8636 register map.
pub const MAP: RegMap = RegMap {
    name: "SFF-8636",
    param,
    vendor,
    threshold,
    threshold_device: DeviceAddr::Auto,
    threshold_page: Page::PAGE_03,
};

/// Lower memory of QSFP, QSFP+ and QSFP28 modules.
pub const LAYOUT: QsfpLayout = QsfpLayout {
    name: "SFF-8636",
    channels: 4,
    map: &MAP,
    temperature: 22,
    voltage: 26,
    rx_power: 34,
    tx_bias: 42,
    tx_power: None,
    temp_flags: 6,
    volt_flags: 7,
    channel_flags: ChannelFlags::Nibbles {
        rx_power: 9,
        tx_bias: 11,
    },
    tx_los: ChannelBit::new(3, 4),
    rx_los: ChannelBit::new(3, 0),
    tx_fault: ChannelBit::new(4, 0),
    tx_disable: ChannelBit::new(86, 0),
    cdr_tx: ChannelBit::new(98, 4),
    cdr_rx: ChannelBit::new(98, 0),
};

#[cfg(test)]
mod tests {
    use super::LAYOUT;
    use super::MAP;
    use crate::regs::QsfpLayout;
    use media_messages::media::Threshold;
    use media_messages::Page;

    #[test]
    fn test_thresholds_on_page_3() {
        for t in Threshold::ALL {
            match MAP.threshold_address(t) {
                Some((addr, info)) => {
                    assert_eq!(addr.page, Page::PAGE_03);
                    assert!(addr.offset >= 128);
                    assert_eq!(info.size, 2);
                }
                None => assert!(matches!(
                    t,
                    Threshold::TxPowerHighAlarm
                        | Threshold::TxPowerLowAlarm
                        | Threshold::TxPowerHighWarning
                        | Threshold::TxPowerLowWarning
                )),
            }
        }
    }

    #[test]
    fn test_channel_words() {
        assert_eq!(QsfpLayout::channel_word(LAYOUT.rx_power, 3), 40);
        assert_eq!(QsfpLayout::channel_word(LAYOUT.tx_bias, 3), 48);
        assert_eq!(LAYOUT.tx_los.mask(2), 0x40);
        assert_eq!(LAYOUT.rx_los.mask(2), 0x04);
    }
}
