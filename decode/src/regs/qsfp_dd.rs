// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Vendor QSFP28-DD memory maps, revisions 0x20 and 0x30.
//!
//! Revision 0x20 keeps the SFF-8636 serial ID layout, but moves the lower
//! memory monitors and controls. Revision 0x30 also moves the serial ID.

use super::qsfp;
use super::ChannelBit;
use super::ChannelFlags;
use super::QsfpLayout;
use super::RegInfo;
use super::RegMap;
use crate::ident::QsfpCategory;
use media_messages::media::Parameter;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::DeviceAddr;
use media_messages::EepromAddress;
use media_messages::Page;
use media_messages::VENDOR_DATE_LEN;
use media_messages::VENDOR_NAME_LEN;
use media_messages::VENDOR_OUI_LEN;
use media_messages::VENDOR_PART_NUMBER_LEN;
use media_messages::VENDOR_REVISION_LEN;
use media_messages::VENDOR_SERIAL_NUMBER_LEN;

pub const REVISION_2: u8 = 0x20;
pub const REVISION_3: u8 = 0x30;

/// Non-zero once the module uses the lane assignment layout, which also
/// enables length codes for the cable assembly length.
pub const LANE_ASSIGNMENT: u8 = 89;

/// Written to the datapath control byte to power up every lane.
pub const DATAPATH_POWER_UP: u8 = 0xff;

/// The datapath control byte of a revision, if it has one.
pub const fn datapath_control(revision: u8) -> Option<EepromAddress> {
    if revision >= REVISION_3 {
        Some(EepromAddress::paged(16, 128))
    } else if revision >= REVISION_2 {
        Some(EepromAddress::paged(0, 92))
    } else {
        None
    }
}

const fn param(p: Parameter) -> RegInfo {
    match p {
        Parameter::Identifier => RegInfo::new(0, 1),
        Parameter::Connector => RegInfo::new(203, 1),
        Parameter::LengthCableAssembly => RegInfo::new(202, 1),
        _ => RegInfo::NOT_SUPPORTED,
    }
}

const fn vendor(v: VendorField) -> RegInfo {
    match v {
        VendorField::Name => RegInfo::printable(129, VENDOR_NAME_LEN as u8),
        VendorField::Oui => RegInfo::new(145, VENDOR_OUI_LEN as u8),
        VendorField::PartNumber => RegInfo::printable(148, VENDOR_PART_NUMBER_LEN as u8),
        VendorField::Revision => RegInfo::printable(164, VENDOR_REVISION_LEN as u8),
        VendorField::SerialNumber => RegInfo::printable(166, VENDOR_SERIAL_NUMBER_LEN as u8),
        VendorField::Date => RegInfo::printable(182, VENDOR_DATE_LEN as u8),
    }
}

const fn threshold(t: Threshold) -> RegInfo {
    let offset = match t {
        Threshold::TempHighAlarm => 128,
        Threshold::TempLowAlarm => 130,
        Threshold::TempHighWarning => 132,
        Threshold::TempLowWarning => 134,
        Threshold::VoltHighAlarm => 136,
        Threshold::VoltLowAlarm => 138,
        Threshold::VoltHighWarning => 140,
        Threshold::VoltLowWarning => 142,
        Threshold::TxPowerHighAlarm => 176,
        Threshold::TxPowerLowAlarm => 178,
        Threshold::TxPowerHighWarning => 180,
        Threshold::TxPowerLowWarning => 182,
        Threshold::TxBiasHighAlarm => 184,
        Threshold::TxBiasLowAlarm => 186,
        Threshold::TxBiasHighWarning => 188,
        Threshold::TxBiasLowWarning => 190,
        Threshold::RxPowerHighAlarm => 192,
        Threshold::RxPowerLowAlarm => 194,
        Threshold::RxPowerHighWarning => 196,
        Threshold::RxPowerLowWarning => 198,
    };
    RegInfo::new(offset, 2)
}

/// The revision 0x30 register map.
pub const MAP_REV3: RegMap = RegMap {
    name: "QSFP28-DD rev 0x30",
    param,
    vendor,
    threshold,
    threshold_device: DeviceAddr::Auto,
    threshold_page: Page::PAGE_02,
};

const fn layout(name: &'static str, map: &'static RegMap, temperature: u8, voltage: u8) -> QsfpLayout {
    QsfpLayout {
        name,
        channels: 8,
        map,
        temperature,
        voltage,
        rx_power: 34,
        tx_bias: 50,
        tx_power: Some(66),
        temp_flags: 8,
        volt_flags: 9,
        channel_flags: ChannelFlags::Lanes {
            // High alarm, low alarm, high warning, low warning.
            rx_power: [Some(12), Some(11), None, Some(10)],
            tx_bias: [Some(14), Some(13), None, None],
        },
        tx_los: ChannelBit::new(3, 0),
        rx_los: ChannelBit::new(4, 0),
        tx_fault: ChannelBit::new(7, 0),
        tx_disable: ChannelBit::new(84, 0),
        cdr_tx: ChannelBit::new(90, 0),
        cdr_rx: ChannelBit::new(91, 0),
    }
}

/// Modules predating revision 0x20.
pub const LAYOUT_REV1: QsfpLayout = layout("QSFP28-DD", &qsfp::MAP, 22, 26);
pub const LAYOUT_REV2: QsfpLayout = layout("QSFP28-DD rev 0x20", &qsfp::MAP, 26, 30);
pub const LAYOUT_REV3: QsfpLayout = layout("QSFP28-DD rev 0x30", &MAP_REV3, 14, 16);

/// Select the lower memory layout of a module.
pub const fn layout_for(category: QsfpCategory, revision: u8) -> &'static QsfpLayout {
    match category {
        QsfpCategory::QsfpDD if revision >= REVISION_3 => &LAYOUT_REV3,
        QsfpCategory::QsfpDD if revision >= REVISION_2 => &LAYOUT_REV2,
        QsfpCategory::QsfpDD => &LAYOUT_REV1,
        _ => &qsfp::LAYOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::datapath_control;
    use super::layout_for;
    use crate::ident::QsfpCategory;
    use crate::regs::QsfpLayout;
    use media_messages::media::Parameter;
    use media_messages::media::VendorField;
    use media_messages::EepromAddress;

    #[test]
    fn test_layout_selection() {
        assert_eq!(layout_for(QsfpCategory::Qsfp28, 0x30).name, "SFF-8636");
        assert_eq!(layout_for(QsfpCategory::QsfpDD, 0x30).temperature, 14);
        assert_eq!(layout_for(QsfpCategory::QsfpDD, 0x21).temperature, 26);
        assert_eq!(layout_for(QsfpCategory::QsfpDD, 0x10).temperature, 22);
    }

    #[test]
    fn test_rev3_serial_id_moves() {
        let rev3 = layout_for(QsfpCategory::QsfpDD, 0x30).map;
        let rev2 = layout_for(QsfpCategory::QsfpDD, 0x20).map;
        assert_eq!((rev3.vendor)(VendorField::Name).offset, 129);
        assert_eq!((rev2.vendor)(VendorField::Name).offset, 148);
        assert!(!(rev3.param)(Parameter::Wavelength).is_supported());
        assert_eq!((rev3.param)(Parameter::Identifier).offset, 0);
    }

    #[test]
    fn test_channel_words_cover_eight_lanes() {
        let l = layout_for(QsfpCategory::QsfpDD, 0x30);
        assert_eq!(QsfpLayout::channel_word(l.rx_power, 7), 48);
        assert_eq!(QsfpLayout::channel_word(l.tx_bias, 7), 64);
        assert_eq!(l.tx_power.map(|b| QsfpLayout::channel_word(b, 7)), Some(80));
    }

    #[test]
    fn test_datapath_control() {
        assert_eq!(datapath_control(0x30), Some(EepromAddress::paged(16, 128)));
        assert_eq!(datapath_control(0x20), Some(EepromAddress::paged(0, 92)));
        assert_eq!(datapath_control(0x1f), None);
    }
}
