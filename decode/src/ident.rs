// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! SFF-8024 identifiers, and the classification of modules found in a QSFP
//! cage.

use core::fmt;

/// The SFF-8024 identifier in byte 0 of a module's memory map.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
pub enum Identifier {
    Unknown,
    Gbic,
    Soldered,
    Sfp,
    DwdmSfp,
    Qsfp,
    QsfpPlus,
    Qsfp28,
    QsfpDD,
    Other(u8),
}

impl Identifier {
    /// True if this identifier names an SFP, as reported through a
    /// QSFP-to-SFP adapter.
    pub const fn is_qsa(&self) -> bool {
        matches!(self, Identifier::Sfp | Identifier::DwdmSfp)
    }
}

impl From<u8> for Identifier {
    fn from(x: u8) -> Self {
        match x {
            0x00 => Identifier::Unknown,
            0x01 => Identifier::Gbic,
            0x02 => Identifier::Soldered,
            0x03 => Identifier::Sfp,
            0x0b => Identifier::DwdmSfp,
            0x0c => Identifier::Qsfp,
            0x0d => Identifier::QsfpPlus,
            0x11 => Identifier::Qsfp28,
            0x18 => Identifier::QsfpDD,
            other => Identifier::Other(other),
        }
    }
}

impl From<Identifier> for u8 {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::Unknown => 0x00,
            Identifier::Gbic => 0x01,
            Identifier::Soldered => 0x02,
            Identifier::Sfp => 0x03,
            Identifier::DwdmSfp => 0x0b,
            Identifier::Qsfp => 0x0c,
            Identifier::QsfpPlus => 0x0d,
            Identifier::Qsfp28 => 0x11,
            Identifier::QsfpDD => 0x18,
            Identifier::Other(x) => x,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Unknown => write!(f, "Unknown or unspecified"),
            Identifier::Gbic => write!(f, "GBIC"),
            Identifier::Soldered => write!(f, "Soldered"),
            Identifier::Sfp => write!(f, "SFP/SFP+/SFP28"),
            Identifier::DwdmSfp => write!(f, "DWDM-SFP/SFP+"),
            Identifier::Qsfp => write!(f, "QSFP"),
            Identifier::QsfpPlus => write!(f, "QSFP+"),
            Identifier::Qsfp28 => write!(f, "QSFP28"),
            Identifier::QsfpDD => write!(f, "QSFP28-DD"),
            Identifier::Other(x) => write!(f, "Other ({x:#04x})"),
        }
    }
}

/// The kind of module discovered in a QSFP cage at init time.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(test, derive(strum::EnumIter))]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
pub enum QsfpCategory {
    #[default]
    Qsfp,
    QsfpPlus,
    Qsfp28,
    QsfpDD,
}

impl QsfpCategory {
    /// The number of optical channels of a module in this category.
    pub const fn channels(&self) -> u8 {
        match self {
            QsfpCategory::QsfpDD => 8,
            _ => 4,
        }
    }
}

impl From<Identifier> for QsfpCategory {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::QsfpPlus => QsfpCategory::QsfpPlus,
            Identifier::Qsfp28 => QsfpCategory::Qsfp28,
            Identifier::QsfpDD => QsfpCategory::QsfpDD,
            _ => QsfpCategory::Qsfp,
        }
    }
}

impl fmt::Display for QsfpCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            QsfpCategory::Qsfp => "QSFP",
            QsfpCategory::QsfpPlus => "QSFP+",
            QsfpCategory::Qsfp28 => "QSFP28",
            QsfpCategory::QsfpDD => "QSFP28-DD",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::Identifier;
    use super::QsfpCategory;
    use strum::IntoEnumIterator;

    #[test]
    fn test_identifier_round_trips_raw_byte() {
        for x in 0..=u8::MAX {
            assert_eq!(u8::from(Identifier::from(x)), x);
        }
    }

    #[test]
    fn test_qsa_identifiers() {
        assert!(Identifier::from(0x03).is_qsa());
        assert!(Identifier::from(0x0b).is_qsa());
        assert!(!Identifier::from(0x0d).is_qsa());
    }

    #[test]
    fn test_category_from_identifier() {
        assert_eq!(QsfpCategory::from(Identifier::from(0x0c)), QsfpCategory::Qsfp);
        assert_eq!(QsfpCategory::from(Identifier::from(0x0d)), QsfpCategory::QsfpPlus);
        assert_eq!(QsfpCategory::from(Identifier::from(0x11)), QsfpCategory::Qsfp28);
        assert_eq!(QsfpCategory::from(Identifier::from(0x18)), QsfpCategory::QsfpDD);
        assert_eq!(QsfpCategory::from(Identifier::from(0x42)), QsfpCategory::Qsfp);
    }

    #[test]
    fn test_category_channels() {
        for cat in QsfpCategory::iter() {
            let expected = if cat == QsfpCategory::QsfpDD { 8 } else { 4 };
            assert_eq!(cat.channels(), expected);
        }
    }

    #[test]
    fn test_identifier_serdes() {
        let s = serde_json::to_string(&Identifier::QsfpDD).unwrap();
        assert_eq!(s, "\"QsfpDD\"");
        let id: Identifier = serde_json::from_str(&s).unwrap();
        assert_eq!(id, Identifier::QsfpDD);
    }
}
