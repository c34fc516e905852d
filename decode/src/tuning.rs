// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! SFF-8690 tunable transmitter capabilities.

use crate::regs::sfp::tunable;
use crate::utils::extract_bit;
use crate::utils::fixed;
use crate::Error;

/// The speed of light, in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Scale of the fractional frequency parts and the grid spacing, in THz.
pub const FRACTION_SCALE: f64 = 1.0 / 10_000.0;

/// Convert a wavelength in nm to a frequency in THz.
pub fn wavelength_nm_to_thz(nm: f64) -> f64 {
    0.001 * SPEED_OF_LIGHT / nm
}

/// Convert a frequency in THz to a wavelength in nm.
pub fn thz_to_wavelength_nm(thz: f64) -> f64 {
    0.001 * SPEED_OF_LIGHT / thz
}

/// The tuning range of a module.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
pub struct TunableCapability {
    /// Lowest frequency, in THz.
    pub min_thz: f64,
    /// Highest frequency, in THz.
    pub max_thz: f64,
    /// Grid spacing, in THz.
    pub spacing_thz: f64,
    pub channels: u32,
    /// The module accepts a channel number.
    pub channel_tuning: bool,
    /// The module accepts a wavelength.
    pub wavelength_tuning: bool,
}

impl TunableCapability {
    /// Decode the capability block and the tuning support byte.
    ///
    /// The block holds the first and last frequency, each as a big-endian
    /// THz integer part followed by a fractional part in units of 0.1 GHz,
    /// then the grid spacing in units of 0.1 GHz.
    pub fn parse(block: &[u8], support: u8) -> Result<Self, Error> {
        let b = fixed::<{ tunable::CAPABILITIES_LEN }>(block)?;
        let word = |i: usize| f64::from(u16::from_be_bytes([b[i], b[i + 1]]));
        let min_thz = word(0) + word(2) * FRACTION_SCALE;
        let max_thz = word(4) + word(6) * FRACTION_SCALE;
        let spacing_thz = word(8) * FRACTION_SCALE;
        if max_thz < min_thz {
            return Err(Error::InvalidCapability {
                min: min_thz,
                max: max_thz,
            });
        }
        let channels = if spacing_thz > 0.0 {
            (1.0 + (max_thz - min_thz) / spacing_thz).round() as u32
        } else {
            1
        };
        Ok(Self {
            min_thz,
            max_thz,
            spacing_thz,
            channels,
            channel_tuning: extract_bit(support, tunable::CHANNEL_TUNING_BIT)?,
            wavelength_tuning: extract_bit(support, tunable::WAVELENGTH_TUNING_BIT)?,
        })
    }

    /// True if `thz` lies within the tuning range.
    pub fn contains(&self, thz: f64) -> bool {
        (self.min_thz..=self.max_thz).contains(&thz)
    }

    /// The 1-based grid channel nearest `thz`.
    pub fn channel_for(&self, thz: f64) -> u16 {
        if self.spacing_thz > 0.0 {
            (1.0 + (thz - self.min_thz) / self.spacing_thz).round() as u16
        } else {
            1
        }
    }
}

/// The word written to request a wavelength, in units of 0.05 nm.
pub fn wavelength_word(nm: f64) -> u16 {
    (nm * 20.0) as u16
}

/// True if neither status byte reports a fault, an unlocked wavelength, or
/// a tuning operation in progress.
pub const fn tuning_settled(status: u8, latched: u8) -> bool {
    (status & tunable::STATUS_MASK) == 0 && (latched & tunable::LATCHED_STATUS_MASK) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(min: (u16, u16), max: (u16, u16), spacing: u16) -> Vec<u8> {
        [min.0, min.1, max.0, max.1, spacing]
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .collect()
    }

    #[test]
    fn test_parse_c_band() {
        let cap = TunableCapability::parse(&block((191, 0), (196, 0), 500), 0b11).unwrap();
        assert_eq!(cap.min_thz, 191.0);
        assert_eq!(cap.max_thz, 196.0);
        assert!((cap.spacing_thz - 0.05).abs() < 1e-12);
        assert_eq!(cap.channels, 101);
        assert!(cap.channel_tuning);
        assert!(cap.wavelength_tuning);
    }

    #[test]
    fn test_fractional_frequency() {
        let cap = TunableCapability::parse(&block((191, 3500), (196, 1000), 1000), 0b10).unwrap();
        assert!((cap.min_thz - 191.35).abs() < 1e-9);
        assert!((cap.max_thz - 196.1).abs() < 1e-9);
        assert!(cap.channel_tuning);
        assert!(!cap.wavelength_tuning);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = TunableCapability::parse(&block((196, 0), (191, 0), 500), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidCapability { .. }));
    }

    #[test]
    fn test_channel_selection() {
        let cap = TunableCapability::parse(&block((191, 0), (196, 0), 500), 0b11).unwrap();
        let thz = wavelength_nm_to_thz(1550.12);
        assert!(cap.contains(thz));
        assert_eq!(cap.channel_for(thz), 49);
        assert_eq!(cap.channel_for(cap.min_thz), 1);
        assert!(!cap.contains(wavelength_nm_to_thz(1000.0)));
    }

    #[test]
    fn test_wavelength_conversions() {
        let nm = thz_to_wavelength_nm(wavelength_nm_to_thz(1550.12));
        assert!((nm - 1550.12).abs() < 1e-9);
        assert_eq!(wavelength_word(1550.0), 31000);
    }

    #[test]
    fn test_tuning_settled() {
        assert!(tuning_settled(0x00, 0x00));
        assert!(tuning_settled(0x8f, 0x87));
        assert!(!tuning_settled(0x10, 0x00));
        assert!(!tuning_settled(0x00, 0x10));
        assert!(!tuning_settled(0x00, 0x40));
    }

    #[test]
    fn test_new_channel_acquired_is_settled() {
        assert!(tuning_settled(0x00, 0x08));
        assert!(tuning_settled(0x80, 0x88));
    }
}
