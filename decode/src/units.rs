// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Conversion of raw monitor words into physical units.
//!
//! All monitor words are big-endian. SFF-8472 modules may be internally
//! calibrated, in which case the words are already in physical units, or
//! externally calibrated, in which case the host applies the slope and offset
//! (or, for receive power, a polynomial) stored in the diagnostic memory.
//! SFF-8636 and the QSFP28-DD layouts only use internal calibration.

use crate::utils::decode_with_scale;
use crate::utils::fixed;
use crate::Error;

/// Reported in place of `10 * log10(0)` when the optical power is zero.
pub const DBM_FLOOR: f64 = -40.0;

/// Degrees C per LSB of a temperature word.
pub const TEMPERATURE_SCALE: f64 = 1.0 / 256.0;

/// Volts per LSB of a supply voltage word (100 uV).
pub const VOLTAGE_SCALE: f64 = 1.0 / 10_000.0;

/// Milliamps per LSB of a bias current word (2 uA).
pub const BIAS_SCALE: f64 = 2.0 / 1_000.0;

/// Milliwatts per LSB of an optical power word (0.1 uW).
pub const POWER_SCALE: f64 = 1.0 / 10_000.0;

/// Calibration of a scalar monitor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
#[cfg_attr(any(feature = "api-traits", test), serde(rename_all = "snake_case"))]
pub enum Calibration {
    /// The word is already in physical units.
    #[default]
    Internal,
    /// The word is a raw ADC value, corrected by `slope * raw + offset`.
    External { slope: f64, offset: f64 },
}

impl Calibration {
    /// Build an external calibration from its four bytes in the diagnostic
    /// memory: an unsigned 8.8 fixed-point slope, then a signed offset.
    pub fn external_from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let [s0, s1, o0, o1] = fixed::<4>(buf)?;
        Ok(Calibration::External {
            slope: decode_with_scale::<u16>([s0, s1], 1.0 / 256.0),
            offset: f64::from(i16::from_be_bytes([o0, o1])),
        })
    }

    fn apply(&self, raw: f64) -> f64 {
        match self {
            Calibration::Internal => raw,
            Calibration::External { slope, offset } => slope * raw + offset,
        }
    }
}

/// Number of bytes holding the five receive power coefficients.
pub const RX_POWER_COEFFS_LEN: usize = 20;

/// Calibration of the receive power monitor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
#[cfg_attr(any(feature = "api-traits", test), serde(rename_all = "snake_case"))]
pub enum RxPowerCalibration {
    #[default]
    Internal,
    /// Polynomial coefficients, highest order first: `c4 .. c0`.
    External([f32; 5]),
}

impl RxPowerCalibration {
    /// Decode the coefficients, stored as big-endian IEEE 754 singles from
    /// the fourth-order term down to the constant term.
    pub fn external_from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let buf = fixed::<RX_POWER_COEFFS_LEN>(buf)?;
        let mut coeffs = [0f32; 5];
        for (c, chunk) in coeffs.iter_mut().zip(buf.chunks_exact(4)) {
            *c = f32::from_be_bytes(fixed::<4>(chunk)?);
        }
        Ok(RxPowerCalibration::External(coeffs))
    }

    fn apply(&self, raw: f64) -> f64 {
        match self {
            RxPowerCalibration::Internal => raw,
            RxPowerCalibration::External(coeffs) => coeffs
                .iter()
                .fold(0.0, |acc, c| acc * raw + f64::from(*c)),
        }
    }
}

/// Convert a temperature word to degrees C.
pub fn temperature(buf: [u8; 2], cal: &Calibration) -> f64 {
    cal.apply(f64::from(i16::from_be_bytes(buf))) * TEMPERATURE_SCALE
}

/// Convert a supply voltage word to volts.
pub fn voltage(buf: [u8; 2], cal: &Calibration) -> f64 {
    cal.apply(f64::from(u16::from_be_bytes(buf))) * VOLTAGE_SCALE
}

/// Convert a laser bias word to milliamps.
pub fn bias_current(buf: [u8; 2], cal: &Calibration) -> f64 {
    cal.apply(f64::from(u16::from_be_bytes(buf))) * BIAS_SCALE
}

/// Convert a transmit power word to milliwatts.
pub fn tx_power_mw(buf: [u8; 2], cal: &Calibration) -> f64 {
    cal.apply(f64::from(u16::from_be_bytes(buf))) * POWER_SCALE
}

/// Convert a receive power word to milliwatts.
pub fn rx_power_mw(buf: [u8; 2], cal: &RxPowerCalibration) -> f64 {
    cal.apply(f64::from(u16::from_be_bytes(buf))) * POWER_SCALE
}

/// Convert optical power from milliwatts to dBm.
///
/// Zero and negative powers map to [`DBM_FLOOR`].
pub fn mw_to_dbm(mw: f64) -> f64 {
    if mw > 0.0 {
        10.0 * mw.log10()
    } else {
        DBM_FLOOR
    }
}

/// Decode a cable length code.
///
/// The low six bits are a multiplier and the high two bits select a scale
/// of 0.1, 1, 10 or 100 meters.
pub fn length_code(code: u8) -> f64 {
    let mantissa = f64::from(code & 0x3f);
    let exponent = i32::from(code >> 6) - 1;
    mantissa * 10f64.powi(exponent)
}

/// Divisor of the nominal wavelength word, in units of 1/20 nm.
pub const WAVELENGTH_DIVIDER: f64 = 20.0;

/// Divisor of the wavelength tolerance word, in units of 1/200 nm.
pub const WAVELENGTH_TOLERANCE_DIVIDER: f64 = 200.0;

/// Decode an SFF-8636 nominal wavelength word to nm.
pub fn wavelength_nm(buf: [u8; 2]) -> f64 {
    f64::from(u16::from_be_bytes(buf)) / WAVELENGTH_DIVIDER
}

/// Decode an SFF-8636 wavelength tolerance word to nm.
pub fn wavelength_tolerance_nm(buf: [u8; 2]) -> f64 {
    f64::from(u16::from_be_bytes(buf)) / WAVELENGTH_TOLERANCE_DIVIDER
}
