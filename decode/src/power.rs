// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Decoding of QSFP power classes and power control.

use crate::utils::assign_bit;
use crate::regs::qsfp::HIGH_POWER_CLASS_BIT;
use crate::regs::qsfp::POWER_OVERRIDE_BIT;
use crate::regs::qsfp::POWER_SET_BIT;
use crate::Error;

/// The maximum power a module may draw, from its extended identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
pub struct MaxPower {
    pub milliwatts: i32,
    /// True for power classes 5 and above, which the host must enable by
    /// software before the module may leave the lower classes.
    pub software_controlled: bool,
}

impl From<u8> for MaxPower {
    /// Decode byte 129 of SFF-8636.
    ///
    /// Bits 7:6 encode power classes 1 through 4. Non-zero bits 1:0 encode
    /// classes 5 through 7, which take precedence.
    fn from(ext_id: u8) -> Self {
        match ext_id & 0x03 {
            0 => MaxPower {
                milliwatts: match ext_id >> 6 {
                    0 => 1500,
                    1 => 2000,
                    2 => 2500,
                    _ => 3500,
                },
                software_controlled: false,
            },
            class => MaxPower {
                milliwatts: match class {
                    1 => 4000,
                    2 => 4500,
                    _ => 5000,
                },
                software_controlled: true,
            },
        }
    }
}

/// True if the extended identifier advertises software-controlled power
/// classes.
pub const fn software_power_supported(ext_id: u8) -> bool {
    (ext_id & 0x03) != 0
}

/// Return the power control byte with the software override forcing high
/// or low power.
pub fn force_power_mode(control: u8, high_power: bool) -> Result<u8, Error> {
    let control = assign_bit(control, HIGH_POWER_CLASS_BIT, high_power)?;
    let control = assign_bit(control, POWER_SET_BIT, !high_power)?;
    assign_bit(control, POWER_OVERRIDE_BIT, true)
}
