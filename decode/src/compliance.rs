// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Transceiver compliance codes.
//!
//! Both SFF-8472 and SFF-8636 carry eight bytes of compliance bitfields, but
//! they pack the fields differently.

use crate::utils::fixed;
use crate::Error;

/// The decoded compliance code bitfields of a module.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    any(feature = "api-traits", test),
    derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)
)]
pub struct TransceiverCode {
    pub eth_10g: u8,
    /// Infiniband compliance. SFP only.
    pub infiniband: u8,
    /// ESCON compliance. SFP only.
    pub escon: u8,
    pub sonet: u16,
    /// SAS/SATA compliance. QSFP only.
    pub sas: u8,
    pub eth_1g: u8,
    pub fc_distance: u8,
    pub fc_technology: u8,
    /// SFP+ cable technology, passive or active.
    pub cable_technology: u8,
    pub fc_media: u8,
    pub fc_speed: u8,
}

impl TransceiverCode {
    /// Decode the SFF-8472 layout, A0h bytes 3 through 10.
    pub fn from_sfp(buf: &[u8]) -> Result<Self, Error> {
        let b = fixed::<8>(buf)?;
        Ok(Self {
            eth_10g: b[0] >> 4,
            infiniband: b[0] & 0x0f,
            escon: b[1] >> 6,
            sonet: u16::from(b[2]) | (u16::from(b[1] & 0x3f) << 8),
            sas: 0,
            eth_1g: b[3],
            fc_distance: b[4] >> 3,
            fc_technology: (b[5] >> 4) | ((b[4] & 0x07) << 4),
            cable_technology: (b[5] >> 2) & 0x03,
            fc_media: b[6],
            fc_speed: b[7],
        })
    }

    /// Decode the SFF-8636 layout, bytes 131 through 138.
    pub fn from_qsfp(buf: &[u8]) -> Result<Self, Error> {
        let b = fixed::<8>(buf)?;
        Ok(Self {
            eth_10g: b[0],
            infiniband: 0,
            escon: 0,
            sonet: u16::from(b[1]),
            sas: b[2],
            eth_1g: b[3],
            fc_distance: b[4] & 0x3f,
            fc_technology: (b[4] >> 6) | (b[5] << 2),
            cable_technology: 0,
            fc_media: b[6],
            fc_speed: b[7],
        })
    }
}
