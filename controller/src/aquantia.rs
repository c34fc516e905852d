// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Control of the Aquantia PHY inside SFP+ 10GBASE-T modules.
//!
//! All access goes through the module mailbox, see [`crate::mailbox`].

use crate::eeprom::Selected;
use crate::mailbox::Mailbox;
use crate::Error;
use media_messages::mailbox::MailboxPacket;
use media_messages::media::Speed;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::info;
use std::time::Duration;

const MEM_PMA: u8 = 1;
const MEM_PHY_XS: u8 = 4;
const MEM_AUTONEG: u8 = 7;

const TX_DISABLE_REG: u16 = 0x0009;
const LINE_LINK_REG: u16 = 0xe800;
const LINE_SPEED_REG: u16 = 0xc800;
const SYSTEM_STATUS_REG: u16 = 0xe812;

const SYSTEM_RX_LINK_BIT: u16 = 13;
const SYSTEM_TX_LINK_BIT: u16 = 12;

// Registers written, in order, to restart autonegotiation at a new rate.
const RATE_REGS: [u16; 5] = [0x0000, 0x0010, 0xc400, 0x0020, 0x0000];

const RATE_10G: [u16; 5] = [0x2000, 0x9001, 0x0040, 0x1001, 0x3000];
const RATE_5G: [u16; 5] = [0x2000, 0x9001, 0x0040, 0x0141, 0x3000];
const RATE_2500M: [u16; 5] = [0x2000, 0x9001, 0x0040, 0x00a1, 0x3000];
const RATE_1G: [u16; 5] = [0x2000, 0x8001, 0x8040, 0x0001, 0x3000];
const RATE_100M: [u16; 5] = [0x2000, 0x0101, 0x0040, 0x0001, 0x3000];

/// Return the default wait around a rate change.
pub const fn default_rate_settle() -> Duration {
    Duration::from_millis(800)
}

const fn rate_values(speed: Speed) -> Option<&'static [u16; 5]> {
    match speed {
        Speed::Speed10G => Some(&RATE_10G),
        Speed::Speed5G => Some(&RATE_5G),
        Speed::Speed2500M => Some(&RATE_2500M),
        Speed::Speed1G => Some(&RATE_1G),
        Speed::Speed100M => Some(&RATE_100M),
        _ => None,
    }
}

// Both the system and line speed fields use the same encoding, where zero
// means no resolved speed.
fn decode_speed(code: u16) -> Result<Option<Speed>, Error> {
    match code {
        0 => Ok(None),
        1 => Ok(Some(Speed::Speed100M)),
        2 => Ok(Some(Speed::Speed1G)),
        3 => Ok(Some(Speed::Speed10G)),
        4 => Ok(Some(Speed::Speed2500M)),
        5 => Ok(Some(Speed::Speed5G)),
        other => Err(Error::Protocol(format!("unknown PHY speed code {other}"))),
    }
}

/// Link state of the host side interface.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct SystemStatus {
    pub rx_link: bool,
    pub tx_link: bool,
    pub speed: Option<Speed>,
}

/// Link state of the copper side.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct LineStatus {
    pub link: bool,
    pub speed: Option<Speed>,
}

/// The PHY of a selected 10GBASE-T module.
#[derive(Clone, Copy, Debug)]
pub struct Aquantia {
    mailbox: Mailbox,
    settle: Duration,
}

impl Default for Aquantia {
    fn default() -> Self {
        Self::new(Mailbox::default())
    }
}

impl Aquantia {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            settle: default_rate_settle(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn mailbox(&self) -> Mailbox {
        self.mailbox
    }

    fn pause(&self) {
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
    }

    /// Return true if the transmitter is enabled.
    pub fn tx_enabled(&self, sel: &Selected<'_>) -> Result<bool, Error> {
        let value = self.mailbox.read(sel, MEM_PMA, TX_DISABLE_REG)?;
        Ok(value & 1 == 0)
    }

    pub fn set_tx_enabled(&self, sel: &Selected<'_>, enable: bool) -> Result<(), Error> {
        let value = self.mailbox.read(sel, MEM_PMA, TX_DISABLE_REG)?;
        let value = if enable { value & !1 } else { value | 1 };
        self.mailbox.write(sel, MEM_PMA, TX_DISABLE_REG, value)
    }

    pub fn system_status(&self, sel: &Selected<'_>) -> Result<SystemStatus, Error> {
        let value = self.mailbox.read(sel, MEM_PHY_XS, SYSTEM_STATUS_REG)?;
        Ok(SystemStatus {
            rx_link: value & (1 << SYSTEM_RX_LINK_BIT) != 0,
            tx_link: value & (1 << SYSTEM_TX_LINK_BIT) != 0,
            speed: decode_speed((value >> 8) & 0xf)?,
        })
    }

    pub fn line_status(&self, sel: &Selected<'_>) -> Result<LineStatus, Error> {
        let link = self.mailbox.read(sel, MEM_PMA, LINE_LINK_REG)? & 1 != 0;
        let speed = self.mailbox.read(sel, MEM_AUTONEG, LINE_SPEED_REG)?;
        Ok(LineStatus {
            link,
            speed: decode_speed((speed >> 1) & 0x7)?,
        })
    }

    /// Restart autonegotiation advertising only `speed`.
    ///
    /// Nothing is written when the line already runs at `speed`. The
    /// transmitter is held off across the change, then restored to its
    /// previous state.
    pub fn set_rate(&self, sel: &Selected<'_>, speed: Speed) -> Result<(), Error> {
        let values = rate_values(speed).ok_or_else(|| {
            Error::InvalidArgument(format!("10GBASE-T PHY cannot run at {speed}"))
        })?;
        if self.line_status(sel)?.speed == Some(speed) {
            debug!(sel.log(), "PHY already at requested rate"; "speed" => %speed);
            return Ok(());
        }
        let tx_enabled = self.tx_enabled(sel)?;
        self.set_tx_enabled(sel, false)?;
        self.pause();
        let mut packets: Vec<MailboxPacket> = RATE_REGS
            .iter()
            .zip(values.iter())
            .map(|(reg, value)| MailboxPacket::write(MEM_AUTONEG, *reg, *value))
            .collect();
        self.mailbox.chain(sel, &mut packets)?;
        self.pause();
        if tx_enabled {
            self.set_tx_enabled(sel, true)?;
        }
        info!(sel.log(), "PHY rate changed"; "speed" => %speed);
        Ok(())
    }

    /// Return true if both sides of the PHY are up at the same speed.
    pub fn link_up(&self, sel: &Selected<'_>) -> Result<bool, Error> {
        let line = self.line_status(sel)?;
        let system = self.system_status(sel)?;
        Ok(line.link
            && system.rx_link
            && system.tx_link
            && line.speed.is_some()
            && line.speed == system.speed)
    }
}
