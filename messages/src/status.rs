// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Status bits reported by the media drivers.
//!
//! Each of these is used both as the set of flags a caller is interested in,
//! and as the set of flags the driver found asserted.

bitflags::bitflags! {
    /// Module-level alarm and warning flags.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ModuleStatus: u32 {
        /// Module temperature is above the high alarm threshold.
        const TEMP_HIGH_ALARM = 0x01;
        /// Module temperature is below the low alarm threshold.
        const TEMP_LOW_ALARM = 0x02;
        /// Module temperature is above the high warning threshold.
        const TEMP_HIGH_WARNING = 0x04;
        /// Module temperature is below the low warning threshold.
        const TEMP_LOW_WARNING = 0x08;
        /// Supply voltage is above the high alarm threshold.
        const VOLT_HIGH_ALARM = 0x10;
        /// Supply voltage is below the low alarm threshold.
        const VOLT_LOW_ALARM = 0x20;
        /// Supply voltage is above the high warning threshold.
        const VOLT_HIGH_WARNING = 0x40;
        /// Supply voltage is below the low warning threshold.
        const VOLT_LOW_WARNING = 0x80;
    }
}

impl ModuleStatus {
    /// All temperature flags.
    pub const TEMP: Self = Self::TEMP_HIGH_ALARM
        .union(Self::TEMP_LOW_ALARM)
        .union(Self::TEMP_HIGH_WARNING)
        .union(Self::TEMP_LOW_WARNING);

    /// All voltage flags.
    pub const VOLT: Self = Self::VOLT_HIGH_ALARM
        .union(Self::VOLT_LOW_ALARM)
        .union(Self::VOLT_HIGH_WARNING)
        .union(Self::VOLT_LOW_WARNING);
}

bitflags::bitflags! {
    /// Per-channel transmit and receive status.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ChannelStatus: u32 {
        /// The transmitter is disabled.
        const TX_DISABLE = 0x01;
        /// The transmitter reports a fault.
        const TX_FAULT = 0x02;
        /// Loss of signal on the transmit input.
        const TX_LOSS = 0x04;
        /// Loss of signal on the receiver.
        const RX_LOSS = 0x08;
    }
}

bitflags::bitflags! {
    /// Per-channel monitor alarm and warning flags.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ChannelMonitorStatus: u32 {
        const RX_PWR_HIGH_ALARM = 0x001;
        const RX_PWR_LOW_ALARM = 0x002;
        const RX_PWR_HIGH_WARNING = 0x004;
        const RX_PWR_LOW_WARNING = 0x008;
        const TX_BIAS_HIGH_ALARM = 0x010;
        const TX_BIAS_LOW_ALARM = 0x020;
        const TX_BIAS_HIGH_WARNING = 0x040;
        const TX_BIAS_LOW_WARNING = 0x080;
        const TX_PWR_HIGH_ALARM = 0x100;
        const TX_PWR_LOW_ALARM = 0x200;
        const TX_PWR_HIGH_WARNING = 0x400;
        const TX_PWR_LOW_WARNING = 0x800;
    }
}

impl ChannelMonitorStatus {
    /// All receive power flags.
    pub const RX_PWR: Self = Self::RX_PWR_HIGH_ALARM
        .union(Self::RX_PWR_LOW_ALARM)
        .union(Self::RX_PWR_HIGH_WARNING)
        .union(Self::RX_PWR_LOW_WARNING);

    /// All transmit bias current flags.
    pub const TX_BIAS: Self = Self::TX_BIAS_HIGH_ALARM
        .union(Self::TX_BIAS_LOW_ALARM)
        .union(Self::TX_BIAS_HIGH_WARNING)
        .union(Self::TX_BIAS_LOW_WARNING);

    /// All transmit power flags.
    pub const TX_PWR: Self = Self::TX_PWR_HIGH_ALARM
        .union(Self::TX_PWR_LOW_ALARM)
        .union(Self::TX_PWR_HIGH_WARNING)
        .union(Self::TX_PWR_LOW_WARNING);
}

/// Reduce one byte of alarm/warning flags into status bits.
///
/// Modules report a high and a low flag for both the alarm and the warning.
/// Only one of each pair is reported, and a high flag takes precedence over
/// the low flag.
pub fn reduce_flags<T>(high_alarm: bool, low_alarm: bool, high_warn: bool, low_warn: bool, bits: [T; 4]) -> T
where
    T: bitflags::Flags + Copy,
{
    let [ha, la, hw, lw] = bits;
    let mut out = T::empty();
    if high_alarm {
        out.insert(ha);
    } else if low_alarm {
        out.insert(la);
    }
    if high_warn {
        out.insert(hw);
    } else if low_warn {
        out.insert(lw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::reduce_flags;
    use super::ChannelMonitorStatus;
    use super::ModuleStatus;

    #[test]
    fn test_groups_cover_all_bits() {
        assert_eq!(ModuleStatus::TEMP | ModuleStatus::VOLT, ModuleStatus::all());
        assert_eq!(
            ChannelMonitorStatus::RX_PWR | ChannelMonitorStatus::TX_BIAS | ChannelMonitorStatus::TX_PWR,
            ChannelMonitorStatus::all()
        );
        assert!(ModuleStatus::TEMP.intersection(ModuleStatus::VOLT).is_empty());
    }

    #[test]
    fn test_reduce_flags_high_beats_low() {
        let bits = [
            ModuleStatus::TEMP_HIGH_ALARM,
            ModuleStatus::TEMP_LOW_ALARM,
            ModuleStatus::TEMP_HIGH_WARNING,
            ModuleStatus::TEMP_LOW_WARNING,
        ];
        let out = reduce_flags(true, true, false, true, bits);
        assert_eq!(out, ModuleStatus::TEMP_HIGH_ALARM | ModuleStatus::TEMP_LOW_WARNING);
        assert!(reduce_flags(false, false, false, false, bits).is_empty());
    }
}
