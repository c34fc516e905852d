// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Addressing of bytes in a module's memory map.

use crate::Error;
use crate::MINIMUM_PAGE;
use core::fmt;
use serde::Deserialize;
use serde::Serialize;

/// Raw value of the "use the configured address" selector.
pub const DEVICE_ADDR_AUTO: i32 = -1;

/// Raw value of the "do not select a page" selector.
pub const PAGE_SELECT_IGNORE: i32 = -1;

/// Raw value historically used for "paging not supported". It is an alias of
/// [`PAGE_SELECT_IGNORE`].
pub const PAGE_SELECT_NOT_SUPPORTED: i32 = PAGE_SELECT_IGNORE;

/// The I2C device a memory access targets.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum DeviceAddr {
    /// Use the address configured for the device.
    #[default]
    Auto,
    /// Override the configured address with an explicit 7-bit address.
    Explicit(u8),
}

impl DeviceAddr {
    /// Resolve this selector against the device's configured address.
    pub const fn resolve(&self, configured: u8) -> u8 {
        match self {
            DeviceAddr::Auto => configured,
            DeviceAddr::Explicit(a) => *a,
        }
    }
}

impl TryFrom<i32> for DeviceAddr {
    type Error = Error;

    fn try_from(x: i32) -> Result<Self, Self::Error> {
        if x == DEVICE_ADDR_AUTO {
            Ok(DeviceAddr::Auto)
        } else if (0..=0x7f).contains(&x) {
            Ok(DeviceAddr::Explicit(x as u8))
        } else {
            Err(Error::InvalidDeviceAddress(x))
        }
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceAddr::Auto => write!(f, "auto"),
            DeviceAddr::Explicit(a) => write!(f, "{a:#04x}"),
        }
    }
}

/// The page selection for a memory access.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub enum Page {
    /// Access the memory map as-is, without touching the page-select byte.
    #[default]
    Ignore,
    /// Select this page before the access, if the module supports paging.
    Select(u8),
}

impl Page {
    /// The default page, which is always restored after a paged access.
    pub const DEFAULT: Page = Page::Select(0);
    pub const PAGE_01: Page = Page::Select(1);
    pub const PAGE_02: Page = Page::Select(2);
    pub const PAGE_03: Page = Page::Select(3);
    pub const PAGE_16: Page = Page::Select(16);

    /// Return the page number to select, if any.
    pub const fn number(&self) -> Option<u8> {
        match self {
            Page::Ignore => None,
            Page::Select(n) => Some(*n),
        }
    }
}

impl TryFrom<i32> for Page {
    type Error = Error;

    fn try_from(x: i32) -> Result<Self, Self::Error> {
        if x == PAGE_SELECT_IGNORE {
            Ok(Page::Ignore)
        } else if (MINIMUM_PAGE..=i32::from(u8::MAX)).contains(&x) {
            Ok(Page::Select(x as u8))
        } else {
            Err(Error::InvalidPage(x))
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Page::Ignore => write!(f, "ignore"),
            Page::Select(n) => write!(f, "{n:#04x}"),
        }
    }
}

/// A (device, page, offset) triple identifying a byte in a module's memory.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(any(feature = "api-traits", test), derive(schemars::JsonSchema))]
pub struct EepromAddress {
    pub device: DeviceAddr,
    pub page: Page,
    pub offset: u8,
}

impl EepromAddress {
    /// Construct an address from raw selector values.
    ///
    /// A device selector of `-1` means "auto", and a page selector of `-1`
    /// means "ignore". Any other negative value is rejected.
    pub fn new(device: i32, page: i32, offset: u8) -> Result<Self, Error> {
        Ok(Self {
            device: DeviceAddr::try_from(device)?,
            page: Page::try_from(page)?,
            offset,
        })
    }

    /// An unpaged access at the configured device address.
    pub const fn unpaged(offset: u8) -> Self {
        Self {
            device: DeviceAddr::Auto,
            page: Page::Ignore,
            offset,
        }
    }

    /// An access to `page` at the configured device address.
    pub const fn paged(page: u8, offset: u8) -> Self {
        Self {
            device: DeviceAddr::Auto,
            page: Page::Select(page),
            offset,
        }
    }

    /// Return `self`, targeting an explicit device address.
    pub const fn with_device(mut self, addr: u8) -> Self {
        self.device = DeviceAddr::Explicit(addr);
        self
    }
}

impl fmt::Display for EepromAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "device {} page {} offset {:#04x}",
            self.device, self.page, self.offset
        )
    }
}
