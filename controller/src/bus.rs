// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The I2C transport consumed by the drivers.

use crate::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

/// An error from the underlying transport.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Device did not acknowledge")]
    Nack,

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("System call failed")]
    Errno(#[from] nix::errno::Errno),
}

/// Addressed reads and writes on an I2C or SMBus segment.
///
/// Each call is a single transaction: a write of `offset` followed by a
/// read or write of the buffer, to the 7-bit device `address`.
pub trait I2cBus: Send {
    fn read(&mut self, address: u8, offset: u8, buf: &mut [u8]) -> Result<(), BusError>;
    fn write(&mut self, address: u8, offset: u8, data: &[u8]) -> Result<(), BusError>;
}

/// A shared handle to an I2C segment.
///
/// Cloning the handle shares the segment. Transactions from all clones are
/// serialized.
#[derive(Clone)]
pub struct Bus {
    name: Arc<str>,
    inner: Arc<Mutex<dyn I2cBus>>,
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("name", &self.name).finish()
    }
}

impl Bus {
    pub fn new(name: impl AsRef<str>, bus: impl I2cBus + 'static) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self, address: u8, offset: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read(address, offset, buf)
            .map_err(|source| Error::Bus {
                address,
                offset,
                source,
            })
    }

    pub fn write(&self, address: u8, offset: u8, data: &[u8]) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(address, offset, data)
            .map_err(|source| Error::Bus {
                address,
                offset,
                source,
            })
    }

    pub fn read_byte(&self, address: u8, offset: u8) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read(address, offset, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_byte(&self, address: u8, offset: u8, value: u8) -> Result<(), Error> {
        self.write(address, offset, &[value])
    }

    /// Read two bytes, most significant first.
    pub fn read_word_be(&self, address: u8, offset: u8) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read(address, offset, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Write two bytes, most significant first.
    pub fn write_word_be(&self, address: u8, offset: u8, value: u16) -> Result<(), Error> {
        self.write(address, offset, &value.to_be_bytes())
    }
}
