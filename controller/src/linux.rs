// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! An [`I2cBus`] over the Linux i2c-dev interface.

use crate::bus::BusError;
use crate::bus::I2cBus;
use nix::errno::Errno;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::path::PathBuf;

const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_target, I2C_SLAVE);

/// An adapter opened through `/dev/i2c-N`.
#[derive(Debug)]
pub struct LinuxI2c {
    path: PathBuf,
    file: File,
    target: Option<u8>,
}

impl LinuxI2c {
    /// Open adapter number `adapter`.
    pub fn open_adapter(adapter: u32) -> Result<Self, BusError> {
        Self::open(format!("/dev/i2c-{adapter}"))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            path,
            file,
            target: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_target(&mut self, address: u8) -> Result<(), BusError> {
        if self.target == Some(address) {
            return Ok(());
        }
        // SAFETY: the descriptor is owned by `self.file` and stays open for
        // the duration of the call.
        unsafe { i2c_set_target(self.file.as_raw_fd(), i32::from(address)) }?;
        self.target = Some(address);
        Ok(())
    }
}

// The adapter reports a missing acknowledge as one of these.
fn classify(e: std::io::Error) -> BusError {
    match e.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ENXIO) | Some(Errno::EREMOTEIO) | Some(Errno::EIO) => BusError::Nack,
        _ => BusError::Io(e),
    }
}

impl I2cBus for LinuxI2c {
    fn read(&mut self, address: u8, offset: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.set_target(address)?;
        self.file.write_all(&[offset]).map_err(classify)?;
        self.file.read_exact(buf).map_err(classify)
    }

    fn write(&mut self, address: u8, offset: u8, data: &[u8]) -> Result<(), BusError> {
        self.set_target(address)?;
        let mut msg = Vec::with_capacity(data.len() + 1);
        msg.push(offset);
        msg.extend_from_slice(data);
        self.file.write_all(&msg).map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::classify;
    use super::LinuxI2c;
    use crate::bus::BusError;
    use nix::errno::Errno;

    #[test]
    fn test_missing_adapter_is_io_error() {
        let err = LinuxI2c::open("/nonexistent/i2c-99").unwrap_err();
        assert!(matches!(err, BusError::Io(_)));
    }

    #[test]
    fn test_nack_errnos() {
        for errno in [Errno::ENXIO, Errno::EREMOTEIO, Errno::EIO] {
            let e = std::io::Error::from_raw_os_error(errno as i32);
            assert!(matches!(classify(e), BusError::Nack));
        }
        let e = std::io::Error::from_raw_os_error(Errno::EBUSY as i32);
        assert!(matches!(classify(e), BusError::Io(_)));
    }
}
