// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! GPIO pin groups used to select, detect and control modules.
//!
//! A pin group is a bank of lines read and written as one word. The group
//! implementation itself lives outside this crate; drivers consume only the
//! [`PinGroup`] contract, through a shared [`PinGroupHandle`].
//!
//! Access to a group is exclusive. [`PinGroupHandle::acquire`] returns a
//! [`PinGroupLock`], and the group is released when that lock is dropped.

use crate::Error;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// An error from a pin group implementation.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("Pin group unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// The contract of a bank of GPIO lines.
pub trait PinGroup: Send {
    /// Claim the group for exclusive use by the caller.
    fn acquire(&mut self) -> Result<(), GpioError> {
        Ok(())
    }

    /// Release a claim made by `acquire`.
    fn release(&mut self) {}

    fn read_level(&mut self) -> Result<u32, GpioError>;

    fn write_level(&mut self, level: u32) -> Result<(), GpioError>;
}

/// A shared handle to a pin group.
#[derive(Clone)]
pub struct PinGroupHandle {
    name: Arc<str>,
    inner: Arc<Mutex<dyn PinGroup>>,
}

impl fmt::Debug for PinGroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinGroupHandle")
            .field("name", &self.name)
            .finish()
    }
}

impl PinGroupHandle {
    pub fn new(name: impl AsRef<str>, group: impl PinGroup + 'static) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            inner: Arc::new(Mutex::new(group)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return true if both handles refer to the same group.
    pub fn same_group(&self, other: &PinGroupHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquire exclusive use of the group.
    ///
    /// This blocks while any other caller holds the group.
    pub fn acquire(&self) -> Result<PinGroupLock<'_>, Error> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.acquire().map_err(|source| Error::Gpio {
            group: self.name.to_string(),
            source,
        })?;
        Ok(PinGroupLock {
            name: &self.name,
            guard,
        })
    }

    /// Acquire the group, read one line, and release the group.
    pub fn read_bit(&self, bit: u8) -> Result<bool, Error> {
        self.acquire()?.read_bit(bit)
    }

    /// Acquire the group, set or clear one line, and release the group.
    pub fn assign_bit(&self, bit: u8, set: bool) -> Result<(), Error> {
        self.acquire()?.assign_bit(bit, set)
    }
}

/// Exclusive access to a pin group, released on drop.
pub struct PinGroupLock<'a> {
    name: &'a str,
    guard: MutexGuard<'a, dyn PinGroup + 'static>,
}

impl PinGroupLock<'_> {
    fn gpio_error(&self, source: GpioError) -> Error {
        Error::Gpio {
            group: self.name.to_string(),
            source,
        }
    }

    pub fn read_level(&mut self) -> Result<u32, Error> {
        self.guard.read_level().map_err(|e| self.gpio_error(e))
    }

    pub fn write_level(&mut self, level: u32) -> Result<(), Error> {
        self.guard.write_level(level).map_err(|e| self.gpio_error(e))
    }

    pub fn read_bit(&mut self, bit: u8) -> Result<bool, Error> {
        let mask = line_mask(bit)?;
        Ok(self.read_level()? & mask != 0)
    }

    /// Read-modify-write one line of the group.
    pub fn assign_bit(&mut self, bit: u8, set: bool) -> Result<(), Error> {
        let mask = line_mask(bit)?;
        let level = self.read_level()?;
        let level = if set { level | mask } else { level & !mask };
        self.write_level(level)
    }
}

impl Drop for PinGroupLock<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

fn line_mask(bit: u8) -> Result<u32, Error> {
    1u32.checked_shl(u32::from(bit))
        .ok_or_else(|| Error::InvalidArgument(format!("GPIO line {bit} out of range")))
}

/// One line of a pin group.
#[derive(Clone, Debug)]
pub struct GpioLine {
    pub group: PinGroupHandle,
    pub bit: u8,
}

impl GpioLine {
    pub fn new(group: PinGroupHandle, bit: u8) -> Self {
        Self { group, bit }
    }

    pub fn read(&self) -> Result<bool, Error> {
        self.group.read_bit(self.bit)
    }

    pub fn write(&self, set: bool) -> Result<(), Error> {
        self.group.assign_bit(self.bit, set)
    }
}

/// A group with no lines behind it, for cages whose signals are strapped.
///
/// Reads return the last level written, starting from `level`.
#[derive(Debug)]
pub struct LatchPinGroup {
    level: u32,
}

impl LatchPinGroup {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl PinGroup for LatchPinGroup {
    fn read_level(&mut self) -> Result<u32, GpioError> {
        Ok(self.level)
    }

    fn write_level(&mut self, level: u32) -> Result<(), GpioError> {
        self.level = level;
        Ok(())
    }
}

/// Pin groups known to the system, by name.
#[derive(Clone, Debug, Default)]
pub struct PinGroupRegistry {
    groups: HashMap<String, PinGroupHandle>,
}

impl PinGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group under its own name, returning a handle to it.
    pub fn insert(&mut self, group: PinGroupHandle) -> PinGroupHandle {
        self.groups.insert(group.name().to_string(), group.clone());
        group
    }

    pub fn get(&self, name: &str) -> Option<&PinGroupHandle> {
        self.groups.get(name)
    }

    /// Look up a group named in a device configuration.
    pub fn resolve(&self, name: &str) -> Result<PinGroupHandle, Error> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown pin group '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::GpioLine;
    use super::LatchPinGroup;
    use super::PinGroupHandle;
    use super::PinGroupRegistry;
    use crate::sim::SimPinGroup;
    use crate::Error;

    #[test]
    fn test_lock_releases_on_drop() {
        let sim = SimPinGroup::new(0);
        let group = PinGroupHandle::new("mux", sim.clone());
        {
            let mut lock = group.acquire().unwrap();
            lock.write_level(0x5).unwrap();
            assert_eq!(sim.acquired(), 1);
            assert_eq!(sim.released(), 0);
        }
        assert_eq!(sim.released(), 1);
        assert_eq!(sim.level(), 0x5);
    }

    #[test]
    fn test_line_read_modify_write() {
        let sim = SimPinGroup::new(0b1001);
        let line = GpioLine::new(PinGroupHandle::new("lpmode", sim.clone()), 2);
        assert!(!line.read().unwrap());
        line.write(true).unwrap();
        assert_eq!(sim.level(), 0b1101);
        line.write(false).unwrap();
        assert_eq!(sim.level(), 0b1001);
        assert_eq!(sim.acquired(), sim.released());
    }

    #[test]
    fn test_failed_acquire_is_gpio_error() {
        let sim = SimPinGroup::new(0);
        sim.fail_acquire(true);
        let group = PinGroupHandle::new("presence", sim.clone());
        assert!(matches!(group.read_bit(0), Err(Error::Gpio { .. })));
        assert_eq!(sim.released(), 0);
    }

    #[test]
    fn test_registry_resolve() {
        let mut registry = PinGroupRegistry::new();
        let group = registry.insert(PinGroupHandle::new("reset", SimPinGroup::new(0)));
        assert!(registry.resolve("reset").unwrap().same_group(&group));
        assert!(matches!(registry.resolve("nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_latch_group_keeps_last_level() {
        let line = GpioLine::new(PinGroupHandle::new("strap", LatchPinGroup::new(0x1)), 3);
        assert!(!line.read().unwrap());
        line.write(true).unwrap();
        assert!(line.read().unwrap());
        assert!(GpioLine::new(line.group.clone(), 0).read().unwrap());
    }
}
