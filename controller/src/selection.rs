// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Routing the shared I2C bus to one module.
//!
//! Modules sharing a bus sit behind a mux and a module-select group. A
//! [`Selection`] holds both groups with their select values written, and
//! releases them, module first, when dropped. Because the groups stay held
//! for the life of the selection, no other port sharing them can interleave
//! its own transactions.

use crate::gpio::PinGroupHandle;
use crate::gpio::PinGroupLock;
use crate::Error;

/// A pin group and the value that selects a module through it.
#[derive(Clone, Debug)]
pub struct SelectTarget {
    pub group: PinGroupHandle,
    pub value: u32,
}

impl SelectTarget {
    pub fn new(group: PinGroupHandle, value: u32) -> Self {
        Self { group, value }
    }

    fn apply(&self) -> Result<PinGroupLock<'_>, Error> {
        let mut lock = self.group.acquire()?;
        lock.write_level(self.value)?;
        Ok(lock)
    }
}

/// The groups that select one module.
#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub mux: Option<SelectTarget>,
    /// `None` when the module is alone on its bus.
    pub module: Option<SelectTarget>,
}

impl Selector {
    pub fn new(mux: Option<SelectTarget>, module: Option<SelectTarget>) -> Self {
        Self { mux, module }
    }

    /// Acquire the mux group and then the module group, writing each
    /// select value.
    ///
    /// If the module group cannot be selected, the mux group is released
    /// before the error is returned.
    pub fn select(&self) -> Result<Selection<'_>, Error> {
        let mux = self.mux.as_ref().map(SelectTarget::apply).transpose()?;
        let module = self.module.as_ref().map(SelectTarget::apply).transpose()?;
        Ok(Selection { module, mux })
    }
}

/// A module selected on its bus.
//
// Fields drop in declaration order: the module group is released before
// the mux group.
#[must_use = "the module is deselected when the selection is dropped"]
pub struct Selection<'a> {
    module: Option<PinGroupLock<'a>>,
    mux: Option<PinGroupLock<'a>>,
}

impl Selection<'_> {
    /// Release the groups now rather than at the end of the scope.
    pub fn deselect(self) {}

    pub fn holds_mux(&self) -> bool {
        self.mux.is_some()
    }

    pub fn holds_module(&self) -> bool {
        self.module.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::SelectTarget;
    use super::Selector;
    use crate::gpio::PinGroupHandle;
    use crate::sim::ReleaseLog;
    use crate::sim::SimPinGroup;
    use crate::Error;

    fn selector(mux: &SimPinGroup, module: &SimPinGroup) -> Selector {
        Selector::new(
            Some(SelectTarget::new(PinGroupHandle::new("mux", mux.clone()), 0x3)),
            Some(SelectTarget::new(
                PinGroupHandle::new("module", module.clone()),
                0x10,
            )),
        )
    }

    #[test]
    fn test_select_writes_values_and_releases() {
        let mux = SimPinGroup::new(0);
        let module = SimPinGroup::new(0);
        let sel = selector(&mux, &module);
        {
            let s = sel.select().unwrap();
            assert!(s.holds_mux());
            assert!(s.holds_module());
            assert_eq!(mux.level(), 0x3);
            assert_eq!(module.level(), 0x10);
            assert_eq!(mux.released(), 0);
        }
        assert_eq!(mux.acquired(), 1);
        assert_eq!(mux.released(), 1);
        assert_eq!(module.acquired(), 1);
        assert_eq!(module.released(), 1);
    }

    #[test]
    fn test_module_failure_releases_mux_once() {
        let mux = SimPinGroup::new(0);
        let module = SimPinGroup::new(0);
        module.fail_acquire(true);
        let sel = selector(&mux, &module);
        assert!(matches!(sel.select(), Err(Error::Gpio { .. })));
        assert_eq!(mux.acquired(), 1);
        assert_eq!(mux.released(), 1);
        assert_eq!(module.released(), 0);

        // The mux group is free for the next caller.
        module.fail_acquire(false);
        sel.select().unwrap().deselect();
        assert_eq!(mux.acquired(), 2);
        assert_eq!(mux.released(), 2);
    }

    #[test]
    fn test_module_released_before_mux() {
        let mux = SimPinGroup::new(0);
        let module = SimPinGroup::new(0);
        let order = ReleaseLog::default();
        mux.log_releases("mux", &order);
        module.log_releases("module", &order);
        selector(&mux, &module).select().unwrap().deselect();
        assert_eq!(order.names(), vec!["module", "mux"]);
    }

    #[test]
    fn test_empty_selector() {
        let selector = Selector::default();
        let s = selector.select().unwrap();
        assert!(!s.holds_mux());
        assert!(!s.holds_module());
    }
}
