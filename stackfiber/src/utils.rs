//! Lib-private utilities

use std::cell::UnsafeCell;

/// A single-thread cell shared by a fiber and its resumer. \
/// SAFETY \
/// Both sides of a fiber hold a shared reference to the same core, and each
/// of them mutates it while the other one is parked inside a context switch.
/// When we use SwitchCell, we take the responsibility to ensure that a
/// borrow obtained from it never lives across a switch (`switch_in`,
/// `switch_out`), so at most one side ever observes the contents.
pub(crate) struct SwitchCell<R> {
    inner: UnsafeCell<R>,
}

impl<R> SwitchCell<R> {
    pub(crate) const fn new(value: R) -> Self {
        Self { inner: UnsafeCell::new(value) }
    }

    /// Runs `f` with exclusive access to the contents.
    pub(crate) fn with<U>(&self, f: impl FnOnce(&mut R) -> U) -> U {
        // The closure cannot switch contexts: it only sees plain data.
        unsafe { f(&mut *self.inner.get()) }
    }

    /// # Safety
    /// The returned reference must be dropped before the next switch, and no
    /// `with` call may run while it is alive.
    pub(crate) unsafe fn get(&self) -> &R {
        unsafe { &*self.inner.get() }
    }

    pub(crate) fn as_ptr(&self) -> *mut R {
        self.inner.get()
    }
}
