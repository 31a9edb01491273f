//! Fiber management module
//! A fiber is a stackful coroutine: it owns a private stack, can suspend
//! itself from any depth of its call stack and hands one value to its
//! resumer at every suspension point.

use std::cell::Cell;
use std::ptr;

pub(crate) mod fiber;
pub(crate) mod channel;
pub(crate) mod yielder;
pub(crate) mod unwind;
pub(crate) mod iter;

pub use fiber::{Builder, Fiber};
pub use iter::{IntoIter, Iter};
pub use unwind::is_forced_unwind;
pub use yielder::Yielder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Created, entry not run yet.
    Unstarted,
    /// The body is executing.
    Running,
    /// The body is parked in [`Yielder::suspend`].
    Suspended,
    /// The entry returned, panicked or was force-closed. Terminal.
    Closed,
}

/// What an entry function may return.
///
/// `()` closes the fiber without a final value, `Some(v)` stores `v` as the
/// last value, readable through [`Fiber::current`] and emitted by the
/// sequence adapters.
pub trait IntoFinal<T> {
    fn into_final(self) -> Option<T>;
}

impl<T> IntoFinal<T> for () {
    fn into_final(self) -> Option<T> {
        None
    }
}

impl<T> IntoFinal<T> for Option<T> {
    fn into_final(self) -> Option<T> {
        self
    }
}

thread_local! {
    /// Core of the fiber whose body is executing on this thread, if any.
    static ACTIVE: Cell<*const ()> = const { Cell::new(ptr::null()) };
}

/// Whether the caller runs inside a fiber body.
pub fn is_inside_fiber() -> bool {
    !ACTIVE.get().is_null()
}

pub(crate) fn activate(core: *const ()) -> *const () {
    ACTIVE.replace(core)
}

pub(crate) fn restore(previous: *const ()) {
    ACTIVE.set(previous);
}

pub(crate) fn is_active(core: *const ()) -> bool {
    ACTIVE.get() == core
}
