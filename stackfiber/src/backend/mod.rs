//! Context backends
//!
//! A backend owns a fiber's private stack and knows how to move the CPU
//! between the resumer's context and the fiber's. Exactly one implementation
//! is compiled in per target; the rest of the crate only sees [`Backend`].

use crate::error::Result;

/// Function run on the fresh stack the first time a context is switched into.
///
/// It must not unwind. When it returns, the backend switches back to the
/// resumer for the last time and the context is never entered again.
pub(crate) type Entry = unsafe fn(*mut ());

pub(crate) trait ContextBackend: Sized {
    /// Reserves a stack of at least `stack_size` usable bytes. `entry(arg)`
    /// only starts at the first [`switch_in`](ContextBackend::switch_in).
    fn create(stack_size: usize, entry: Entry, arg: *mut ()) -> Result<Self>;

    /// Caller side: suspends the caller until the fiber switches out or its
    /// entry returns.
    ///
    /// # Safety
    /// `this` must stay at the same address from the first `switch_in` until
    /// it is dropped, and the entry must not have returned yet.
    unsafe fn switch_in(this: *mut Self);

    /// Fiber side: parks the fiber and wakes the caller that switched in.
    ///
    /// # Safety
    /// Must be called from the stack of this very context.
    unsafe fn switch_out(this: *mut Self);

    /// Whether the entry function has returned.
    fn is_exited(&self) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub(crate) type Backend = windows::NativeFiber;
    } else if #[cfg(all(
        feature = "ucontext",
        target_os = "linux",
        target_env = "gnu",
        target_arch = "x86_64",
    ))] {
        mod ucontext;
        pub(crate) type Backend = ucontext::SwapContext;
    } else {
        mod fcontext;
        pub(crate) type Backend = fcontext::Fcontext;
    }
}
