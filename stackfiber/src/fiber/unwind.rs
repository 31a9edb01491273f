//! Forced unwinding of abandoned fibers.
//!
//! A fiber that is dropped (or force-closed) while suspended is woken with a
//! private panic payload. It unwinds the fiber's stack, running every
//! destructor on it, and is swallowed again at the top of the fiber.

use std::any::Any;
use std::panic;

/// The unwind sentinel. Never escapes the fiber it was raised in.
pub(crate) struct ForcedUnwind;

/// Starts unwinding the current fiber stack with the sentinel.
///
/// Goes through `resume_unwind` so that the panic hook stays silent.
pub(crate) fn raise() -> ! {
    panic::resume_unwind(Box::new(ForcedUnwind))
}

/// Whether a payload caught with `catch_unwind` inside a fiber body is the
/// forced unwind of that fiber. Such payloads must be passed on with
/// `resume_unwind`; a fiber that keeps running after swallowing one aborts
/// the process.
///
/// ```
/// use std::panic::{self, AssertUnwindSafe};
/// use stackfiber::{Fiber, is_forced_unwind};
///
/// let mut fiber = Fiber::new(|y| {
///     let caught = panic::catch_unwind(AssertUnwindSafe(|| {
///         y.suspend(1);
///     }));
///     if let Err(payload) = caught {
///         if is_forced_unwind(&*payload) {
///             panic::resume_unwind(payload);
///         }
///     }
/// });
/// assert!(fiber.resume());
/// drop(fiber);
/// ```
pub fn is_forced_unwind(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ForcedUnwind>()
}

/// Reports a broken fiber invariant and aborts. Unwinding is not an option
/// here: the stack in question could no longer be reclaimed.
#[cold]
pub(crate) fn fatal(message: &str) -> ! {
    log::error!("{}", message);
    eprintln!("stackfiber: fatal: {}", message);
    std::process::abort()
}
