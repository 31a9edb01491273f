//! The fiber side of a fiber.

use std::cell::{Ref, RefMut};
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::backend::{Backend, ContextBackend};
use crate::fiber::channel::Injected;
use crate::fiber::fiber::Core;
use crate::fiber::{is_active, unwind, Status};

/// Handle passed by reference to a fiber's entry function.
///
/// It is only reachable from inside the body it was handed to, so every
/// call on it happens on the fiber's own stack.
pub struct Yielder<T, L = ()> {
    core: NonNull<Core<T, L>>,
    _not_send: PhantomData<*mut ()>,
}

impl<T, L> Yielder<T, L> {
    pub(crate) fn new(core: &Core<T, L>) -> Self {
        Self {
            core: NonNull::from(core),
            _not_send: PhantomData,
        }
    }

    fn core(&self) -> &Core<T, L> {
        // The core outlives the body running on its stack.
        unsafe { self.core.as_ref() }
    }

    /// Hands `value` to the resumer and parks the fiber until the next
    /// resume. Returns the input passed to [`Fiber::resume_with`], if any.
    ///
    /// If the fiber was woken by [`Fiber::inject_failure`] the injected
    /// payload is raised here instead; if it was woken to be closed, the
    /// stack unwinds from here.
    ///
    /// [`Fiber::resume_with`]: crate::Fiber::resume_with
    /// [`Fiber::inject_failure`]: crate::Fiber::inject_failure
    pub fn suspend(&self, value: T) -> Option<T> {
        let core = self.core();
        if core.cancelling.get() {
            unwind::fatal("fiber suspended while being force-closed: the unwind sentinel was swallowed");
        }
        assert!(
            is_active(core.as_ptr()),
            "Yielder::suspend called outside of its own fiber's stack"
        );
        debug_assert_eq!(core.status.get(), Status::Running);

        core.channel.publish(value);
        core.status.set(Status::Suspended);
        unsafe { Backend::switch_out(core.backend()) };
        core.status.set(Status::Running);

        self.raise_injected();
        core.channel.take_input()
    }

    /// Input passed to the resume that last woke the fiber and not consumed
    /// by [`suspend`](Yielder::suspend) yet, typically the first one.
    pub fn take_input(&self) -> Option<T> {
        self.core().channel.take_input()
    }

    /// Re-yields every value produced by `values`, in order.
    ///
    /// Accepts other fibers, either by value or as `&mut Fiber` (which clones
    /// and leaves the inner fiber's `current` intact). Panics of the inner
    /// fiber propagate out of this call. Inputs fed to this fiber while it
    /// delegates are discarded.
    pub fn yield_all<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.suspend(value);
        }
    }

    /// Fiber-local data. The borrow must be released before suspending if
    /// the resumer wants to access it.
    pub fn local(&self) -> Ref<'_, L> {
        self.core().local.borrow()
    }

    pub fn local_mut(&self) -> RefMut<'_, L> {
        self.core().local.borrow_mut()
    }

    pub(crate) fn raise_injected(&self) {
        match self.core().channel.take_injected() {
            Some(Injected::Unwind) => unwind::raise(),
            Some(Injected::Failure(failure)) => failure.resume(),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use crate::Fiber;

    #[test]
    fn suspend_returns_resume_input() {
        let mut seen = Vec::new();
        let mut fiber = Fiber::new(|y: &crate::Yielder<i32>| {
            let mut last = y.take_input();
            while let Some(n) = last {
                last = y.suspend(n * 10);
            }
        });
        assert!(fiber.resume_with(1));
        assert_eq!(fiber.current(), Some(&10));
        assert!(fiber.resume_with(2));
        seen.push(*fiber.current().unwrap());
        assert!(!fiber.resume());
        assert_eq!(seen, [20]);
    }

    #[test]
    fn yield_all_forwards_in_order() {
        let mut outer = Fiber::new(|y| {
            y.suspend('<');
            y.yield_all(Fiber::new(|inner| {
                inner.suspend('a');
                inner.suspend('b');
                inner.suspend('c');
            }));
            y.suspend('>');
        });
        let out: String = outer.iter().collect();
        assert_eq!(out, "<abc>");
    }

    #[test]
    fn yield_all_borrowed_keeps_inner_current() {
        let mut inner = Fiber::new(|y| {
            y.suspend(1);
            y.suspend(2);
        });
        let mut outer = Fiber::new(|y| y.yield_all(&mut inner));
        assert_eq!(outer.iter().collect::<Vec<_>>(), [1, 2]);
        drop(outer);
        assert!(inner.is_finished());
        assert_eq!(inner.current(), Some(&2));
    }

    #[test]
    fn yield_all_skips_values_already_taken() {
        let mut inner = Fiber::new(|y| {
            y.suspend(1);
            y.suspend(2);
        });
        assert!(inner.resume());
        assert!(inner.resume());
        let mut outer = Fiber::new(|y| y.yield_all(&mut inner));
        assert_eq!(outer.iter().next(), None);
        drop(outer);
        assert_eq!(inner.current(), Some(&2));
    }

    #[test]
    fn yield_all_propagates_inner_panic() {
        let mut outer = Fiber::new(|y| {
            y.yield_all(Fiber::new(|inner| -> () {
                inner.suspend(1);
                panic!("inner broke");
            }));
            y.suspend(99);
        });
        assert!(outer.resume());
        assert_eq!(outer.current(), Some(&1));
        let failure = outer.try_resume().unwrap_err();
        assert_eq!(failure.message(), Some("inner broke"));
        assert!(outer.is_finished());
    }

    #[test]
    fn suspending_an_outer_fiber_from_an_inner_one_panics() {
        let mut outer = Fiber::new(|y: &crate::Yielder<i32>| {
            let mut inner = Fiber::new(|_: &crate::Yielder<i32>| {
                y.suspend(1);
            });
            let caught = panic::catch_unwind(AssertUnwindSafe(|| inner.resume()));
            assert!(caught.is_err());
            y.suspend(2);
        });
        assert!(outer.resume());
        assert_eq!(outer.current(), Some(&2));
    }

    #[test]
    fn local_data_is_shared_between_sides() {
        let mut fiber = Fiber::with_local(0u32, |y| {
            *y.local_mut() += 1;
            y.suspend(());
            *y.local_mut() *= 10;
        });
        fiber.resume();
        assert_eq!(*fiber.local(), 1);
        *fiber.local_mut() = 4;
        fiber.resume();
        assert_eq!(fiber.into_local(), 40);
    }
}
