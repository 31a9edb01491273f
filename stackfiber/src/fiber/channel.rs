//! Channel is for transferring values and failures between a fiber and its
//! resumer. Every slot is inline, so a switch never allocates.

use crate::error::Failure;
use crate::utils::SwitchCell;

/// Signal delivered into a suspended fiber instead of a normal wake-up.
pub(crate) enum Injected {
    Failure(Failure),
    Unwind,
}

struct Slots<T> {
    /// Last value handed out by the fiber.
    value: Option<T>,
    /// `value` was stored by the latest switch and not consumed yet.
    fresh: bool,
    input: Option<T>,
    failure: Option<Failure>,
    injected: Option<Injected>,
}

pub(crate) struct Channel<T> {
    slots: SwitchCell<Slots<T>>,
}

impl<T> Channel<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: SwitchCell::new(Slots {
                value: None,
                fresh: false,
                input: None,
                failure: None,
                injected: None,
            }),
        }
    }

    pub(crate) fn publish(&self, value: T) {
        self.slots.with(|s| {
            s.value = Some(value);
            s.fresh = true;
        });
    }

    /// # Safety
    /// The reference must not be held across a switch into the fiber.
    pub(crate) unsafe fn current(&self) -> Option<&T> {
        unsafe { self.slots.get() }.value.as_ref()
    }

    /// Marks the latest value consumed; reports whether there was one.
    pub(crate) fn take_fresh(&self) -> bool {
        self.slots.with(|s| std::mem::take(&mut s.fresh))
    }

    /// Moves the latest value out if it was not consumed yet.
    pub(crate) fn take_fresh_value(&self) -> Option<T> {
        self.slots.with(|s| {
            if std::mem::take(&mut s.fresh) {
                s.value.take()
            } else {
                None
            }
        })
    }

    pub(crate) fn feed(&self, input: T) {
        self.slots.with(|s| s.input = Some(input));
    }

    pub(crate) fn take_input(&self) -> Option<T> {
        self.slots.with(|s| s.input.take())
    }

    pub(crate) fn capture(&self, failure: Failure) {
        self.slots.with(|s| s.failure = Some(failure));
    }

    pub(crate) fn take_failure(&self) -> Option<Failure> {
        self.slots.with(|s| s.failure.take())
    }

    pub(crate) fn inject(&self, signal: Injected) {
        self.slots.with(|s| s.injected = Some(signal));
    }

    pub(crate) fn take_injected(&self) -> Option<Injected> {
        self.slots.with(|s| s.injected.take())
    }
}
