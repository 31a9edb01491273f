//! Fiber state machine
//! Fiber is the caller-side owner of a stackful coroutine.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::thread;

use crate::backend::{Backend, ContextBackend};
use crate::config::{FiberConfig, MIN_STACK_SIZE};
use crate::error::{Failure, FiberError, Result};
use crate::fiber::channel::{Channel, Injected};
use crate::fiber::iter::Iter;
use crate::fiber::unwind::{self, ForcedUnwind};
use crate::fiber::yielder::Yielder;
use crate::fiber::{activate, restore, IntoFinal, Status};
use crate::utils::SwitchCell;

type EntryFn<T, L> = Box<dyn FnOnce(&Yielder<T, L>) -> Option<T>>;

/// State shared by the fiber body and its owner. Only one of the two runs
/// at any time, and neither keeps a borrow of it across a switch.
pub(crate) struct Core<T, L> {
    pub(crate) status: Cell<Status>,
    pub(crate) cancelling: Cell<bool>,
    pub(crate) channel: Channel<T>,
    pub(crate) local: RefCell<L>,
    entry: Cell<Option<EntryFn<T, L>>>,
    backend: SwitchCell<Option<Backend>>,
}

impl<T, L> Core<T, L> {
    pub(crate) fn as_ptr(&self) -> *const () {
        self as *const Self as *const ()
    }

    pub(crate) fn backend(&self) -> *mut Backend {
        match unsafe { &mut *self.backend.as_ptr() } {
            Some(backend) => backend,
            None => unreachable!("fiber core without a backend"),
        }
    }
}

/// Runs on the fiber's own stack; returning hands control back for good.
unsafe fn fiber_main<T, L>(arg: *mut ()) {
    let core = unsafe { &*(arg as *const Core<T, L>) };
    let yielder = Yielder::new(core);
    let entry = core.entry.take();
    core.status.set(Status::Running);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // A failure injected before the first resume fires before the body.
        yielder.raise_injected();
        entry.and_then(|entry| entry(&yielder))
    }));
    match outcome {
        Ok(_) if core.cancelling.get() => unwind::fatal("fiber swallowed its forced unwind"),
        Ok(Some(last)) => core.channel.publish(last),
        Ok(None) => {}
        Err(payload) if payload.is::<ForcedUnwind>() => {}
        Err(payload) => core.channel.capture(Failure::new(payload)),
    }
    core.status.set(Status::Closed);
}

/// A stackful coroutine yielding values of type `T`, carrying local data `L`.
///
/// The entry function receives a [`Yielder`] and runs on a private stack.
/// Each [`resume`](Fiber::resume) runs it until it calls
/// [`Yielder::suspend`] or returns.
///
/// ```
/// use stackfiber::Fiber;
///
/// let mut fiber = Fiber::new(|y| {
///     y.suspend(1);
///     y.suspend(2);
///     Some(3)
/// });
/// assert_eq!(fiber.iter().collect::<Vec<_>>(), [1, 2, 3]);
/// assert!(fiber.is_finished());
/// ```
///
/// Dropping a fiber that has not finished unwinds its stack first, so
/// every destructor on it runs.
pub struct Fiber<'a, T, L = ()> {
    core: NonNull<Core<T, L>>,
    name: Option<String>,
    stack_size: usize,
    _marker: PhantomData<(&'a (), Core<T, L>)>,
}

impl<'a, T> Fiber<'a, T> {
    /// Creates a fiber with the default configuration.
    ///
    /// # Panics
    /// If the stack cannot be allocated. Use [`Builder`] to handle that.
    pub fn new<F, R>(entry: F) -> Self
    where
        F: FnOnce(&Yielder<T>) -> R + 'a,
        R: IntoFinal<T>,
    {
        Self::with_local((), entry)
    }
}

impl<'a, T, L> Fiber<'a, T, L> {
    /// Creates a fiber with the default configuration and local data.
    ///
    /// # Panics
    /// If the stack cannot be allocated. Use [`Builder`] to handle that.
    pub fn with_local<F, R>(local: L, entry: F) -> Self
    where
        F: FnOnce(&Yielder<T, L>) -> R + 'a,
        R: IntoFinal<T>,
    {
        match Builder::new().local(local).spawn(entry) {
            Ok(fiber) => fiber,
            Err(e) => panic!("failed to create fiber: {}", e),
        }
    }

    fn create<F, R>(config: FiberConfig, name: Option<String>, local: L, entry: F) -> Result<Self>
    where
        F: FnOnce(&Yielder<T, L>) -> R + 'a,
        R: IntoFinal<T>,
    {
        if config.stack_size < MIN_STACK_SIZE {
            return Err(FiberError::StackTooSmall {
                requested: config.stack_size,
                minimum: MIN_STACK_SIZE,
            });
        }

        let entry: Box<dyn FnOnce(&Yielder<T, L>) -> Option<T> + 'a> =
            Box::new(move |y: &Yielder<T, L>| entry(y).into_final());
        // SAFETY: the entry only runs while the fiber is alive, and the
        // fiber cannot outlive 'a; dropping it closes the body first.
        let entry: EntryFn<T, L> = unsafe { mem::transmute(entry) };

        let core = NonNull::from(Box::leak(Box::new(Core {
            status: Cell::new(Status::Unstarted),
            cancelling: Cell::new(false),
            channel: Channel::new(),
            local: RefCell::new(local),
            entry: Cell::new(Some(entry)),
            backend: SwitchCell::new(None),
        })));

        let arg = core.as_ptr() as *mut ();
        match Backend::create(config.stack_size, fiber_main::<T, L>, arg) {
            Ok(backend) => {
                unsafe { core.as_ref() }.backend.with(|slot| *slot = Some(backend));
            }
            Err(e) => {
                drop(unsafe { Box::from_raw(core.as_ptr()) });
                return Err(e);
            }
        }

        let fiber = Self {
            core,
            name,
            stack_size: config.stack_size,
            _marker: PhantomData,
        };
        log::trace!("created fiber {} with a {}-byte stack", fiber.label(), fiber.stack_size);
        Ok(fiber)
    }

    pub(crate) fn core(&self) -> &Core<T, L> {
        unsafe { self.core.as_ref() }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Switches into the fiber until it suspends or closes.
    fn enter(&mut self) -> std::result::Result<bool, Failure> {
        let core = self.core();
        match core.status.get() {
            Status::Unstarted | Status::Suspended => {}
            Status::Running => panic!("fiber {} resumed from inside its own body", self.label()),
            Status::Closed => panic!("resumed fiber {} after it finished", self.label()),
        }

        // Whatever is fresh after the switch was published by this resume.
        core.channel.take_fresh();
        let outer = activate(core.as_ptr());
        unsafe { Backend::switch_in(core.backend()) };
        restore(outer);
        debug_assert_eq!(
            core.status.get() == Status::Closed,
            unsafe { &*core.backend() }.is_exited()
        );

        if let Some(failure) = core.channel.take_failure() {
            return Err(failure);
        }
        Ok(core.status.get() != Status::Closed)
    }

    /// Runs the fiber until its next suspension point. Returns whether the
    /// fiber is still alive.
    ///
    /// A panic of the body is re-raised here, after which the fiber is
    /// finished.
    ///
    /// # Panics
    /// If the fiber already finished.
    pub fn resume(&mut self) -> bool {
        self.try_resume().unwrap_or_else(|failure| failure.resume())
    }

    /// Like [`resume`](Fiber::resume), handing `input` to the body: it is
    /// returned by the pending [`Yielder::suspend`], or by
    /// [`Yielder::take_input`] on the first resume.
    pub fn resume_with(&mut self, input: T) -> bool {
        self.try_resume_with(input).unwrap_or_else(|failure| failure.resume())
    }

    /// Like [`resume`](Fiber::resume), returning a panic of the body as an
    /// error instead of unwinding.
    pub fn try_resume(&mut self) -> std::result::Result<bool, Failure> {
        self.enter()
    }

    pub fn try_resume_with(&mut self, input: T) -> std::result::Result<bool, Failure> {
        self.core().channel.feed(input);
        self.enter()
    }

    /// Resumes the fiber by raising `failure` at its suspension point, or
    /// before its entry runs if it has not started. Whatever escapes the
    /// body is re-raised here, like a panic seen by [`resume`](Fiber::resume).
    pub fn inject_failure<E>(&mut self, failure: E) -> bool
    where
        E: Any + Send + 'static,
    {
        self.try_inject_failure(failure).unwrap_or_else(|failure| failure.resume())
    }

    pub fn try_inject_failure<E>(&mut self, failure: E) -> std::result::Result<bool, Failure>
    where
        E: Any + Send + 'static,
    {
        let payload: Box<dyn Any + Send> = Box::new(failure);
        self.core().channel.inject(Injected::Failure(Failure::new(payload)));
        self.enter()
    }

    /// Finishes the fiber without letting it run on: a suspended body is
    /// unwound from its suspension point, an unstarted one never runs.
    /// A panic raised while unwinding is re-raised here.
    pub fn force_close(&mut self) {
        if let Some(failure) = self.close() {
            failure.resume();
        }
    }

    fn close(&mut self) -> Option<Failure> {
        let core = self.core();
        match core.status.get() {
            Status::Closed => return None,
            Status::Unstarted => {
                drop(core.entry.take());
                core.status.set(Status::Closed);
                log::trace!("closed unstarted fiber {}", self.label());
                return None;
            }
            Status::Running => unwind::fatal("cannot close a fiber from inside its own body"),
            Status::Suspended => {}
        }

        log::trace!("force-unwinding fiber {}", self.label());
        core.cancelling.set(true);
        core.channel.inject(Injected::Unwind);
        let result = self.enter();

        if self.core().status.get() != Status::Closed {
            unwind::fatal("fiber stayed alive after its forced unwind");
        }
        result.err()
    }

    /// The last value handed out by the fiber, `None` before the first one.
    pub fn current(&self) -> Option<&T> {
        // No switch can happen while `self` is borrowed.
        unsafe { self.core().channel.current() }
    }

    pub fn status(&self) -> Status {
        self.core().status.get()
    }

    pub fn is_finished(&self) -> bool {
        self.status() == Status::Closed
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// # Panics
    /// If the body holds a mutable borrow of the data across a suspension.
    pub fn local(&self) -> Ref<'_, L> {
        self.core().local.borrow()
    }

    /// # Panics
    /// If the body holds a borrow of the data across a suspension.
    pub fn local_mut(&self) -> RefMut<'_, L> {
        self.core().local.borrow_mut()
    }

    /// Closes the fiber (see [`force_close`](Fiber::force_close)) and
    /// returns its local data.
    pub fn into_local(mut self) -> L {
        self.force_close();
        let this = ManuallyDrop::new(self);
        drop(unsafe { ptr::read(&this.name) });
        let core = *unsafe { Box::from_raw(this.core.as_ptr()) };
        core.local.into_inner()
    }

    /// Sequence of the values the fiber produces from here on.
    pub fn iter(&mut self) -> Iter<'_, 'a, T, L> {
        Iter::new(self)
    }
}

impl<T, L> Drop for Fiber<'_, T, L> {
    fn drop(&mut self) {
        let failure = self.close();
        log::trace!("dropping fiber {}", self.label());
        drop(unsafe { Box::from_raw(self.core.as_ptr()) });

        if let Some(failure) = failure {
            if thread::panicking() {
                log::debug!("fiber {} panicked while being dropped: {}", self.label(), failure);
            } else {
                failure.resume();
            }
        }
    }
}

/// Fiber factory, which can be used in order to configure the properties
/// of a new fiber.
///
/// ```
/// use stackfiber::Builder;
///
/// let mut fiber = Builder::new()
///     .name("counter")
///     .stack_size(64 * 1024)
///     .local(0usize)
///     .spawn(|y| {
///         for i in 0..3 {
///             *y.local_mut() += 1;
///             y.suspend(i);
///         }
///     })
///     .unwrap();
/// assert_eq!(fiber.iter().sum::<i32>(), 3);
/// assert_eq!(*fiber.local(), 3);
/// ```
#[derive(Debug, Default)]
pub struct Builder<L = ()> {
    config: Option<FiberConfig>,
    name: Option<String>,
    local: L,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L> Builder<L> {
    pub fn config(mut self, config: FiberConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.config = Some(FiberConfig::new(stack_size));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches local data, shared by the body and the fiber's owner.
    pub fn local<M>(self, local: M) -> Builder<M> {
        Builder {
            config: self.config,
            name: self.name,
            local,
        }
    }

    pub fn spawn<'a, T, F, R>(self, entry: F) -> Result<Fiber<'a, T, L>>
    where
        F: FnOnce(&Yielder<T, L>) -> R + 'a,
        R: IntoFinal<T>,
    {
        let config = self.config.unwrap_or_default();
        Fiber::create(config, self.name, self.local, entry)
    }
}
