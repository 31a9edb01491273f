//! Native backend on the Windows fiber API.
//!
//! The calling thread is converted into a fiber when the first fiber of the
//! thread is created and converted back when the last one is destroyed.

use std::cell::Cell;
use std::ffi::c_void;
use std::{io, ptr};

use windows_sys::Win32::System::Threading::{
    ConvertFiberToThread, ConvertThreadToFiberEx, CreateFiberEx, DeleteFiber, IsThreadAFiber,
    SwitchToFiber, FIBER_FLAG_FLOAT_SWITCH,
};

use crate::backend::{ContextBackend, Entry};
use crate::error::{FiberError, Result};

thread_local! {
    /// Fiber the thread was converted into, with the number of live backends using it.
    static THREAD_FIBER: Cell<(*mut c_void, usize)> = const { Cell::new((ptr::null_mut(), 0)) };
    /// Native fiber currently executing on this thread.
    static RUNNING: Cell<*mut c_void> = const { Cell::new(ptr::null_mut()) };
}

fn acquire_thread_fiber() -> Result<()> {
    let (handle, users) = THREAD_FIBER.get();
    if users > 0 {
        THREAD_FIBER.set((handle, users + 1));
        return Ok(());
    }
    if unsafe { IsThreadAFiber() } != 0 {
        // Without GetCurrentFiber we cannot learn the foreign fiber's handle.
        return Err(FiberError::Backend(io::Error::other(
            "thread was already converted to a fiber by foreign code",
        )));
    }
    let handle = unsafe { ConvertThreadToFiberEx(ptr::null(), FIBER_FLAG_FLOAT_SWITCH) };
    if handle.is_null() {
        return Err(io::Error::last_os_error().into());
    }
    log::trace!("converted thread to fiber {:p}", handle);
    THREAD_FIBER.set((handle, 1));
    RUNNING.set(handle);
    Ok(())
}

fn release_thread_fiber() {
    let (handle, users) = THREAD_FIBER.get();
    if users > 1 {
        THREAD_FIBER.set((handle, users - 1));
        return;
    }
    THREAD_FIBER.set((ptr::null_mut(), 0));
    RUNNING.set(ptr::null_mut());
    if unsafe { ConvertFiberToThread() } == 0 {
        log::error!("ConvertFiberToThread failed: {}", io::Error::last_os_error());
    }
}

/// State the start routine reaches through its parameter; boxed so that it
/// does not move with the backend.
struct Shared {
    caller: *mut c_void,
    entry: Entry,
    arg: *mut (),
    exited: bool,
}

pub(crate) struct NativeFiber {
    handle: *mut c_void,
    shared: Box<Shared>,
}

impl ContextBackend for NativeFiber {
    fn create(stack_size: usize, entry: Entry, arg: *mut ()) -> Result<Self> {
        acquire_thread_fiber()?;
        let mut shared = Box::new(Shared {
            caller: ptr::null_mut(),
            entry,
            arg,
            exited: false,
        });
        let param = &mut *shared as *mut Shared as *const c_void;
        let handle =
            unsafe { CreateFiberEx(0, stack_size, FIBER_FLAG_FLOAT_SWITCH, Some(start), param) };
        if handle.is_null() {
            let err = io::Error::last_os_error();
            release_thread_fiber();
            return Err(FiberError::StackAllocation { size: stack_size, reason: err.to_string() });
        }
        Ok(Self { handle, shared })
    }

    unsafe fn switch_in(this: *mut Self) {
        unsafe {
            let caller = RUNNING.replace((*this).handle);
            (*this).shared.caller = caller;
            SwitchToFiber((*this).handle);
            RUNNING.set(caller);
        }
    }

    unsafe fn switch_out(this: *mut Self) {
        unsafe { SwitchToFiber((*this).shared.caller) };
    }

    fn is_exited(&self) -> bool {
        self.shared.exited
    }
}

impl Drop for NativeFiber {
    fn drop(&mut self) {
        unsafe { DeleteFiber(self.handle) };
        release_thread_fiber();
    }
}

unsafe extern "system" fn start(param: *mut c_void) {
    let shared = param as *mut Shared;
    unsafe {
        ((*shared).entry)((*shared).arg);
        (*shared).exited = true;
        SwitchToFiber((*shared).caller);
    }
    // Returning from a fiber start routine ends the whole thread.
    log::error!("exited fiber was resumed");
    std::process::abort()
}
