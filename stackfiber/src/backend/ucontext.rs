//! Swap-context backend: `makecontext`/`swapcontext` on an `mmap`ed stack.

use std::{io, mem, ptr};

use crate::backend::{ContextBackend, Entry};
use crate::error::{FiberError, Result};

/// Stack memory with a `PROT_NONE` guard page below it.
struct GuardedStack {
    base: *mut libc::c_void,
    len: usize,
    page: usize,
}

impl GuardedStack {
    fn new(size: usize) -> Result<Self> {
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let usable = size.div_ceil(page) * page;
        let len = usable + page;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(FiberError::StackAllocation {
                size,
                reason: io::Error::last_os_error().to_string(),
            });
        }

        // Stacks grow down: the lowest page catches overflows.
        if unsafe { libc::mprotect(base, page, libc::PROT_NONE) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::munmap(base, len) };
            return Err(err.into());
        }

        Ok(Self { base, len, page })
    }

    fn bottom(&self) -> *mut libc::c_void {
        unsafe { self.base.cast::<u8>().add(self.page).cast() }
    }

    fn usable(&self) -> usize {
        self.len - self.page
    }
}

impl Drop for GuardedStack {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.base, self.len) };
    }
}

pub(crate) struct SwapContext {
    caller: libc::ucontext_t,
    fiber: libc::ucontext_t,
    entry: Entry,
    arg: *mut (),
    started: bool,
    exited: bool,
    stack: GuardedStack,
}

impl ContextBackend for SwapContext {
    fn create(stack_size: usize, entry: Entry, arg: *mut ()) -> Result<Self> {
        Ok(Self {
            caller: unsafe { mem::zeroed() },
            fiber: unsafe { mem::zeroed() },
            entry,
            arg,
            started: false,
            exited: false,
            stack: GuardedStack::new(stack_size)?,
        })
    }

    unsafe fn switch_in(this: *mut Self) {
        unsafe {
            // glibc keeps pointers into the ucontext itself, so the fiber
            // context is only built once `this` has its final address.
            if !(*this).started {
                (*this).started = true;
                let fiber = ptr::addr_of_mut!((*this).fiber);
                if libc::getcontext(fiber) != 0 {
                    abort_on_os_error("getcontext");
                }
                (*fiber).uc_stack.ss_sp = (*this).stack.bottom();
                (*fiber).uc_stack.ss_size = (*this).stack.usable();
                (*fiber).uc_link = ptr::null_mut();

                let addr = this as usize as u64;
                let start: extern "C" fn(u32, u32) = trampoline;
                libc::makecontext(
                    fiber,
                    mem::transmute::<extern "C" fn(u32, u32), extern "C" fn()>(start),
                    2,
                    (addr >> 32) as u32,
                    addr as u32,
                );
            }
            if libc::swapcontext(ptr::addr_of_mut!((*this).caller), ptr::addr_of!((*this).fiber)) != 0 {
                abort_on_os_error("swapcontext");
            }
        }
    }

    unsafe fn switch_out(this: *mut Self) {
        unsafe {
            if libc::swapcontext(ptr::addr_of_mut!((*this).fiber), ptr::addr_of!((*this).caller)) != 0 {
                abort_on_os_error("swapcontext");
            }
        }
    }

    fn is_exited(&self) -> bool {
        self.exited
    }
}

extern "C" fn trampoline(hi: u32, lo: u32) {
    let this = (((hi as u64) << 32) | lo as u64) as usize as *mut SwapContext;
    unsafe {
        ((*this).entry)((*this).arg);
        (*this).exited = true;
        libc::setcontext(ptr::addr_of!((*this).caller));
    }
    abort_on_os_error("setcontext");
}

#[cold]
fn abort_on_os_error(call: &str) -> ! {
    log::error!("{} failed: {}", call, io::Error::last_os_error());
    std::process::abort()
}
