//! Portable backend on top of boost.context's `fcontext` (the `context` crate).

use context::stack::ProtectedFixedSizeStack;
use context::{Context, Transfer};

use crate::backend::{ContextBackend, Entry};
use crate::error::{FiberError, Result};

/// Data word sent along the final switch out of a finished fiber.
const EXITED: usize = usize::MAX;

pub(crate) struct Fcontext {
    // Contexts point into `_stack`, which is dropped last.
    fiber: Option<Context>,
    caller: Option<Context>,
    entry: Entry,
    arg: *mut (),
    exited: bool,
    _stack: ProtectedFixedSizeStack,
}

impl ContextBackend for Fcontext {
    fn create(stack_size: usize, entry: Entry, arg: *mut ()) -> Result<Self> {
        let stack = ProtectedFixedSizeStack::new(stack_size).map_err(|e| {
            FiberError::StackAllocation { size: stack_size, reason: format!("{:?}", e) }
        })?;
        let fiber = unsafe { Context::new(&stack, trampoline) };
        Ok(Self {
            fiber: Some(fiber),
            caller: None,
            entry,
            arg,
            exited: false,
            _stack: stack,
        })
    }

    unsafe fn switch_in(this: *mut Self) {
        unsafe {
            let cx = (*this).fiber.take().expect("fiber context missing");
            // The first resume hands `this` over to the trampoline.
            let from_fiber = cx.resume(this as usize);
            if from_fiber.data == EXITED {
                (*this).exited = true;
            } else {
                (*this).fiber = Some(from_fiber.context);
            }
        }
    }

    unsafe fn switch_out(this: *mut Self) {
        unsafe {
            let cx = (*this).caller.take().expect("caller context missing");
            let from_caller = cx.resume(0);
            (*this).caller = Some(from_caller.context);
        }
    }

    fn is_exited(&self) -> bool {
        self.exited
    }
}

extern "C" fn trampoline(from_caller: Transfer) -> ! {
    let this = from_caller.data as *mut Fcontext;
    unsafe {
        (*this).caller = Some(from_caller.context);
        ((*this).entry)((*this).arg);

        let cx = (*this).caller.take().expect("caller context missing");
        cx.resume(EXITED);
    }
    unreachable!("exited fiber was resumed")
}
