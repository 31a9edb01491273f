//! Error types

use std::any::Any;
use std::fmt;
use std::panic;

/// Result type for fiber construction
pub type Result<T, E = FiberError> = std::result::Result<T, E>;

/// Errors that can occur while creating a fiber
#[derive(Debug, thiserror::Error)]
pub enum FiberError {
    /// Requested stack is smaller than [`MIN_STACK_SIZE`](crate::config::MIN_STACK_SIZE)
    #[error("stack size {requested} is below the minimum of {minimum} bytes")]
    StackTooSmall { requested: usize, minimum: usize },

    /// The backend could not reserve the stack memory
    #[error("failed to allocate a {size}-byte fiber stack: {reason}")]
    StackAllocation { size: usize, reason: String },

    /// Platform call failed
    #[error("context backend error: {0}")]
    Backend(#[from] std::io::Error),
}

/// A panic captured inside a fiber body.
///
/// Delivered exactly once, to whichever side regains control first.
pub struct Failure {
    payload: Box<dyn Any + Send + 'static>,
}

impl Failure {
    pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Message of a `panic!("...")`, if the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref()
    }

    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Continues unwinding the current stack with the captured payload.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("message", &self.message())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "fiber panicked: {}", msg),
            None => write!(f, "fiber panicked: <non-string payload>"),
        }
    }
}

impl std::error::Error for Failure {}
