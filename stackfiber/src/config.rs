//! Fiber configuration

use std::str::FromStr;

/// Stack size used when neither the builder nor the environment picks one.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Smallest stack a fiber may be created with. Unwinding a panic through a
/// fiber body needs a few kilobytes on its own.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Environment variable overriding [`DEFAULT_STACK_SIZE`].
pub const STACK_SIZE_ENV: &str = "STACKFIBER_STACK_SIZE";

/// Per-fiber configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiberConfig {
    /// Usable stack size in bytes, guard pages not included.
    pub stack_size: usize,
}

impl Default for FiberConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl FiberConfig {
    pub fn new(stack_size: usize) -> Self {
        Self { stack_size }
    }

    /// Builds a configuration from an arbitrary key lookup, falling back to
    /// the defaults for missing or unparsable entries.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            stack_size: parse_or(lookup(STACK_SIZE_ENV), DEFAULT_STACK_SIZE),
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
