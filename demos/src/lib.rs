//! Shared pieces of the demo programs.

use std::time::{Duration, Instant};

use stackfiber::{generator, Yielder};

pub const DIGITS: [i32; 4] = [1, 2, 3, 4];

/// All orderings of the first `length` entries of `arr`, each followed by
/// the entries already chosen by the outer levels.
#[generator]
pub fn permutation(y: &Yielder<[i32; 4]>, arr: [i32; 4], length: usize) {
    if length == 0 {
        y.suspend(arr);
        return;
    }
    for i in 0..length {
        let mut next = arr;
        next[i..].rotate_left(1);
        y.yield_all(permutation(next, length - 1));
    }
}

/// Iteration count of the micro benchmarks, `TIMES` in the environment.
pub fn times() -> u32 {
    std::env::var("TIMES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(999_999)
}

pub fn timed<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}
