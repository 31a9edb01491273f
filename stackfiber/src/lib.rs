//! Stackfiber is a library of stackful, cooperative coroutines ("fibers").
//! A fiber runs on its own stack, can suspend itself at any call depth and
//! exchanges one typed value with its resumer at every suspension point.
//!
//! ```
//! use stackfiber::{Fiber, Yielder};
//!
//! #[stackfiber::generator]
//! fn countdown(y: &Yielder<u32>, from: u32) {
//!     for n in (1..=from).rev() {
//!         y.suspend(n);
//!     }
//! }
//!
//! let fiber: Fiber<u32> = countdown(3);
//! assert_eq!(fiber.into_iter().collect::<Vec<_>>(), [3, 2, 1]);
//! ```
//!
//! Fibers are single-threaded: a fiber never leaves the thread it was
//! created on, and only one of a fiber and its resumer runs at a time.

extern crate self as stackfiber;

mod utils;
mod backend;
pub mod config;
pub mod error;
pub mod fiber;

pub use config::FiberConfig;
pub use error::{Failure, FiberError, Result};
pub use fiber::{
    is_forced_unwind, is_inside_fiber, Builder, Fiber, IntoFinal, IntoIter, Iter, Status, Yielder,
};
pub use stackfiber_macros::generator;

#[cfg(test)]
mod tests {
    use super::*;

    #[generator]
    fn permutation(y: &Yielder<[i32; 4]>, arr: [i32; 4], length: usize) {
        if length == 0 {
            y.suspend(arr);
            return;
        }
        for i in 0..length {
            // Move arr[i] to the back, keeping the order of the others.
            let mut next = arr;
            next[i..].rotate_left(1);
            y.yield_all(permutation(next, length - 1));
        }
    }

    #[generator]
    fn tagged(y: &Yielder<u8, Vec<u8>>, first: u8) -> Option<u8> {
        y.local_mut().push(first);
        y.suspend(first);
        Some(first + 1)
    }

    #[test]
    fn permutations_of_four() {
        let all: Vec<[i32; 4]> = permutation([1, 2, 3, 4], 4).into_iter().collect();
        assert_eq!(all.len(), 24);

        let mut sorted = all.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 24);
        // Removing one element per level walks the permutations in
        // lexicographic order.
        assert_eq!(all, sorted);
        assert_eq!(all[1], [1, 2, 4, 3]);
        assert_eq!(all[23], [4, 3, 2, 1]);
    }

    #[test]
    fn generator_with_local_data_and_final_value() {
        let mut fiber = tagged(7);
        assert!(fiber.resume());
        assert_eq!(fiber.current(), Some(&7));
        assert!(!fiber.resume());
        assert_eq!(fiber.current(), Some(&8));
        assert_eq!(fiber.into_local(), vec![7]);
    }
}
