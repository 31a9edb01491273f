//! Macros for use with stackfiber.

extern crate proc_macro;

use proc_macro::TokenStream;

mod generator;

/// Turns a function whose first parameter is a `&Yielder<T>` (or
/// `&Yielder<T, L>`) into a constructor of a fiber running that function.
///
/// The remaining parameters are moved into the fiber, and the local data of
/// the fiber starts as `L::default()`.
///
/// ```ignore
/// #[stackfiber::generator]
/// fn count(y: &Yielder<u32>, upto: u32) {
///     for n in 0..upto {
///         y.suspend(n);
///     }
/// }
///
/// let fiber: Fiber<'static, u32> = count(3);
/// ```
#[proc_macro_attribute]
pub fn generator(args: TokenStream, item: TokenStream) -> TokenStream {
    generator::generator_impl(args, item)
}
