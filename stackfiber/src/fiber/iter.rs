//! Sequence adapters: a fiber driven to completion as an iterator.

use std::iter::FusedIterator;

use crate::fiber::fiber::Fiber;

/// Borrowing adapter, see [`Fiber::iter`].
///
/// Resumes the fiber on every `next` and yields a clone of the value it
/// handed out, so [`Fiber::current`] keeps returning it. Ends once the
/// fiber finishes; a value stored by the entry's return is the last item.
/// Iterating again continues where the previous iteration stopped.
pub struct Iter<'f, 'a, T, L = ()> {
    fiber: Option<&'f mut Fiber<'a, T, L>>,
}

impl<'f, 'a, T, L> Iter<'f, 'a, T, L> {
    pub(crate) fn new(fiber: &'f mut Fiber<'a, T, L>) -> Self {
        let fiber = if fiber.is_finished() { None } else { Some(fiber) };
        Self { fiber }
    }
}

impl<T: Clone, L> Iterator for Iter<'_, '_, T, L> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        // Taken first: a panic leaves the adapter exhausted.
        let fiber = self.fiber.take()?;
        let alive = fiber.resume();
        let item = if fiber.core().channel.take_fresh() {
            fiber.current().cloned()
        } else {
            None
        };
        if alive {
            self.fiber = Some(fiber);
        }
        item
    }
}

impl<T: Clone, L> FusedIterator for Iter<'_, '_, T, L> {}

/// Owning adapter; values are moved out of the fiber.
pub struct IntoIter<'a, T, L = ()> {
    fiber: Option<Fiber<'a, T, L>>,
}

impl<T, L> Iterator for IntoIter<'_, T, L> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let mut fiber = self.fiber.take()?;
        let alive = fiber.resume();
        let item = fiber.core().channel.take_fresh_value();
        if alive {
            self.fiber = Some(fiber);
        }
        item
    }
}

impl<T, L> FusedIterator for IntoIter<'_, T, L> {}

impl<'a, T, L> IntoIterator for Fiber<'a, T, L> {
    type Item = T;
    type IntoIter = IntoIter<'a, T, L>;

    fn into_iter(self) -> IntoIter<'a, T, L> {
        let fiber = if self.is_finished() { None } else { Some(self) };
        IntoIter { fiber }
    }
}

impl<'f, 'a, T: Clone, L> IntoIterator for &'f mut Fiber<'a, T, L> {
    type Item = T;
    type IntoIter = Iter<'f, 'a, T, L>;

    fn into_iter(self) -> Iter<'f, 'a, T, L> {
        Iter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use crate::{Fiber, Yielder};

    #[test]
    fn yields_then_returns() {
        let mut fiber = Fiber::new(|y| {
            y.suspend(1);
            y.suspend(2);
            Some(3)
        });
        let mut seq = Vec::new();
        for n in &mut fiber {
            seq.push(n);
        }
        assert_eq!(seq, [1, 2, 3]);
        assert!(fiber.is_finished());
        assert_eq!(fiber.current(), Some(&3));
    }

    #[test]
    fn body_without_final_value() {
        let fiber = Fiber::new(|y| {
            y.suspend("only");
        });
        assert_eq!(fiber.into_iter().collect::<Vec<_>>(), ["only"]);
    }

    #[test]
    fn empty_body_is_an_empty_sequence() {
        let mut fiber = Fiber::new(|_: &Yielder<u8>| {});
        assert_eq!(fiber.iter().next(), None);
        assert!(fiber.is_finished());
        // Finished fibers are never resumed again.
        assert_eq!(fiber.iter().next(), None);
    }

    #[test]
    fn not_restartable() {
        let mut fiber = Fiber::new(|y| {
            for i in 0..4 {
                y.suspend(i);
            }
        });
        let head: Vec<_> = fiber.iter().take(2).collect();
        let tail: Vec<_> = fiber.iter().collect();
        assert_eq!(head, [0, 1]);
        assert_eq!(tail, [2, 3]);
    }

    #[test]
    fn manual_resume_is_not_repeated() {
        let mut fiber = Fiber::new(|y| {
            y.suspend(1);
        });
        assert!(fiber.resume());
        assert_eq!(fiber.iter().next(), None);
        assert!(fiber.is_finished());

        let mut fiber = Fiber::new(|y| {
            y.suspend(vec![1]);
        });
        assert!(fiber.resume());
        assert_eq!(fiber.into_iter().count(), 0);
    }

    #[test]
    fn manual_resume_then_more_values() {
        let mut fiber = Fiber::new(|y| {
            y.suspend(1);
            y.suspend(2);
        });
        assert!(fiber.resume());
        assert_eq!(fiber.iter().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn owning_adapter_moves_values() {
        let fiber = Fiber::new(|y| {
            y.suspend(vec![1]);
            y.suspend(vec![2, 2]);
        });
        let lens: Vec<usize> = fiber.into_iter().map(|v| v.len()).collect();
        assert_eq!(lens, [1, 2]);
    }

    #[test]
    fn panic_fuses_the_adapter() {
        let mut fiber = Fiber::new(|y| -> () {
            y.suspend(1);
            panic!("second");
        });
        let mut iter = fiber.iter();
        assert_eq!(iter.next(), Some(1));
        assert!(panic::catch_unwind(AssertUnwindSafe(|| iter.next())).is_err());
        assert_eq!(iter.next(), None);
        drop(iter);
        assert!(fiber.is_finished());
    }
}
