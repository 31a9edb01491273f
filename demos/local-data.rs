//! A toy completion loop: every fiber parks on a "request", tagging it with
//! its index, and is resumed with the request's result once it completes.

use std::collections::VecDeque;

use stackfiber::{Builder, Fiber, Yielder};

/// Per-fiber state the loop reads between resumptions.
#[derive(Debug)]
struct Conn {
    fd: i32,
    pending: Option<usize>,
}

/// Parks the fiber until the loop completes a request of `len` bytes.
fn submit(y: &Yielder<i64, Conn>, len: usize) -> i64 {
    y.local_mut().pending = Some(len);
    y.suspend(0).unwrap_or(-1)
}

fn main() {
    let mut fibers: Vec<Fiber<i64, Conn>> = (0..3)
        .map(|fd| {
            Builder::new()
                .name(format!("conn-{}", fd))
                .local(Conn { fd, pending: None })
                .spawn(move |y: &Yielder<i64, Conn>| {
                    let read = submit(y, 16 * (fd as usize + 1));
                    let written = submit(y, read as usize / 2);
                    Some(read + written)
                })
                .expect("spawn")
        })
        .collect();

    let mut ready: VecDeque<usize> = (0..fibers.len()).collect();
    while let Some(tag) = ready.pop_front() {
        let fiber = &mut fibers[tag];
        let pending = fiber.local_mut().pending.take();
        let alive = match pending {
            None => fiber.resume(),
            Some(len) => fiber.resume_with(len as i64),
        };
        if alive {
            ready.push_back(tag);
        } else {
            println!(
                "{} (fd {}) done: {:?}",
                fiber.name().unwrap_or("?"),
                fiber.local().fd,
                fiber.current()
            );
        }
    }
}
