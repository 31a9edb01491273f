use stackfiber::{Fiber, Yielder};

fn main() {
    let times = demos::times() as i64;
    let mut pang_count = 0u32;
    let mut ping_count = 0u32;

    let ((), elapsed) = demos::timed(|| {
        let mut fiber = Fiber::new(|y: &Yielder<i64>| {
            let mut value = y.take_input();
            while let Some(v) = value.filter(|v| *v < times) {
                pang_count += 1;
                value = y.suspend(v + 1);
            }
        });

        ping_count += 1;
        let mut alive = fiber.resume_with(0);
        while alive {
            let next = fiber.current().copied().unwrap_or_default() + 1;
            alive = fiber.resume_with(next);
            if alive {
                ping_count += 1;
            }
        }
    });

    println!(
        "{}ms: pingCount {}, pangCount {}",
        elapsed.as_millis(),
        ping_count,
        pang_count
    );
}
