use stackfiber::{Fiber, Yielder};

fn main() {
    let times = demos::times();
    let mut enter_count = 0u32;

    let ((), elapsed) = demos::timed(|| {
        for _ in 0..times {
            let mut fiber = Fiber::new(|_: &Yielder<i32>| enter_count += 1);
            fiber.resume();
        }
    });

    println!("{}ms: enterCount {}", elapsed.as_millis(), enter_count);
}
