//! Nested loops drawing into one surface.
//!
//! Odd sub-loops are transient and disappear once done; the rest stay on screen.
//! Run with `RUST_LOG=debug` to see the surface lifecycle.

use std::{thread::sleep, time::Duration};

use stacked_progress::{IterOptions, ProgressIteratorExt as _, progress_bar};

fn main() {
    env_logger::init();

    let numbers = (0..10).filter(|n| n % 2 == 0);
    for _ in numbers.progress_bar("generator") {
        sleep(Duration::from_millis(100));
    }

    for i in progress_bar([0, 1, 2], "outer") {
        let options = IterOptions::new(format!("subtask {i}")).with_transient(i % 2 == 1);
        for _ in (0..10).progress_bar_with(options) {
            sleep(Duration::from_millis(100));
        }
    }

    for (n, _) in (0..).zip(std::iter::repeat(()).progress_bar("abandoned")) {
        if n == 25 {
            break;
        }
        sleep(Duration::from_millis(20));
    }
}
