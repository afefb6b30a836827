//! A batch of futures with mixed latencies and one failure.

use std::time::Duration;

use stacked_progress::Gather;

async fn example_task(duration: f64, name: &'static str) -> Result<String, String> {
    tokio::time::sleep(Duration::from_secs_f64(duration)).await;
    if name.contains('2') {
        return Err(format!("{name} gave up"));
    }
    Ok(format!("Completed {name}"))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let tasks = [
        example_task(1.0, "Task 1"),
        example_task(1.5, "Task 2"),
        example_task(0.8, "Task 3"),
        example_task(2.0, "Task 4"),
        example_task(1.2, "Task 5"),
    ];

    let results = Gather::new("Running example tasks...")
        .with_capture_errors(true)
        .run(tasks)
        .await
        .unwrap_or_default();

    for result in results {
        match result {
            Ok(message) => println!("{message}"),
            Err(err) => println!("error {err}"),
        }
    }
}
