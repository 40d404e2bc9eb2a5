/*!
 * Deadline Demo
 *
 * Walks through the common deadline patterns:
 * - A task that outlives its deadline
 * - A task that finishes in time
 * - Extending and clearing a deadline between runs
 */

use deadline_kit::{init_tracing, Deadline};
use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

fn sleeper(ms: u64) -> impl FnOnce() + Send + 'static {
    move || thread::sleep(Duration::from_millis(ms))
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let deadline = Deadline::new();

    info!("Scenario A: deadline +1ms, task sleeps 10ms");
    deadline.set(Some(Instant::now() + Duration::from_millis(1)));
    match deadline.run(sleeper(10)) {
        Ok(()) => info!("Task completed"),
        Err(e) => info!(
            error = %e,
            timeout = e.is_timeout(),
            temporary = e.is_temporary(),
            "Task abandoned"
        ),
    }

    info!("Scenario B: deadline +100ms, task sleeps 10ms");
    deadline.set_timeout(Duration::from_millis(100));
    deadline.run(sleeper(10))?;
    info!("Task completed");

    info!("Extending: deadline +20ms, moved to +200ms, task sleeps 50ms");
    deadline.set_timeout(Duration::from_millis(20));
    deadline.set_timeout(Duration::from_millis(200));
    deadline.run(sleeper(50))?;
    info!("Task completed under the extended deadline");

    info!("Clearing: deadline +5ms then cleared, task sleeps 50ms");
    deadline.set_timeout(Duration::from_millis(5));
    deadline.clear();
    deadline.run(sleeper(50))?;
    info!("Task completed with no deadline");

    let observer = deadline.done();
    deadline.set_timeout(Duration::from_millis(10));
    let expired = observer.wait_timeout(Duration::from_secs(1));
    info!(expired, "Observer saw the deadline through done()");

    Ok(())
}
