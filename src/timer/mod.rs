/*!
 * Timers
 *
 * Explicit alarm abstraction: resettable one-shot timers whose callbacks run
 * on a dedicated service thread rather than on the caller's.
 *
 * # Example
 *
 * ```
 * use deadline_kit::timer::{StopOutcome, Timer, TimerService};
 * use std::time::Duration;
 *
 * let service = TimerService::new("doc-timer").unwrap();
 * let timer = Timer::new(&service, || println!("expired"));
 *
 * timer.reset(Duration::from_secs(60));
 * assert_eq!(timer.stop(), StopOutcome::Cancelled);
 * ```
 */

mod entry;
mod service;

pub use service::{StopOutcome, Timer, TimerService};
