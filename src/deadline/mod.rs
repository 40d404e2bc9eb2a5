/*!
 * Deadlines
 *
 * Resettable deadline controller and the one-shot `run_until` helper.
 */

mod builder;
mod controller;

pub use builder::DeadlineBuilder;
pub use controller::{run_until, Deadline};
