//! Scheduled polling of fixed contract addresses
//!
//! Tasks fire on an interval, gated by an optional daily time window
//! that also drives automatic enable/disable transitions.

pub mod scheduler;
pub mod task;
pub mod window;

pub use scheduler::TaskScheduler;
pub use task::{JsonTaskRepo, Task, TaskRepo};
