//! Runtime system module
//!
//! Provides the future primitive and the event loop that defers its
//! observer notifications.

pub mod future;
pub(crate) mod resolution;
pub mod scheduler;

pub use future::{Future, FutureState};
pub use scheduler::{EventLoop, Handle, Scheduler, SchedulerStats, Task};
