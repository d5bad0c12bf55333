//! Flux Future Runtime
//!
//! This crate provides the deferred-value primitive of the Flux runtime:
//! single-threaded futures that settle once, notify observers on a later
//! turn of an event loop, and unwrap nested futures and thenables.
//!
//! ```
//! use flux_future::{EventLoop, Future, Value};
//!
//! let event_loop = EventLoop::new();
//! let result = Future::from_fn(&event_loop.handle(), |resolve, _reject| {
//!     resolve.call1(Value::from(42)).map(|_| ())
//! })
//! .then_fn(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) + 1.0)));
//!
//! assert!(result.is_pending());
//! event_loop.run().unwrap();
//! assert_eq!(result.value(), Some(Value::from(43)));
//! ```

pub mod error;
pub mod value;
pub mod runtime;
pub mod config;
pub mod scenarios;
pub mod cli;

// Re-export core types for convenience
pub use error::*;
pub use value::{Completion, ErrorKind, ErrorValue, Function, Object, Property, Value};
pub use runtime::{EventLoop, Future, FutureState, Handle, Scheduler, SchedulerStats};
pub use config::RuntimeConfig;
