//! Deferred-execution scheduling
//!
//! Futures never notify observers synchronously; they hand a [`Task`] to a
//! [`Scheduler`] through a [`Handle`]. [`EventLoop`] is the FIFO scheduler
//! this crate ships with. Hosts that already own a task queue can implement
//! [`Scheduler`] themselves and wrap it with [`Handle::new`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::EventLoopConfig;
use crate::error::{FluxError, FluxResult};

/// A unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// The `schedule(task)` capability futures depend on.
///
/// Contract: `task` runs after the current synchronous call stack has
/// unwound, exactly once, in FIFO order relative to other scheduled tasks.
pub trait Scheduler {
    fn schedule(&self, task: Task);
}

/// Cloneable reference to the scheduler a future dispatches on
#[derive(Clone)]
pub struct Handle {
    scheduler: Rc<dyn Scheduler>,
}

impl Handle {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Defer `task` to a later turn
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.scheduler.schedule(Box::new(task));
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("scheduler", &"<scheduler>")
            .finish()
    }
}

/// Event loop statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStats {
    pub tasks_scheduled: usize,
    pub tasks_executed: usize,
    pub peak_queue_depth: usize,
    pub total_execution_time: Duration,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
            "Event Loop Statistics:\n\
             Tasks Scheduled: {}\n\
             Tasks Executed: {}\n\
             Peak Queue Depth: {}\n\
             Total Execution Time: {:?}",
            self.tasks_scheduled,
            self.tasks_executed,
            self.peak_queue_depth,
            self.total_execution_time
        )
    }
}

/// Queue state shared between the loop and every handle it gave out
#[derive(Default)]
struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
    stats: RefCell<SchedulerStats>,
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) {
        let depth = {
            let mut tasks = self.tasks.borrow_mut();
            tasks.push_back(task);
            tasks.len()
        };

        let mut stats = self.stats.borrow_mut();
        stats.tasks_scheduled += 1;
        stats.peak_queue_depth = stats.peak_queue_depth.max(depth);
    }
}

/// Single-threaded FIFO task queue driven by the host
pub struct EventLoop {
    queue: Rc<TaskQueue>,
    config: EventLoopConfig,
}

impl EventLoop {
    /// Create an event loop with no task budget
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    pub fn with_config(config: EventLoopConfig) -> Self {
        Self {
            queue: Rc::new(TaskQueue::default()),
            config,
        }
    }

    /// Handle for futures to schedule onto this loop
    pub fn handle(&self) -> Handle {
        let queue: Rc<dyn Scheduler> = self.queue.clone();
        Handle::new(queue)
    }

    /// Run the oldest queued task. Returns false when the queue was empty.
    pub fn run_once(&self) -> bool {
        // The task may schedule more work, so the queue must not stay borrowed.
        let task = self.queue.tasks.borrow_mut().pop_front();
        let Some(task) = task else {
            return false;
        };

        let start = Instant::now();
        task();
        let elapsed = start.elapsed();

        let mut stats = self.queue.stats.borrow_mut();
        stats.tasks_executed += 1;
        stats.total_execution_time += elapsed;
        true
    }

    /// Drain the queue, including tasks scheduled while draining.
    ///
    /// Returns the number of tasks run. Stops with
    /// [`FluxError::BudgetExhausted`] once the configured budget is spent
    /// and work is still queued.
    pub fn run(&self) -> FluxResult<usize> {
        let mut executed = 0;
        let result = loop {
            if let Some(budget) = self.config.task_budget {
                if executed >= budget && !self.is_idle() {
                    let pending = self.pending_tasks();
                    tracing::warn!(budget, pending, "task budget exhausted");
                    break Err(FluxError::BudgetExhausted { budget, pending });
                }
            }

            if !self.run_once() {
                break Ok(executed);
            }
            executed += 1;
        };

        tracing::trace!(executed, "event loop idle");
        result
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.tasks.borrow().is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.queue.stats.borrow().clone()
    }

    pub fn config(&self) -> &EventLoopConfig {
        &self.config
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // Queued tasks own futures that own handles back to this queue.
        let abandoned = std::mem::take(&mut *self.queue.tasks.borrow_mut());
        drop(abandoned);
    }
}
