//! Resolution procedure: how a produced value settles a target future
//!
//! - the target itself: rejected with a `TypeError` (chaining cycle)
//! - another future: adopted through an observer on it
//! - an object whose `then` reads as a function: `then` is called with a
//!   fresh single-use callback pair and the outcome is fed back in
//! - anything else: fulfils the target
//!
//! Thenables that call back synchronously are handled by a work-list rather
//! than by recursion, so the stack stays flat however deep they nest.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::future::{Future, Observer};
use crate::value::{Function, Value};

/// Resolve `target` with `value`
pub(crate) fn resolve(target: &Future, value: Value) {
    let resolution = Rc::new(Resolution {
        target: target.clone(),
        queue: RefCell::new(VecDeque::new()),
        draining: Cell::new(false),
    });
    resolution.feed(value);
}

/// One resolution attempt for one target
struct Resolution {
    target: Future,
    queue: RefCell<VecDeque<Value>>,
    draining: Cell<bool>,
}

impl Resolution {
    /// Queue a value and drain unless a drain is already on the stack.
    fn feed(self: &Rc<Self>, value: Value) {
        self.queue.borrow_mut().push_back(value);
        if self.draining.replace(true) {
            return;
        }

        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(value) => self.step(value),
                None => break,
            }
        }
        self.draining.set(false);
    }

    fn step(self: &Rc<Self>, value: Value) {
        let target = &self.target;

        if let Value::Future(future) = &value {
            if future.ptr_eq(target) {
                tracing::debug!(future = target.id(), "chaining cycle detected");
                target.reject(Value::type_error("Chaining cycle detected for future"));
            } else {
                tracing::trace!(future = target.id(), source = future.id(), "adopting future");
                future.subscribe(Observer::adopt(target.clone()));
            }
            return;
        }

        if !matches!(value, Value::Object(_) | Value::Function(_)) {
            target.fulfill(value);
            return;
        }

        match value.get("then") {
            Err(thrown) => {
                tracing::debug!(future = target.id(), "reading then threw");
                target.reject(thrown);
            }
            Ok(Value::Function(then)) => self.call_then(value, then),
            Ok(_) => target.fulfill(value),
        }
    }

    /// Call a thenable's `then` with a callback pair where only the first
    /// call of either callback counts.
    fn call_then(self: &Rc<Self>, thenable: Value, then: Function) {
        let invoked = Rc::new(Cell::new(false));

        let on_fulfill = {
            let resolution = Rc::clone(self);
            let invoked = Rc::clone(&invoked);
            let thenable = thenable.clone();
            Function::unary(move |value| {
                if invoked.replace(true) {
                    return Ok(Value::Undefined);
                }
                if value.same_value(&thenable) {
                    tracing::debug!(future = resolution.target.id(), "thenable resolved to itself");
                    resolution
                        .target
                        .reject(Value::type_error("Thenable resolved to itself"));
                } else {
                    resolution.feed(value);
                }
                Ok(Value::Undefined)
            })
        };

        let on_reject = {
            let target = self.target.clone();
            let invoked = Rc::clone(&invoked);
            Function::unary(move |reason| {
                if !invoked.replace(true) {
                    target.reject(reason);
                }
                Ok(Value::Undefined)
            })
        };

        if let Err(thrown) = then.call(&thenable, &[on_fulfill.into(), on_reject.into()]) {
            if invoked.replace(true) {
                tracing::trace!(future = self.target.id(), "discarded throw after thenable settled");
            } else {
                tracing::debug!(future = self.target.id(), "calling then threw");
                self.target.reject(thrown);
            }
        }
    }
}
