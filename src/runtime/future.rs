//! The future state machine
//!
//! A [`Future`] starts pending and settles at most once, either fulfilled
//! with a value or rejected with a reason. Observers registered through
//! [`Future::then`] are notified through the future's [`Handle`], never on
//! the stack of the call that settled it.
//!
//! ```text
//!            fulfill(v)
//!   Pending ───────────▶ Fulfilled(v)
//!      │
//!      │ reject(e)
//!      ▼
//!   Rejected(e)
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::resolution;
use super::scheduler::Handle;
use crate::error::{FluxError, FluxResult};
use crate::value::{Completion, Function, Value};

static NEXT_FUTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Observable state of a future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureState {
    Pending,
    Fulfilled,
    Rejected,
}

impl FutureState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, FutureState::Pending)
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Pending => write!(f, "pending"),
            FutureState::Fulfilled => write!(f, "fulfilled"),
            FutureState::Rejected => write!(f, "rejected"),
        }
    }
}

/// One registration made by `then`, or by adopting another future.
///
/// Exactly one half runs. A missing half passes the outcome straight
/// through to `downstream`.
pub(crate) struct Observer {
    on_fulfilled: Option<Function>,
    on_rejected: Option<Function>,
    downstream: Future,
}

impl Observer {
    /// Mirror the source's outcome onto `target`
    pub(crate) fn adopt(target: Future) -> Self {
        Self {
            on_fulfilled: None,
            on_rejected: None,
            downstream: target,
        }
    }

    fn react(self, state: FutureState, value: Value) {
        let (handler, fulfilled) = match state {
            FutureState::Fulfilled => (self.on_fulfilled, true),
            FutureState::Rejected => (self.on_rejected, false),
            FutureState::Pending => return,
        };

        match handler {
            Some(handler) => match handler.call1(value) {
                Ok(result) => resolution::resolve(&self.downstream, result),
                Err(thrown) => self.downstream.reject(thrown),
            },
            None if fulfilled => self.downstream.fulfill(value),
            None => self.downstream.reject(value),
        }
    }
}

/// Pending carries the observers; the settled variants carry the value.
enum Slot {
    Pending(Vec<Observer>),
    Fulfilled(Value),
    Rejected(Value),
}

struct Inner {
    id: u64,
    slot: RefCell<Slot>,
    handle: Handle,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // A pending chain owns its downstream links; unlink them iteratively
        // so dropping a long chain does not recurse once per link.
        let mut stack = match self.slot.get_mut() {
            Slot::Pending(observers) => mem::take(observers),
            _ => return,
        };

        while let Some(Observer { downstream, .. }) = stack.pop() {
            if let Ok(mut inner) = Rc::try_unwrap(downstream.inner) {
                if let Slot::Pending(observers) = inner.slot.get_mut() {
                    stack.append(observers);
                }
            }
        }
    }
}

/// A value that becomes available later
#[derive(Clone)]
pub struct Future {
    inner: Rc<Inner>,
}

impl Future {
    fn pending(handle: &Handle) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: NEXT_FUTURE_ID.fetch_add(1, Ordering::Relaxed),
                slot: RefCell::new(Slot::Pending(Vec::new())),
                handle: handle.clone(),
            }),
        }
    }

    /// Create a future driven by `initializer(resolve, reject)`.
    ///
    /// The initializer runs synchronously. If it throws, the thrown value
    /// rejects the future. Fails only when `initializer` is not a function.
    pub fn new(handle: &Handle, initializer: impl Into<Value>) -> FluxResult<Future> {
        let initializer = match initializer.into() {
            Value::Function(f) => f,
            other => return Err(FluxError::not_callable("future initializer", other.type_name())),
        };

        Ok(Self::from_fn(handle, move |resolve, reject| {
            initializer
                .call(&Value::Undefined, &[resolve.into(), reject.into()])
                .map(|_| ())
        }))
    }

    /// Create a future from a Rust closure initializer.
    ///
    /// `resolve` and `reject` share one lock: only the first call of either
    /// has any effect.
    pub fn from_fn<F>(handle: &Handle, initializer: F) -> Future
    where
        F: FnOnce(Function, Function) -> Result<(), Value>,
    {
        let future = Future::pending(handle);
        let locked = Rc::new(Cell::new(false));
        let (resolve, reject) = future.capabilities(&locked);

        if let Err(thrown) = initializer(resolve, reject) {
            // Takes the same lock, so an earlier resolve still wins.
            if !locked.replace(true) {
                future.reject(thrown);
            }
        }
        future
    }

    /// A future resolved with `value`. Futures and thenables are adopted.
    pub fn resolved(handle: &Handle, value: impl Into<Value>) -> Future {
        let future = Future::pending(handle);
        resolution::resolve(&future, value.into());
        future
    }

    /// A future already rejected with `reason`
    pub fn rejected(handle: &Handle, reason: impl Into<Value>) -> Future {
        let future = Future::pending(handle);
        future.reject(reason.into());
        future
    }

    /// The `resolve`/`reject` pair handed to an initializer
    fn capabilities(&self, locked: &Rc<Cell<bool>>) -> (Function, Function) {
        let resolve = {
            let future = self.clone();
            let locked = Rc::clone(locked);
            Function::unary(move |value| {
                if !locked.replace(true) {
                    resolution::resolve(&future, value);
                }
                Ok(Value::Undefined)
            })
        };

        let reject = {
            let future = self.clone();
            let locked = Rc::clone(locked);
            Function::unary(move |reason| {
                if !locked.replace(true) {
                    future.reject(reason);
                }
                Ok(Value::Undefined)
            })
        };

        (resolve, reject)
    }

    /// Register handlers and return the downstream future they drive.
    ///
    /// Arguments that are not functions are ignored: a missing fulfilment
    /// handler passes the value through, a missing rejection handler passes
    /// the reason through.
    pub fn then(&self, on_fulfilled: impl Into<Value>, on_rejected: impl Into<Value>) -> Future {
        let downstream = Future::pending(&self.inner.handle);
        self.subscribe(Observer {
            on_fulfilled: callable(on_fulfilled.into()),
            on_rejected: callable(on_rejected.into()),
            downstream: downstream.clone(),
        });
        downstream
    }

    /// `then(Undefined, on_rejected)`
    pub fn catch(&self, on_rejected: impl Into<Value>) -> Future {
        self.then(Value::Undefined, on_rejected)
    }

    /// `then` with a Rust closure as the fulfilment handler
    pub fn then_fn<F>(&self, on_fulfilled: F) -> Future
    where
        F: Fn(Value) -> Completion + 'static,
    {
        self.then(Function::unary(on_fulfilled), Value::Undefined)
    }

    /// `catch` with a Rust closure as the rejection handler
    pub fn catch_fn<F>(&self, on_rejected: F) -> Future
    where
        F: Fn(Value) -> Completion + 'static,
    {
        self.catch(Function::unary(on_rejected))
    }

    /// Queue `observer` while pending, or schedule it on its own once settled.
    pub(crate) fn subscribe(&self, observer: Observer) {
        let settled = {
            let mut slot = self.inner.slot.borrow_mut();
            match &mut *slot {
                Slot::Pending(observers) => {
                    observers.push(observer);
                    return;
                }
                Slot::Fulfilled(value) => (FutureState::Fulfilled, value.clone()),
                Slot::Rejected(value) => (FutureState::Rejected, value.clone()),
            }
        };

        let (state, value) = settled;
        tracing::trace!(future = self.inner.id, %state, "late observer scheduled");
        self.inner.handle.schedule(move || observer.react(state, value));
    }

    pub(crate) fn fulfill(&self, value: Value) {
        self.settle(FutureState::Fulfilled, value);
    }

    pub(crate) fn reject(&self, reason: Value) {
        self.settle(FutureState::Rejected, reason);
    }

    fn settle(&self, state: FutureState, value: Value) {
        let observers = {
            let mut slot = self.inner.slot.borrow_mut();
            if !matches!(*slot, Slot::Pending(_)) {
                tracing::trace!(future = self.inner.id, %state, "ignored settlement of settled future");
                return;
            }

            let settled = match state {
                FutureState::Fulfilled => Slot::Fulfilled(value.clone()),
                _ => Slot::Rejected(value.clone()),
            };
            match mem::replace(&mut *slot, settled) {
                Slot::Pending(observers) => observers,
                _ => Vec::new(),
            }
        };

        tracing::trace!(
            future = self.inner.id,
            %state,
            observers = observers.len(),
            "settled"
        );

        if observers.is_empty() {
            return;
        }

        let id = self.inner.id;
        self.inner.handle.schedule(move || {
            tracing::trace!(future = id, observers = observers.len(), "dispatching");
            for observer in observers {
                observer.react(state, value.clone());
            }
        });
    }

    pub fn state(&self) -> FutureState {
        match &*self.inner.slot.borrow() {
            Slot::Pending(_) => FutureState::Pending,
            Slot::Fulfilled(_) => FutureState::Fulfilled,
            Slot::Rejected(_) => FutureState::Rejected,
        }
    }

    /// The fulfilment value or rejection reason, once settled
    pub fn value(&self) -> Option<Value> {
        match &*self.inner.slot.borrow() {
            Slot::Pending(_) => None,
            Slot::Fulfilled(value) | Slot::Rejected(value) => Some(value.clone()),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.state().is_settled()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Future) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

fn callable(value: Value) -> Option<Function> {
    match value {
        Value::Function(f) => Some(f),
        _ => None,
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Future");
        debug.field("id", &self.inner.id);
        // try_borrow: Debug may run while the slot is being settled.
        match self.inner.slot.try_borrow() {
            Ok(slot) => match &*slot {
                Slot::Pending(observers) => debug
                    .field("state", &FutureState::Pending)
                    .field("observers", &observers.len()),
                Slot::Fulfilled(value) => debug
                    .field("state", &FutureState::Fulfilled)
                    .field("value", value),
                Slot::Rejected(value) => debug
                    .field("state", &FutureState::Rejected)
                    .field("value", value),
            },
            Err(_) => debug.field("state", &"<settling>"),
        };
        debug.finish()
    }
}
