//! Built-in behavioural scenarios
//!
//! Each scenario drives a fresh [`EventLoop`] through one settlement or
//! chaining rule and checks what the observers saw. The CLI runs them; the
//! thenable builders are also handy for host tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::{FluxError, FluxResult};
use crate::runtime::{EventLoop, Future, FutureState, SchedulerStats};
use crate::value::{ErrorKind, Function, Object, Value};

/// Pass (`Ok`) or fail (`Err`), each with a one-line detail
pub type Verdict = Result<String, String>;

type ScenarioBody = fn(&EventLoop, &RuntimeConfig) -> FluxResult<Verdict>;

/// A named, self-checking scenario
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    body: ScenarioBody,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

/// Result of running one scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
    pub stats: SchedulerStats,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "chain-increment",
        description: "resolve(42).then(v + 1) delivers 43 on a later turn",
        body: chain_increment,
    },
    Scenario {
        name: "initializer-throws",
        description: "a throwing initializer rejects, observable only through catch",
        body: initializer_throws,
    },
    Scenario {
        name: "settle-once",
        description: "later resolve/reject calls after the first are ignored",
        body: settle_once,
    },
    Scenario {
        name: "thenable-double-call",
        description: "a thenable calling back twice only counts the first call",
        body: thenable_double_call,
    },
    Scenario {
        name: "self-resolution",
        description: "a handler returning its own downstream future rejects with TypeError",
        body: self_resolution,
    },
    Scenario {
        name: "deep-thenable",
        description: "thenables nested `depth` levels fulfil with the innermost value",
        body: deep_thenable,
    },
    Scenario {
        name: "observer-ordering",
        description: "observers fire in registration order after the settling call returns",
        body: observer_ordering,
    },
    Scenario {
        name: "rejection-propagation",
        description: "a rejection skips links without handlers and arrives unchanged",
        body: rejection_propagation,
    },
    Scenario {
        name: "future-adoption",
        description: "a handler returning a pending future settles the chain when it does",
        body: future_adoption,
    },
];

/// All built-in scenarios, in run order
pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

/// Look a scenario up by name
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

impl Scenario {
    /// Run on a fresh event loop built from `config`
    pub fn run(&self, config: &RuntimeConfig) -> FluxResult<ScenarioReport> {
        let event_loop = EventLoop::with_config(config.event_loop.clone());
        let verdict = (self.body)(&event_loop, config)?;
        let (passed, detail) = match verdict {
            Ok(detail) => (true, detail),
            Err(detail) => (false, detail),
        };

        Ok(ScenarioReport {
            name: self.name,
            passed,
            detail,
            stats: event_loop.stats(),
        })
    }
}

/// An object whose `then` property is `then`
pub fn thenable(then: Function) -> Value {
    let object = Object::new();
    object.set("then", then);
    Value::Object(object)
}

/// A thenable that resolves, synchronously, to a thenable one level
/// shallower, until `depth` reaches zero and `innermost` is delivered.
///
/// Levels are built on demand so no deep structure is ever held.
pub fn nested_thenable(depth: usize, innermost: Value) -> Value {
    if depth == 0 {
        return innermost;
    }

    thenable(Function::new(move |_this, args| match args.first() {
        Some(Value::Function(on_fulfill)) => {
            on_fulfill.call1(nested_thenable(depth - 1, innermost.clone()))
        }
        _ => Ok(Value::Undefined),
    }))
}

/// Record every value a handler sees
fn recorder(log: &Rc<RefCell<Vec<Value>>>) -> Function {
    let log = Rc::clone(log);
    Function::unary(move |value| {
        log.borrow_mut().push(value.clone());
        Ok(value)
    })
}

fn expect_single(log: &Rc<RefCell<Vec<Value>>>, expected: &Value) -> Verdict {
    let seen = log.borrow();
    match seen.as_slice() {
        [only] if only.same_value(expected) => Ok(format!("observed {}", only)),
        other => Err(format!("expected [{}], observed {:?}", expected, other)),
    }
}

fn chain_increment(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let log = Rc::new(RefCell::new(Vec::new()));
    Future::from_fn(&event_loop.handle(), |resolve, _reject| {
        resolve.call1(Value::from(42)).map(|_| ())
    })
    .then_fn(|v| Ok(Value::from(v.as_number().unwrap_or(f64::NAN) + 1.0)))
    .then(recorder(&log), Value::Undefined);

    if !log.borrow().is_empty() {
        return Ok(Err("handler ran synchronously".to_string()));
    }
    event_loop.run()?;
    Ok(expect_single(&log, &Value::from(43)))
}

fn initializer_throws(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let future = Future::from_fn(&event_loop.handle(), |_resolve, _reject| {
        Err(Value::error("boom"))
    });
    if future.state() != FutureState::Rejected {
        return Ok(Err(format!("initializer throw left the future {}", future.state())));
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    future.catch(recorder(&log));
    event_loop.run()?;

    let seen = log.borrow();
    match seen.first().and_then(Value::as_error) {
        Some(err) if err.message == "boom" => Ok(Ok(format!("caught {}", err))),
        _ => Ok(Err(format!("catch observed {:?}", *seen))),
    }
}

fn settle_once(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let future = Future::from_fn(&event_loop.handle(), |resolve, reject| {
        resolve.call1(Value::from(1))?;
        resolve.call1(Value::from(2))?;
        reject.call1(Value::from(3))?;
        Ok(())
    });

    let log = Rc::new(RefCell::new(Vec::new()));
    future.then(recorder(&log), recorder(&log));
    event_loop.run()?;

    if future.state() != FutureState::Fulfilled {
        return Ok(Err(format!("future ended {}", future.state())));
    }
    Ok(expect_single(&log, &Value::from(1)))
}

fn thenable_double_call(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let value = thenable(Function::new(|_this, args| {
        if let [Value::Function(on_fulfill), Value::Function(on_reject)] = args {
            on_fulfill.call1(Value::from("v1"))?;
            on_fulfill.call1(Value::from("v2"))?;
            on_reject.call1(Value::error("late"))?;
        }
        Ok(Value::Undefined)
    }));

    let log = Rc::new(RefCell::new(Vec::new()));
    Future::resolved(&event_loop.handle(), value).then(recorder(&log), recorder(&log));
    event_loop.run()?;
    Ok(expect_single(&log, &Value::from("v1")))
}

fn self_resolution(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let slot: Rc<RefCell<Option<Future>>> = Rc::new(RefCell::new(None));
    let own = Rc::clone(&slot);
    let downstream = Future::resolved(&event_loop.handle(), Value::Null).then_fn(move |_| {
        Ok(own.borrow().clone().map_or(Value::Undefined, Value::Future))
    });
    *slot.borrow_mut() = Some(downstream.clone());

    event_loop.run()?;

    match downstream.value() {
        Some(Value::Error(err)) if err.kind == ErrorKind::TypeError => {
            Ok(Ok(format!("rejected with {}", err)))
        }
        other => Ok(Err(format!(
            "expected a TypeError rejection, future is {} with {:?}",
            downstream.state(),
            other
        ))),
    }
}

fn deep_thenable(event_loop: &EventLoop, config: &RuntimeConfig) -> FluxResult<Verdict> {
    let depth = config.scenarios.depth;
    let future = Future::resolved(
        &event_loop.handle(),
        nested_thenable(depth, Value::from("innermost")),
    );
    event_loop.run()?;

    match future.value() {
        Some(v) if v.same_value(&Value::from("innermost")) && future.state() == FutureState::Fulfilled => {
            Ok(Ok(format!("unwrapped {} levels", depth)))
        }
        other => Ok(Err(format!("after {} levels: {:?}", depth, other))),
    }
}

fn observer_ordering(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let order = Rc::new(RefCell::new(Vec::new()));
    let (resolve_slot, future) = {
        let slot: Rc<RefCell<Option<Function>>> = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&slot);
        let future = Future::from_fn(&event_loop.handle(), move |resolve, _reject| {
            *keep.borrow_mut() = Some(resolve);
            Ok(())
        });
        (slot, future)
    };

    for name in ["a", "b", "c"] {
        let order = Rc::clone(&order);
        future.then_fn(move |v| {
            order.borrow_mut().push(name);
            Ok(v)
        });
    }

    let resolve = resolve_slot.borrow_mut().take();
    let Some(resolve) = resolve else {
        return Err(FluxError::InvalidArgument("initializer did not run".to_string()));
    };
    let _ = resolve.call1(Value::Null);
    if !order.borrow().is_empty() {
        return Ok(Err("observers ran inside resolve".to_string()));
    }

    event_loop.run()?;
    let seen = order.borrow().clone();
    if seen == ["a", "b", "c"] {
        Ok(Ok("a, b, c".to_string()))
    } else {
        Ok(Err(format!("fired as {:?}", seen)))
    }
}

fn rejection_propagation(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let reason = Value::error("unhandled here");
    let log = Rc::new(RefCell::new(Vec::new()));

    Future::rejected(&event_loop.handle(), reason.clone())
        .then(Value::Null, Value::Null)
        .then(Value::Undefined, recorder(&log));
    event_loop.run()?;
    Ok(expect_single(&log, &reason))
}

fn future_adoption(event_loop: &EventLoop, _config: &RuntimeConfig) -> FluxResult<Verdict> {
    let handle = event_loop.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let inner_handle = handle.clone();
    Future::resolved(&handle, "outer")
        .then_fn(move |_| {
            let later = inner_handle.clone();
            Ok(Value::Future(Future::from_fn(&inner_handle, move |resolve, _reject| {
                later.schedule(move || {
                    let _ = resolve.call1(Value::from("adopted"));
                });
                Ok(())
            })))
        })
        .then(recorder(&log), recorder(&log));

    event_loop.run()?;
    Ok(expect_single(&log, &Value::from("adopted")))
}
