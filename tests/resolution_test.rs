//! Tests for thenable unwrapping and the resolution procedure

use flux_future::scenarios::{nested_thenable, thenable};
use flux_future::{ErrorKind, EventLoop, Function, Future, FutureState, Object, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn on_fulfill(args: &[Value]) -> Function {
    args[0].as_function().cloned().expect("on_fulfill callback")
}

fn on_reject(args: &[Value]) -> Function {
    args[1].as_function().cloned().expect("on_reject callback")
}

fn is_type_error(value: Option<Value>) -> bool {
    value
        .as_ref()
        .and_then(Value::as_error)
        .map_or(false, |e| e.kind == ErrorKind::TypeError)
}

#[test]
fn test_thenable_fulfils_target() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| on_fulfill(args).call1(Value::from("ok"))));
    let future = Future::resolved(&event_loop.handle(), value);

    assert_eq!(future.value(), Some(Value::from("ok")));
}

#[test]
fn test_thenable_rejects_target() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| on_reject(args).call1(Value::from("nope"))));
    let future = Future::resolved(&event_loop.handle(), value);

    assert_eq!(future.state(), FutureState::Rejected);
    assert_eq!(future.value(), Some(Value::from("nope")));
}

#[test]
fn test_double_fulfil_only_first_counts() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| {
        on_fulfill(args).call1(Value::from("v1"))?;
        on_fulfill(args).call1(Value::from("v2"))?;
        Ok(Value::Undefined)
    }));

    let future = Future::resolved(&event_loop.handle(), value);
    assert_eq!(future.value(), Some(Value::from("v1")));
}

#[test]
fn test_reject_after_fulfil_ignored() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| {
        on_fulfill(args).call1(Value::from("v1"))?;
        on_reject(args).call1(Value::from("e"))?;
        Ok(Value::Undefined)
    }));

    let future = Future::resolved(&event_loop.handle(), value);
    assert_eq!(future.state(), FutureState::Fulfilled);
    assert_eq!(future.value(), Some(Value::from("v1")));
}

#[test]
fn test_fulfil_after_reject_ignored() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| {
        on_reject(args).call1(Value::from("e"))?;
        on_fulfill(args).call1(Value::from("v1"))?;
        Ok(Value::Undefined)
    }));

    let future = Future::resolved(&event_loop.handle(), value);
    assert_eq!(future.state(), FutureState::Rejected);
    assert_eq!(future.value(), Some(Value::from("e")));
}

#[test]
fn test_getter_throw_rejects() {
    let event_loop = EventLoop::new();
    let object = Object::new();
    object.define_getter("then", Function::new(|_, _| Err(Value::from("getter exploded"))));

    let future = Future::resolved(&event_loop.handle(), object);
    assert_eq!(future.state(), FutureState::Rejected);
    assert_eq!(future.value(), Some(Value::from("getter exploded")));
}

#[test]
fn test_then_read_exactly_once() {
    let event_loop = EventLoop::new();
    let reads = Rc::new(Cell::new(0));
    let counter = Rc::clone(&reads);

    let object = Object::new();
    object.define_getter(
        "then",
        Function::new(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::from(Function::new(|_, args| on_fulfill(args).call1(Value::from(1)))))
        }),
    );

    let future = Future::resolved(&event_loop.handle(), object);
    assert_eq!(future.value(), Some(Value::from(1)));
    assert_eq!(reads.get(), 1);
}

#[test]
fn test_then_throw_before_callback_rejects() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, _| Err(Value::error("then failed"))));
    let future = Future::resolved(&event_loop.handle(), value);

    assert_eq!(future.state(), FutureState::Rejected);
    assert_eq!(future.value().unwrap().as_error().unwrap().message, "then failed");
}

#[test]
fn test_then_throw_after_callback_is_swallowed() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| {
        on_fulfill(args).call1(Value::from("settled"))?;
        Err(Value::error("thrown afterwards"))
    }));
    let future = Future::resolved(&event_loop.handle(), value);

    assert_eq!(future.state(), FutureState::Fulfilled);
    assert_eq!(future.value(), Some(Value::from("settled")));
}

#[test]
fn test_then_throw_after_reject_is_swallowed() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, args| {
        on_reject(args).call1(Value::from("first"))?;
        Err(Value::from("second"))
    }));
    let future = Future::resolved(&event_loop.handle(), value);

    assert_eq!(future.value(), Some(Value::from("first")));
}

#[test]
fn test_non_callable_then_is_plain_value() {
    let event_loop = EventLoop::new();
    let object = Object::new();
    object.set("then", "just a string");

    let future = Future::resolved(&event_loop.handle(), object.clone());
    assert_eq!(future.value(), Some(Value::Object(object)));
}

#[test]
fn test_functions_are_not_thenables() {
    let event_loop = EventLoop::new();
    let f = Function::unary(|v| Ok(v));
    let future = Future::resolved(&event_loop.handle(), f.clone());

    assert_eq!(future.value(), Some(Value::Function(f)));
}

#[test]
fn test_primitives_fulfil_directly() {
    let event_loop = EventLoop::new();
    for value in [Value::Undefined, Value::Null, Value::from(true), Value::from(1.5), Value::from("s")] {
        let future = Future::resolved(&event_loop.handle(), value.clone());
        assert_eq!(future.value(), Some(value));
    }
}

#[test]
fn test_thenable_resolving_to_itself_rejects() {
    let event_loop = EventLoop::new();
    let object = Object::new();
    object.set(
        "then",
        Function::new(|this, args| on_fulfill(args).call1(this.clone())),
    );

    let future = Future::resolved(&event_loop.handle(), object);
    assert_eq!(future.state(), FutureState::Rejected);
    assert!(is_type_error(future.value()));
}

#[test]
fn test_thenable_resolving_to_other_thenable_unwraps() {
    let event_loop = EventLoop::new();
    let inner = thenable(Function::new(|_, args| on_fulfill(args).call1(Value::from("deep"))));
    let outer = thenable(Function::new(move |_, args| on_fulfill(args).call1(inner.clone())));

    let future = Future::resolved(&event_loop.handle(), outer);
    assert_eq!(future.value(), Some(Value::from("deep")));
}

#[test]
fn test_nested_thenables_fifty_levels() {
    let event_loop = EventLoop::new();
    let future = Future::resolved(&event_loop.handle(), nested_thenable(50, Value::from("innermost")));

    assert_eq!(future.value(), Some(Value::from("innermost")));
}

#[test]
fn test_nested_thenables_do_not_grow_the_stack() {
    let event_loop = EventLoop::new();
    let future = Future::resolved(&event_loop.handle(), nested_thenable(100_000, Value::from(0)));

    assert_eq!(future.state(), FutureState::Fulfilled);
    assert_eq!(future.value(), Some(Value::from(0)));
}

#[test]
fn test_thenable_resolving_to_future_adopts_it() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let inner = Future::resolved(&handle, "from future");
    let value = thenable(Function::new(move |_, args| on_fulfill(args).call1(Value::Future(inner.clone()))));

    let future = Future::resolved(&handle, value);
    assert!(future.is_pending());
    event_loop.run().unwrap();
    assert_eq!(future.value(), Some(Value::from("from future")));
}

#[test]
fn test_asynchronous_thenable_settles_later() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let value = thenable(Function::new(move |_, args| {
        let callback = on_fulfill(args);
        handle.schedule(move || {
            let _ = callback.call1(nested_thenable(3, Value::from("async")));
        });
        Ok(Value::Undefined)
    }));

    let future = Future::resolved(&event_loop.handle(), value);
    assert!(future.is_pending());
    event_loop.run().unwrap();
    assert_eq!(future.value(), Some(Value::from("async")));
}

#[test]
fn test_stashed_callbacks_called_again_later_are_ignored() {
    let event_loop = EventLoop::new();
    let stash: Rc<RefCell<Vec<Function>>> = Rc::new(RefCell::new(Vec::new()));
    let keep = Rc::clone(&stash);

    let value = thenable(Function::new(move |_, args| {
        keep.borrow_mut().push(on_fulfill(args));
        keep.borrow_mut().push(on_reject(args));
        on_fulfill(args).call1(Value::from("first"))
    }));
    let future = Future::resolved(&event_loop.handle(), value);

    for callback in stash.borrow().iter() {
        callback.call1(Value::from("again")).unwrap();
    }
    assert_eq!(future.value(), Some(Value::from("first")));
}

#[test]
fn test_thenable_that_never_calls_back_stays_pending() {
    let event_loop = EventLoop::new();
    let value = thenable(Function::new(|_, _| Ok(Value::Undefined)));
    let future = Future::resolved(&event_loop.handle(), value);

    event_loop.run().unwrap();
    assert!(future.is_pending());
}

#[test]
fn test_handler_returning_thenable_is_unwrapped() {
    let event_loop = EventLoop::new();
    let downstream = Future::resolved(&event_loop.handle(), 2).then_fn(|v| {
        let doubled = Value::from(v.as_number().unwrap() * 2.0);
        Ok(thenable(Function::new(move |_, args| on_fulfill(args).call1(doubled.clone()))))
    });

    event_loop.run().unwrap();
    assert_eq!(downstream.value(), Some(Value::from(4)));
}

#[test]
fn test_handler_returning_throwing_thenable_rejects() {
    let event_loop = EventLoop::new();
    let downstream = Future::resolved(&event_loop.handle(), 2)
        .then_fn(|_| Ok(thenable(Function::new(|_, _| Err(Value::from("bad thenable"))))));

    event_loop.run().unwrap();
    assert_eq!(downstream.state(), FutureState::Rejected);
    assert_eq!(downstream.value(), Some(Value::from("bad thenable")));
}
