//! Dynamic values observed and produced by futures
//!
//! Futures settle with a [`Value`]. Handlers, initializers and thenable
//! accessors are native [`Function`]s that either return a value or throw
//! one (`Err`). Reference values (errors, objects, functions, futures) have
//! identity; primitives compare by value.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::Future;

/// Outcome of calling a function: `Ok` is a return, `Err` is a throw
pub type Completion = Result<Value, Value>;

type NativeFn = dyn Fn(&Value, &[Value]) -> Completion;

/// A dynamically typed value
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Error(Rc<ErrorValue>),
    Object(Object),
    Function(Function),
    Future(Future),
}

impl Value {
    /// Build an `Error` value
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue::new(ErrorKind::Error, message)))
    }

    /// Build a `TypeError` value
    pub fn type_error(message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue::new(ErrorKind::TypeError, message)))
    }

    /// Strict equality: primitives by value, reference values by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Future(a), Value::Future(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Read a property. Only objects carry properties; everything else
    /// reads as `Undefined`.
    pub fn get(&self, key: &str) -> Completion {
        match self {
            Value::Object(object) => object.get(key),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Future(_) => "future",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Error(e) => write!(f, "Error({})", e),
            Value::Object(o) => fmt::Debug::fmt(o, f),
            Value::Function(func) => fmt::Debug::fmt(func, f),
            Value::Future(future) => fmt::Debug::fmt(future, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Error(e) => write!(f, "{}", e),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(_) => write!(f, "[function]"),
            Value::Future(future) => write!(f, "[future #{}]", future.id()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(Rc::new(e))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Future> for Value {
    fn from(f: Future) -> Self {
        Value::Future(f)
    }
}

impl From<Option<Function>> for Value {
    fn from(f: Option<Function>) -> Self {
        f.map_or(Value::Undefined, Value::Function)
    }
}

/// Error classes a thrown error value can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Error => write!(f, "Error"),
            ErrorKind::TypeError => write!(f, "TypeError"),
        }
    }
}

/// Payload of an `Error` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorValue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A native callable value
#[derive(Clone)]
pub struct Function {
    body: Rc<NativeFn>,
}

impl Function {
    /// Wrap a closure receiving `this` and the argument list
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Completion + 'static,
    {
        Self { body: Rc::new(body) }
    }

    /// Wrap a closure that only looks at its first argument
    pub fn unary<F>(body: F) -> Self
    where
        F: Fn(Value) -> Completion + 'static,
    {
        Self::new(move |_this, args| body(args.first().cloned().unwrap_or(Value::Undefined)))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
        (self.body)(this, args)
    }

    /// Call with `this = Undefined` and a single argument
    pub fn call1(&self, arg: Value) -> Completion {
        self.call(&Value::Undefined, &[arg])
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.body) as *const ())
    }
}

/// A property slot: plain data, or a getter that runs on every read
#[derive(Clone, Debug)]
pub enum Property {
    Data(Value),
    Getter(Function),
}

/// A shared object with ordered properties
#[derive(Clone, Default)]
pub struct Object {
    properties: Rc<RefCell<IndexMap<String, Property>>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a data property, replacing any previous slot
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Data(value.into()));
    }

    /// Install a getter, replacing any previous slot
    pub fn define_getter(&self, key: impl Into<String>, getter: Function) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Getter(getter));
    }

    /// Read a property. A getter runs with `this` bound to the object and
    /// may throw. Missing keys read as `Undefined`.
    pub fn get(&self, key: &str) -> Completion {
        // Clone the slot out first: a getter may mutate this object.
        let slot = self.properties.borrow().get(key).cloned();
        match slot {
            None => Ok(Value::Undefined),
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Getter(getter)) => getter.call(&Value::Object(self.clone()), &[]),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_same_value_primitives() {
        assert!(Value::from(1).same_value(&Value::Number(1.0)));
        assert!(Value::from("a").same_value(&Value::from("a".to_string())));
        assert!(!Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(!Value::Null.same_value(&Value::Undefined));
    }

    #[test]
    fn test_same_value_reference_identity() {
        let a = Object::new();
        let b = Object::new();
        assert!(Value::from(a.clone()).same_value(&Value::from(a.clone())));
        assert!(!Value::from(a).same_value(&Value::from(b)));

        let e1 = Value::error("x");
        let e2 = Value::error("x");
        assert!(e1.same_value(&e1.clone()));
        assert!(!e1.same_value(&e2));
    }

    #[test]
    fn test_object_getter_runs_each_read() {
        let reads = Rc::new(Cell::new(0));
        let obj = Object::new();
        let counter = Rc::clone(&reads);
        obj.define_getter(
            "then",
            Function::new(move |_, _| {
                counter.set(counter.get() + 1);
                Ok(Value::Null)
            }),
        );

        assert_eq!(obj.get("then").unwrap(), Value::Null);
        assert_eq!(obj.get("then").unwrap(), Value::Null);
        assert_eq!(reads.get(), 2);
    }

    #[test]
    fn test_object_getter_can_throw() {
        let obj = Object::new();
        obj.define_getter("then", Function::new(|_, _| Err(Value::from("denied"))));
        assert_eq!(obj.get("then").unwrap_err(), Value::from("denied"));
        assert_eq!(obj.get("missing").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_non_objects_have_no_properties() {
        let f = Function::unary(|v| Ok(v));
        assert_eq!(Value::from(f).get("then").unwrap(), Value::Undefined);
        assert_eq!(Value::from(3).get("then").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_error_display() {
        let e = Value::type_error("Chaining cycle detected");
        assert_eq!(e.to_string(), "TypeError: Chaining cycle detected");
        assert_eq!(e.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    }
}
