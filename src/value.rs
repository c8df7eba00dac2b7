use std::rc::Rc;

use crate::coordinator::AsyncGenerator;
use crate::promise::PromiseRef;

static UNIQUE_ID_SEED: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);

pub fn generate_unique_id() -> usize {
    UNIQUE_ID_SEED.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

/// The opaque payload moved between caller, coordinator and body.
///
/// The coordinator never interprets values except to detect awaitables
/// (`Value::Promise`) and to validate handles on the dispatch surface
/// (`Value::AsyncGenerator`).
#[derive(Clone)]
pub enum Value {
    Undefined,
    Boolean(bool),
    Number(f64),
    String(String),
    Promise(PromiseRef<Value>),
    AsyncGenerator(AsyncGenerator),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Promise(_) => "promise",
            Value::AsyncGenerator(_) => "async generator",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Reference variants compare by identity.
            (Value::Promise(a), Value::Promise(b)) => Rc::ptr_eq(a, b),
            (Value::AsyncGenerator(a), Value::AsyncGenerator(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Promise(p) => match p.try_borrow() {
                Ok(p) => write!(f, "Promise(id={}, {})", p.id(), p.state_name()),
                Err(_) => write!(f, "Promise(<borrowed>)"),
            },
            Value::AsyncGenerator(g) => write!(f, "{g:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// The fulfillment payload of every request settlement: one step of the
/// iteration protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct IterResult {
    pub value: Value,
    pub done: bool,
}

impl IterResult {
    /// A step produced by a yield: `{ value, done: false }`.
    pub fn next(value: Value) -> Self {
        IterResult { value, done: false }
    }

    /// A terminal step: `{ value, done: true }`.
    pub fn done(value: Value) -> Self {
        IterResult { value, done: true }
    }
}
