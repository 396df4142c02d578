use std::fmt;

use burrow_collate::{Map, Value};

/// Error raised by a user map function.
///
/// Absorbed per document by the indexer: the failing document contributes
/// zero rows and the index pass continues.
#[derive(Debug)]
pub struct MapError(pub String);

impl MapError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map function failed: {}", self.0)
    }
}

impl std::error::Error for MapError {}

/// Collects the emissions of a single map invocation, in order.
pub struct Emitter {
    rows: Vec<(Value, Value)>,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn emit(&mut self, key: Value, value: Value) {
        self.rows.push((key, value));
    }

    pub(crate) fn into_rows(self) -> Vec<(Value, Value)> {
        self.rows
    }
}

/// User map function over one document's content.
///
/// The document carries injected `_id` and `_rev` fields alongside its own
/// properties. Implemented by closures or trait objects; the indexer holds
/// one instance per view and invokes it synchronously.
pub trait Mapper: Send + Sync {
    fn map(&self, doc: &Map<String, Value>, emitter: &mut Emitter) -> Result<(), MapError>;
}

impl<F> Mapper for F
where
    F: Fn(&Map<String, Value>, &mut Emitter) -> Result<(), MapError> + Send + Sync,
{
    fn map(&self, doc: &Map<String, Value>, emitter: &mut Emitter) -> Result<(), MapError> {
        self(doc, emitter)
    }
}

/// User reduce function.
///
/// `rereduce` is false when `values` are raw emissions and true when they
/// are prior reduce outputs; a correct reducer is associative enough that
/// both paths agree.
pub trait Reducer: Send + Sync {
    fn reduce(&self, keys: &[Value], values: &[Value], rereduce: bool) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(&[Value], &[Value], bool) -> Value + Send + Sync,
{
    fn reduce(&self, keys: &[Value], values: &[Value], rereduce: bool) -> Value {
        self(keys, values, rereduce)
    }
}

/// Sum-style reduce helper: the arithmetic sum of the numeric values,
/// ignoring non-numeric ones, as a floating-point number.
pub fn total_values(values: &[Value]) -> Value {
    let sum: f64 = values.iter().filter_map(Value::as_f64).sum();
    Value::from(sum)
}
