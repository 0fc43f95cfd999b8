//! Typed handler table: the in-process [`Dispatcher`].
//!
//! Business handlers are registered under `(target, operation)` with their
//! own parameter type `P` and row type `R`:
//!
//! ```rust
//! use fluxport_core::{Dispatcher, ParamShape, ParamShaped};
//! use fluxport_pipeline::HandlerTable;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Query { prefix: String }
//! impl ParamShaped for Query { const SHAPE: &'static str = "Query"; }
//!
//! #[derive(Serialize)]
//! struct Row { name: String }
//!
//! let mut table = HandlerTable::new();
//! table.register("names", "by_prefix", |q: Query| {
//!     Ok(vec![Row { name: format!("{}-1", q.prefix) }])
//! });
//!
//! let rows = table
//!     .invoke("names", "by_prefix", &ParamShape::of::<Query>(), &serde_json::json!({"prefix": "a"}))
//!     .unwrap();
//! assert_eq!(rows.columns, vec!["name"]);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{Map, Value};

use fluxport_core::{DispatchError, Dispatcher, ParamShape, ParamShaped, RowSet};

type Invoke = dyn Fn(&Value) -> Result<RowSet, DispatchError> + Send + Sync;
type Check = dyn Fn(&Value) -> Result<(), DispatchError> + Send + Sync;

struct Entry {
    shape: ParamShape,
    check: Box<Check>,
    call: Box<Invoke>,
}

/// `(target, operation)` → typed handler.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<(String, String), Entry>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as `target.operation`, replacing any previous one.
    pub fn register<P, R, F>(
        &mut self,
        target: impl Into<String>,
        operation: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        P: ParamShaped,
        R: Serialize + 'static,
        F: Fn(P) -> anyhow::Result<Vec<R>> + Send + Sync + 'static,
    {
        let target = target.into();
        let operation = operation.into();
        let (t, o) = (target.clone(), operation.clone());
        let check = |raw: &Value| decode::<P>(raw).map(drop);
        let call = move |raw: &Value| -> Result<RowSet, DispatchError> {
            let params: P = decode(raw)?;
            let records = catch_unwind(AssertUnwindSafe(|| handler(params)))
                .map_err(|payload| {
                    DispatchError::Invocation(format!("handler panicked: {}", panic_message(&*payload)))
                })?
                .map_err(|e| DispatchError::Invocation(format!("{e:#}")))?;
            RowSet::from_records(&records).map_err(|source| DispatchError::Rows {
                target: t.clone(),
                operation: o.clone(),
                source,
            })
        };

        let replaced = self
            .handlers
            .insert(
                (target.clone(), operation.clone()),
                Entry {
                    shape: ParamShape::of::<P>(),
                    check: Box::new(check),
                    call: Box::new(call),
                },
            )
            .is_some();
        if replaced {
            tracing::debug!(%target, %operation, "handler replaced");
        }
        self
    }

    pub fn contains(&self, target: &str, operation: &str) -> bool {
        self.handlers
            .contains_key(&(target.to_owned(), operation.to_owned()))
    }

    /// Registered `(target, operation, shape)` triples, sorted.
    pub fn operations(&self) -> Vec<(String, String, ParamShape)> {
        let mut ops: Vec<_> = self
            .handlers
            .iter()
            .map(|((t, o), entry)| (t.clone(), o.clone(), entry.shape.clone()))
            .collect();
        ops.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        ops
    }
}

/// Absent parameters decode as an empty object so all-optional parameter
/// structs accept them.
fn decode<P: ParamShaped>(raw: &Value) -> Result<P, DispatchError> {
    let decoded = match raw {
        Value::Null => serde_json::from_value(Value::Object(Map::new())),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|source| DispatchError::InvalidParams {
        shape: ParamShape::of::<P>(),
        source,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl HandlerTable {
    /// Check that `params` decode into the handler's parameter type without
    /// running it. Hosts call this before submitting so badly shaped input is
    /// refused up front.
    pub fn validate(
        &self,
        target: &str,
        operation: &str,
        shape: &ParamShape,
        params: &Value,
    ) -> Result<(), DispatchError> {
        (self.entry(target, operation, shape)?.check)(params)
    }

    fn entry(
        &self,
        target: &str,
        operation: &str,
        shape: &ParamShape,
    ) -> Result<&Entry, DispatchError> {
        let entry = self
            .handlers
            .get(&(target.to_owned(), operation.to_owned()))
            .ok_or_else(|| DispatchError::TargetNotFound {
                target: target.to_owned(),
                operation: operation.to_owned(),
            })?;

        if &entry.shape != shape {
            return Err(DispatchError::ShapeMismatch {
                target: target.to_owned(),
                operation: operation.to_owned(),
                expected: shape.clone(),
                actual: entry.shape.clone(),
            });
        }
        Ok(entry)
    }
}

impl Dispatcher for HandlerTable {
    fn invoke(
        &self,
        target: &str,
        operation: &str,
        shape: &ParamShape,
        params: &Value,
    ) -> Result<RowSet, DispatchError> {
        (self.entry(target, operation, shape)?.call)(params)
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .operations()
            .into_iter()
            .map(|(t, o, _)| format!("{t}.{o}"))
            .collect();
        f.debug_struct("HandlerTable").field("handlers", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
