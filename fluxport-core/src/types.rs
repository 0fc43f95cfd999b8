//! Domain types for export units and their data.
//!
//! Identifiers are newtypes over `String` so a business type can never be
//! passed where an owner id is expected.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Business-type key an [`ExportUnit`] is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BizType(pub String);

impl fmt::Display for BizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BizType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BizType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of the caller that owns a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Globally unique identifier of one submitted export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Fresh 128-bit random id rendered as 32 lowercase hex characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Parameter shapes
// ---------------------------------------------------------------------------

/// A parameter type a business handler accepts.
///
/// `SHAPE` is the stable name units refer to in manifests; it must not depend
/// on the Rust module path.
pub trait ParamShaped: DeserializeOwned + Send + 'static {
    const SHAPE: &'static str;
}

/// Untyped parameters: any JSON document is accepted as-is.
impl ParamShaped for Value {
    const SHAPE: &'static str = "json";
}

/// Descriptor naming the shape parameters are coerced into before invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamShape(pub String);

impl ParamShape {
    pub fn of<P: ParamShaped>() -> Self {
        Self(P::SHAPE.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ParamShape {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// ExportUnit
// ---------------------------------------------------------------------------

/// Registered descriptor binding a business type to an executable query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportUnit {
    pub biz_type: BizType,
    /// Name of the service that owns the query.
    pub target: String,
    /// Operation on `target` to invoke.
    pub operation: String,
    pub param_shape: ParamShape,
    /// Named authorizer replacing the default one for this unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<String>,
}

impl ExportUnit {
    pub fn new(
        biz_type: impl Into<BizType>,
        target: impl Into<String>,
        operation: impl Into<String>,
        param_shape: ParamShape,
    ) -> Self {
        Self {
            biz_type: biz_type.into(),
            target: target.into(),
            operation: operation.into(),
            param_shape,
            authorizer: None,
        }
    }

    pub fn with_authorizer(mut self, name: impl Into<String>) -> Self {
        self.authorizer = Some(name.into());
        self
    }

    /// The custom authorizer name, if one is configured and non-blank.
    pub fn custom_authorizer(&self) -> Option<&str> {
        self.authorizer
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

// ---------------------------------------------------------------------------
// RowSet
// ---------------------------------------------------------------------------

/// Ordered rows returned by a business query, with the column schema taken
/// from the row type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a row set from serializable records.
    ///
    /// Struct and map records become one column per field, in the field order
    /// of the first record; fields a later record lacks are rendered as null.
    /// Scalar records produce a single `value` column.
    pub fn from_records<R: Serialize>(records: &[R]) -> Result<Self, serde_json::Error> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let columns: Vec<String> = match values.first() {
            Some(Value::Object(first)) => first.keys().cloned().collect(),
            Some(_) => vec!["value".to_owned()],
            None => return Ok(Self::default()),
        };

        let rows = values
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => project(&columns, map),
                other => vec![other],
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn project(columns: &[String], mut map: Map<String, Value>) -> Vec<Value> {
    columns
        .iter()
        .map(|column| map.remove(column).unwrap_or(Value::Null))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Order {
        order_no: String,
        amount: f64,
        status: &'static str,
    }

    #[test]
    fn newtype_display() {
        assert_eq!(BizType::from("ORDER_EXPORT").to_string(), "ORDER_EXPORT");
        assert_eq!(OwnerId::from("u1").to_string(), "u1");
        assert_eq!(TaskId::from("t-01").to_string(), "t-01");
    }

    #[test]
    fn generated_task_ids_are_32_hex_chars_and_distinct() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_eq!(a.0.len(), 32);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn blank_authorizer_is_not_custom() {
        let unit = ExportUnit::new("A", "svc", "op", ParamShape::of::<Value>());
        assert_eq!(unit.custom_authorizer(), None);
        assert_eq!(unit.clone().with_authorizer("   ").custom_authorizer(), None);
        assert_eq!(
            unit.with_authorizer("order_managers").custom_authorizer(),
            Some("order_managers")
        );
    }

    #[test]
    fn row_set_columns_follow_field_order() {
        let orders = vec![
            Order { order_no: "ORD1".into(), amount: 9.5, status: "paid" },
            Order { order_no: "ORD2".into(), amount: 1.0, status: "shipped" },
        ];
        let set = RowSet::from_records(&orders).unwrap();
        assert_eq!(set.columns, vec!["order_no", "amount", "status"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[1], vec![json!("ORD2"), json!(1.0), json!("shipped")]);
    }

    #[test]
    fn row_set_fills_missing_fields_with_null() {
        let records = vec![json!({"a": 1, "b": 2}), json!({"a": 3})];
        let set = RowSet::from_records(&records).unwrap();
        assert_eq!(set.rows[1], vec![json!(3), Value::Null]);
    }

    #[test]
    fn scalar_records_use_a_single_value_column() {
        let set = RowSet::from_records(&[1, 2, 3][..]).unwrap();
        assert_eq!(set.columns, vec!["value"]);
        assert_eq!(set.rows[2], vec![json!(3)]);
    }

    #[test]
    fn empty_records_give_empty_row_set() {
        let set = RowSet::from_records::<Value>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(set.columns.is_empty());
    }

    #[test]
    fn unit_serde_roundtrip_omits_missing_authorizer() {
        let unit = ExportUnit::new("A", "svc", "op", ParamShape::from("OrderParams"));
        let yaml = serde_yaml::to_string(&unit).expect("serialize");
        assert!(!yaml.contains("authorizer"));
        let back: ExportUnit = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, unit);
    }
}
