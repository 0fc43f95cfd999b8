//! Table context: serializable rendering payload built from a [`RowSet`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fluxport_core::RowSet;

/// Default worksheet name.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Rendering payload shared by every table template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableContext {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellCtx>>,
}

/// One cell, pre-formatted for templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCtx {
    pub text: String,
    /// SpreadsheetML data type: `String` or `Number`.
    pub kind: String,
}

impl CellCtx {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::string(String::new()),
            Value::String(s) => Self::string(s.clone()),
            Value::Bool(b) => Self::string(b.to_string()),
            Value::Number(n) => Self {
                text: n.to_string(),
                kind: "Number".to_owned(),
            },
            nested => Self::string(nested.to_string()),
        }
    }

    fn string(text: String) -> Self {
        Self {
            text,
            kind: "String".to_owned(),
        }
    }
}

impl TableContext {
    /// Build a [`TableContext`] from a [`RowSet`].
    pub fn from_rows(rows: &RowSet) -> Self {
        Self::with_sheet_name(rows, DEFAULT_SHEET_NAME)
    }

    pub fn with_sheet_name(rows: &RowSet, sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_owned(),
            columns: rows.columns.clone(),
            rows: rows
                .rows
                .iter()
                .map(|row| row.iter().map(CellCtx::from_value).collect())
                .collect(),
        }
    }
}
