//! Tera rendering engine: the [`Renderer`] contract and [`TableRenderer`].
//!
//! | Format        | Template          | Extension |
//! |---------------|-------------------|-----------|
//! | `csv`         | `table.csv`       | `.csv`    |
//! | `spreadsheet` | `spreadsheet.xml` | `.xml`    |
//!
//! The spreadsheet format is SpreadsheetML 2003, which spreadsheet
//! applications open directly as a workbook.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::Tera;

use fluxport_core::RowSet;

use crate::context::TableContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("table.csv", include_str!("templates/table.csv.tera")),
    ("spreadsheet.xml", include_str!("templates/spreadsheet.xml.tera")),
];

// ---------------------------------------------------------------------------
// Renderer contract
// ---------------------------------------------------------------------------

/// Rows → artifact bytes.
pub trait Renderer: Send + Sync {
    /// Fails with [`RenderError::EmptyInput`] when `rows` is empty.
    fn render(&self, rows: &RowSet) -> Result<Vec<u8>, RenderError>;

    /// Extension (without the dot) of the artifacts this renderer produces.
    fn file_extension(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// TableFormat
// ---------------------------------------------------------------------------

/// Supported artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    #[default]
    Spreadsheet,
}

impl TableFormat {
    pub fn all() -> &'static [TableFormat] {
        &[TableFormat::Csv, TableFormat::Spreadsheet]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TableFormat::Csv => "table.csv",
            TableFormat::Spreadsheet => "spreadsheet.xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Spreadsheet => "xml",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => write!(f, "csv"),
            TableFormat::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "spreadsheet" | "xml" => Ok(TableFormat::Spreadsheet),
            other => Err(format!(
                "unknown format '{other}'; expected: csv, spreadsheet"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

/// `foo.csv.tera` → `foo.csv`.
fn template_name_for(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    file_name
        .strip_suffix(".tera")
        .map(|name| name.to_lowercase())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut templates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let Some(name) = template_name_for(&path) else { continue };
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

/// Quote a CSV field when it contains a separator, quote or line break.
fn csv_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let needs_quotes = raw.contains([',', '"', '\n', '\r']);
    let field = if needs_quotes {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    };
    Ok(Value::String(field))
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
        .collect();
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.autoescape_on(vec![".xml"]);
    tera.register_filter("csv", csv_filter);
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TableRenderer
// ---------------------------------------------------------------------------

/// Tera-based renderer for one [`TableFormat`].
///
/// `user_template_dir` may contain `table.csv.tera` / `spreadsheet.xml.tera`
/// files that override the embedded defaults. Create once and reuse.
pub struct TableRenderer {
    tera: Tera,
    format: TableFormat,
    sheet_name: String,
}

impl TableRenderer {
    /// Construct a renderer with embedded templates only.
    pub fn new(format: TableFormat) -> Result<Self, RenderError> {
        Self::with_template_dir(format, None)
    }

    pub fn with_template_dir(
        format: TableFormat,
        user_template_dir: Option<&Path>,
    ) -> Result<Self, RenderError> {
        Ok(TableRenderer {
            tera: build_tera(user_template_dir)?,
            format,
            sheet_name: crate::context::DEFAULT_SHEET_NAME.to_owned(),
        })
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    /// Render a caller-provided [`TableContext`].
    pub fn render_context(&self, ctx: &TableContext) -> Result<String, RenderError> {
        let tera_ctx = tera::Context::from_serialize(ctx)?;
        let rendered = self.tera.render(self.format.template_name(), &tera_ctx)?;
        Ok(rendered)
    }
}

impl Renderer for TableRenderer {
    fn render(&self, rows: &RowSet) -> Result<Vec<u8>, RenderError> {
        if rows.is_empty() {
            return Err(RenderError::EmptyInput);
        }
        let ctx = TableContext::with_sheet_name(rows, &self.sheet_name);
        Ok(self.render_context(&ctx)?.into_bytes())
    }

    fn file_extension(&self) -> &'static str {
        self.format.extension()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
