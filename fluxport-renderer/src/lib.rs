//! # fluxport-renderer
//!
//! Turns a [`RowSet`](fluxport_core::RowSet) into artifact bytes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fluxport_core::RowSet;
//! use fluxport_renderer::{Renderer, TableFormat, TableRenderer};
//!
//! fn render(rows: &RowSet) {
//!     if let Ok(renderer) = TableRenderer::new(TableFormat::Csv) {
//!         if let Ok(bytes) = renderer.render(rows) {
//!             println!("{} bytes of .{}", bytes.len(), renderer.file_extension());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{CellCtx, TableContext};
pub use engine::{Renderer, TableFormat, TableRenderer};
pub use error::RenderError;
