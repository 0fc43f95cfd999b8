//! # fluxport-pipeline
//!
//! Execution side of an export: the typed handler table that runs business
//! queries, task stores, artifact storage and the per-task [`Pipeline`].
//!
//! - [`dispatch`]: [`HandlerTable`], the in-process dispatcher
//! - [`store`]: [`MemoryTaskStore`] with progress throttling
//! - [`ledger`]: [`FileTaskStore`], the JSON-backed store
//! - [`blob`]: [`LocalBlobStore`]
//! - [`pipeline`]: fetch → render → publish for one task

pub mod blob;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod store;

pub use blob::LocalBlobStore;
pub use dispatch::HandlerTable;
pub use error::PipelineError;
pub use ledger::FileTaskStore;
pub use pipeline::{artifact_file_name, Pipeline};
pub use store::{MemoryTaskStore, DEFAULT_PROGRESS_THROTTLE};
