//! # fluxport-runtime
//!
//! Async host for export pipelines: the [`Orchestrator`] with its bounded
//! queue and worker pool, the [`AccessGate`], the [`TaskView`] projection,
//! runtime configuration and tracing setup.

mod error;
pub mod config;
pub mod gate;
pub mod orchestrator;
pub mod paths;
pub mod view;

pub use config::{ConfigFile, RuntimeConfig};
pub use error::{RuntimeError, SubmitError};
pub use gate::AccessGate;
pub use orchestrator::{Orchestrator, PoolOptions};
pub use view::TaskView;

/// Install the global tracing subscriber, logging to stderr.
///
/// `RUST_LOG` overrides the default `info` filter. Calling this more than
/// once is harmless.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
