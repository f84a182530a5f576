//! Basic subscriber setup for binaries and examples embedding the queue.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{QueueError, QueueResult};

/// Output format for [`init_tracing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset or invalid
pub fn init_tracing(default_filter: &str, format: TracingFormat) -> QueueResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        TracingFormat::Pretty => builder.try_init(),
        TracingFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| QueueError::Configuration(format!("tracing subscriber already set: {}", e)))
}
