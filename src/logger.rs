use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// An explicit `level` wins over `RUST_LOG`; with neither, `info` is used.
/// Only the formatting subscriber is installed, without a `log` bridge, so
/// events emitted through `log-always` are not printed twice.
pub fn init(level: Option<log::LevelFilter>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str().to_ascii_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt_layer = fmt::layer().with_target(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("subscriber already installed");
    }
}
