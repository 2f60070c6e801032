use crate::config::{LogFormat, LoggingConfig};

/// Initialize tracing from the `[logging]` section.
///
/// The configured level is the default; `RUST_LOG` overrides it at
/// runtime.
pub fn init_tracing(
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(logging.show_target);
    match logging.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|e| format!("Failed to set global tracing subscriber: {e}").into())
}
