//! Tracing subscriber setup.

use super::tracer;
use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Service name recorded on exported spans.
pub const SERVICE_NAME: &str = "sitesync";

/// Installs the global tracing subscriber.
///
/// The subscriber is built from:
/// 1. An `EnvFilter` taken from `RUST_LOG`, else `config.trace_level`, else `"info"`
/// 2. A human-readable fmt layer writing to stderr
/// 3. When `config.trace_file` is set, an OpenTelemetry layer appending spans
///    to that file as JSON lines
///
/// Only the first call installs anything; later calls return `false`. A trace
/// file whose directory cannot be created is skipped and the subscriber is
/// installed without span export.
///
/// # Example
///
/// ```rust
/// use sitesync::observability::init_tracing;
/// use sitesync::Config;
///
/// let config = Config {
///     trace_level: Some("debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.trace_level.as_deref().unwrap_or("info"))
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let otel_layer = config.trace_file.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("sitesync: span export disabled, cannot create {}: {e}", parent.display());
                return None;
            }
        }

        let provider = tracer::create_tracer_provider(path.clone(), SERVICE_NAME);
        let tracer = provider.tracer(SERVICE_NAME);
        let _previous = opentelemetry::global::set_tracer_provider(provider);
        Some(OpenTelemetryLayer::new(tracer))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .is_ok()
}

/// Flushes and shuts down span export installed by [`init_tracing`].
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
