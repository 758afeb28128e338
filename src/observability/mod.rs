//! Logging and span export.
//!
//! Everything in the crate logs through `tracing`. This module wires the
//! subscriber: a filter, a human-readable stderr layer, and an optional
//! OpenTelemetry layer that writes finished spans to a local file.
//!
//! ```text
//! tracing macros → EnvFilter ┬→ fmt layer → stderr
//!                            └→ tracing-opentelemetry → SDK → JSON lines file
//! ```
//!
//! With the OpenTelemetry layer installed, actions capture the current span
//! context when they are built, and the bus re-attaches it when their events
//! come back, so a round trip through a remote client stays in one trace.
//!
//! # Configuration
//!
//! The filter is chosen by:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. [`Config::trace_level`](crate::Config::trace_level)
//! 3. Default: `"info"`
//!
//! Span export is enabled by [`Config::trace_file`](crate::Config::trace_file).

mod init;
mod tracer;

pub use init::{init_tracing, shutdown_tracing, SERVICE_NAME};
pub use tracer::{create_tracer_provider, MAX_TRACE_FILE_BYTES};
