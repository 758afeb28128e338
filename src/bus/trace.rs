//! Tracing context carried on actions and change events.
//!
//! Remote clients usually finish their work on another thread and re-enter the
//! bus through `publish`. Capturing the OpenTelemetry span context when an
//! action is built, copying it onto the resolving event, and re-attaching it
//! on delivery keeps both halves of the round trip in one trace.

use serde::{Deserialize, Serialize};

/// Distributed tracing context for cross-thread span propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// OpenTelemetry trace ID as a hex string.
    pub trace_id: String,

    /// Parent span ID for linking spans across threads.
    pub parent_span_id: String,
}

impl TraceContext {
    /// Captures the context of the current tracing span.
    ///
    /// Returns `None` when no OpenTelemetry layer is installed or the current
    /// span context is not valid.
    pub fn from_current() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let span = tracing::Span::current();
        let otel_context = span.context();
        let span_ref = otel_context.span();
        let span_context = span_ref.span_context();

        if !span_context.is_valid() {
            return None;
        }

        let context = Self {
            trace_id: format!("{:032x}", span_context.trace_id()),
            parent_span_id: format!("{:016x}", span_context.span_id()),
        };
        tracing::trace!(
            trace_id = %context.trace_id,
            parent_span_id = %context.parent_span_id,
            "captured trace context"
        );
        Some(context)
    }

    /// Attaches this context as the remote parent on the current thread.
    ///
    /// The returned guard must be held for as long as spans should be parented
    /// to it. Returns `None` if the stored ids are not valid hex.
    #[must_use]
    pub fn attach(&self) -> Option<opentelemetry::ContextGuard> {
        use opentelemetry::trace::{
            SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
        };

        let trace_id = TraceId::from_hex(&self.trace_id).ok()?;
        let span_id = SpanId::from_hex(&self.parent_span_id).ok()?;

        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        let otel_context = opentelemetry::Context::current().with_remote_span_context(span_context);
        Some(otel_context.attach())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_without_otel_layer() {
        assert!(TraceContext::from_current().is_none());
    }

    #[test]
    fn attach_rejects_invalid_hex() {
        let context = TraceContext {
            trace_id: "not-hex".to_string(),
            parent_span_id: "00f067aa0ba902b7".to_string(),
        };
        assert!(context.attach().is_none());
    }

    #[test]
    fn attach_accepts_valid_ids() {
        let context = TraceContext {
            trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".to_string(),
            parent_span_id: "00f067aa0ba902b7".to_string(),
        };
        assert!(context.attach().is_some());
    }
}
