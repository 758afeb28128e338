//! Tracer provider with a JSON-lines span exporter.
//!
//! Every finished span becomes one JSON object on its own line, appended to a
//! local file. When the file grows past [`MAX_TRACE_FILE_BYTES`] it is moved
//! aside to `<name>.1` (replacing the previous backup) and a fresh file is
//! started.

use futures_util::future::BoxFuture;
use opentelemetry::trace::{SpanId, Status, TraceError};
use opentelemetry::Value;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::TracerProvider;
use serde_json::{json, Map, Value as JsonValue};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Size at which the trace file is rotated (8 MiB).
pub const MAX_TRACE_FILE_BYTES: u64 = 8 * 1024 * 1024;

struct JsonLinesExporter {
    path: PathBuf,
    service: String,
    file: Option<File>,
    is_shutdown: bool,
}

impl JsonLinesExporter {
    fn new(path: PathBuf, service: impl Into<String>) -> Self {
        Self {
            path,
            service: service.into(),
            file: None,
            is_shutdown: false,
        }
    }

    fn write_batch(&mut self, batch: &[SpanData]) -> std::io::Result<()> {
        self.rotate_if_full()?;

        let file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new().create(true).append(true).open(&self.path)?,
        };
        let file = self.file.insert(file);

        for span in batch {
            writeln!(file, "{}", span_to_json(&self.service, span))?;
        }
        file.flush()
    }

    fn rotate_if_full(&mut self) -> std::io::Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return Ok(()),
        };
        if size <= MAX_TRACE_FILE_BYTES {
            return Ok(());
        }

        self.file = None;
        std::fs::rename(&self.path, backup_path(&self.path))
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".1");
    path.with_file_name(name)
}

fn unix_nanos(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos())
}

fn attribute_value(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => json!(b),
        Value::I64(i) => json!(i),
        Value::F64(f) => json!(f),
        Value::String(s) => json!(s.as_str()),
        Value::Array(_) => json!(value.to_string()),
    }
}

fn span_to_json(service: &str, span: &SpanData) -> JsonValue {
    let attributes: Map<String, JsonValue> = span
        .attributes
        .iter()
        .map(|kv| (kv.key.to_string(), attribute_value(&kv.value)))
        .collect();

    let parent = if span.parent_span_id == SpanId::INVALID {
        JsonValue::Null
    } else {
        json!(format!("{:016x}", span.parent_span_id))
    };

    let (status, error) = match &span.status {
        Status::Unset => ("unset", None),
        Status::Ok => ("ok", None),
        Status::Error { description } => ("error", Some(description.to_string())),
    };

    let start = unix_nanos(span.start_time);
    let end = unix_nanos(span.end_time);

    json!({
        "service": service,
        "trace_id": format!("{:032x}", span.span_context.trace_id()),
        "span_id": format!("{:016x}", span.span_context.span_id()),
        "parent_span_id": parent,
        "name": span.name,
        "start_unix_nano": start.to_string(),
        "duration_ns": end.saturating_sub(start).to_string(),
        "attributes": attributes,
        "events": span.events.len(),
        "status": status,
        "error": error,
    })
}

impl SpanExporter for JsonLinesExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown {
            return Box::pin(std::future::ready(Err(TraceError::from("exporter is shut down"))));
        }

        let result = self
            .write_batch(&batch)
            .map_err(|e| TraceError::from(e.to_string()));
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.is_shutdown = true;
        self.file = None;
    }
}

impl std::fmt::Debug for JsonLinesExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesExporter")
            .field("path", &self.path)
            .field("is_shutdown", &self.is_shutdown)
            .finish_non_exhaustive()
    }
}

/// Builds a tracer provider that appends finished spans to `file_path`.
///
/// Spans are exported one at a time, as they end.
pub fn create_tracer_provider(file_path: PathBuf, service: &str) -> TracerProvider {
    let resource = Resource::new(vec![opentelemetry::KeyValue::new(
        "service.name",
        service.to_string(),
    )]);
    let exporter = JsonLinesExporter::new(file_path, service);

    TracerProvider::builder()
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .with_simple_exporter(exporter)
        .build()
}
