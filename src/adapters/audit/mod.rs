//! Audit sink adapters.

mod recording;
mod tracing_sink;
mod webhook;

pub use recording::RecordingAuditSink;
pub use tracing_sink::TracingAuditSink;
pub use webhook::WebhookAuditSink;
