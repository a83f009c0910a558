//! Distributed tracing for tracewrap.
//!
//! Resolves a trace identity for the current run (inbound W3C traceparent
//! header, or deterministic derivation from CI platform seeds) and builds
//! the per-run OpenTelemetry tracer provider with OTLP export.

pub mod context;
pub mod tracer;

pub use context::{TRACEPARENT_VAR, TraceContext, traceparent};
pub use tracer::{OtlpConfig, Protocol, build_provider};
