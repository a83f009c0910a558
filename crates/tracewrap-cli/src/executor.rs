//! Span lifecycle around a single wrapped command.
//!
//! Composes classification, trace-identity resolution and process
//! supervision: open a span for the resolved context, run the child,
//! record the outcome, then close and flush under a fixed deadline.

use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer as _, TracerProvider as _};
use opentelemetry::{Array, KeyValue, StringValue, Value};
use std::env;
use std::time::Duration;
use tracewrap_core::CiDescriptor;
use tracewrap_runner::{ExecResult, launch, lookup_executable};
use tracewrap_trace::{OtlpConfig, TRACEPARENT_VAR, TraceContext, build_provider, traceparent};
use tracing::debug;

/// How long the closing step (span end, exporter flush, provider shutdown)
/// may take before the pending work is abandoned. Telemetry delivery is
/// best effort and must never hold up the exit code.
const SHUTDOWN_DEADLINE: Duration = Duration::from_millis(500);

/// Per-run overrides, already merged from config file, environment and
/// flags by the caller.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub service_name: Option<String>,
    pub span_name: Option<String>,
    pub tag_command_args: bool,
}

/// Wrap `command` in a span and run it to completion.
pub async fn run(command: &[String], options: &ExecOptions) -> ExecResult {
    let descriptor = tracewrap_core::detect();

    let service_name = options
        .service_name
        .clone()
        .unwrap_or_else(|| descriptor.service_name.clone());
    let span_name = options
        .span_name
        .clone()
        .unwrap_or_else(|| descriptor.span_name.clone());

    let program = &command[0];
    let args = &command[1..];

    let inbound = env::var(TRACEPARENT_VAR).ok();
    let trace_context = TraceContext::resolve(inbound.as_deref(), &descriptor);

    let provider = build_provider(
        &service_name,
        resource_attributes(program, args, &descriptor, options),
        &OtlpConfig::from_env(),
    );
    let tracer = provider.tracer("tracewrap");

    let parent = trace_context.parent_context();
    let mut span = tracer
        .span_builder(span_name)
        .with_kind(SpanKind::Internal)
        .start_with_context(&tracer, &parent);
    let header = traceparent(span.span_context());

    let result = launch(program, args, &header).await;

    if let Some(error) = &result.error {
        // Failure to record telemetry must never fail the run itself.
        span.record_error(error);
        span.set_status(Status::error(error.to_string()));
        debug!(error = %error, "recorded child failure on span");
    }

    // Close and flush raced against the deadline. A slow or unreachable
    // collector loses the race and the pending work is abandoned, not
    // awaited.
    let flush = tokio::task::spawn_blocking(move || {
        span.end();
        for exported in provider.force_flush() {
            if let Err(err) = exported {
                debug!(error = %err, "span export failed");
            }
        }
        if let Err(err) = provider.shutdown() {
            debug!(error = %err, "tracer provider shutdown failed");
        }
    });
    if tokio::time::timeout(SHUTDOWN_DEADLINE, flush).await.is_err() {
        debug!("telemetry flush exceeded deadline; abandoning");
    }

    result
}

fn resource_attributes(
    program: &str,
    args: &[String],
    descriptor: &CiDescriptor,
    options: &ExecOptions,
) -> Vec<KeyValue> {
    let mut attributes = vec![KeyValue::new("process.executable.name", program.to_string())];
    if let Some(path) = lookup_executable(program) {
        attributes.push(KeyValue::new(
            "process.executable.path",
            path.display().to_string(),
        ));
    }
    for (key, value) in &descriptor.attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }
    attributes.push(KeyValue::new("tracewrap.ci.provider", descriptor.name));
    attributes.push(KeyValue::new("tracewrap.version", env!("CARGO_PKG_VERSION")));

    // Off unless explicitly enabled: argument lists routinely carry
    // secrets.
    if options.tag_command_args && !args.is_empty() {
        let values: Vec<StringValue> = args.iter().cloned().map(StringValue::from).collect();
        attributes.push(KeyValue::new(
            "process.command_args",
            Value::Array(Array::String(values)),
        ));
    }

    attributes
}
