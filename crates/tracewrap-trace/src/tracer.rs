//! Tracer provider and exporter construction.

use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracewrap_core::{Error, Result};
use tracing::{debug, warn};

/// OTLP wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Grpc,
    HttpProtobuf,
    HttpJson,
}

impl Protocol {
    /// Parse an OTLP protocol name as spelled in the standard environment
    /// variables (`grpc`, `http/protobuf`, `http/json`).
    pub fn from_otlp_name(name: &str) -> Option<Self> {
        if name.contains("grpc") {
            Some(Protocol::Grpc)
        } else if name.contains("json") {
            Some(Protocol::HttpJson)
        } else if name.contains("http") {
            Some(Protocol::HttpProtobuf)
        } else {
            None
        }
    }

    /// Infer the protocol from the endpoint's conventional OTLP port.
    pub fn infer_from_endpoint(endpoint: &str) -> Option<Self> {
        if endpoint.contains(":4317") {
            Some(Protocol::Grpc)
        } else if endpoint.contains(":4318") {
            Some(Protocol::HttpJson)
        } else {
            None
        }
    }
}

/// OTLP exporter configuration.
///
/// Endpoint and protocol are opaque knobs handed to the exporter builder
/// unmodified. Both unset means spans are dropped rather than exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    pub endpoint: Option<String>,
    pub protocol: Option<Protocol>,
    pub timeout_seconds: u64,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: None,
            timeout_seconds: 10,
        }
    }
}

impl OtlpConfig {
    /// Read the standard OTLP exporter variables.
    pub fn from_env() -> Self {
        let endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.is_empty());
        let protocol = env::var("OTEL_EXPORTER_OTLP_PROTOCOL")
            .ok()
            .as_deref()
            .and_then(Protocol::from_otlp_name);
        Self {
            endpoint,
            protocol,
            ..Self::default()
        }
    }

    /// The protocol to use, falling back to port-based inference when the
    /// selector is unset.
    pub fn resolved_protocol(&self) -> Option<Protocol> {
        self.protocol
            .or_else(|| self.endpoint.as_deref().and_then(Protocol::infer_from_endpoint))
    }
}

/// Build the tracer provider for a single run.
///
/// The provider is handed back to the caller instead of being registered
/// globally; the caller owns span creation and the final flush/shutdown.
/// Exporter construction failure is downgraded to a warning and yields a
/// provider that drops spans; telemetry must never stop the command.
pub fn build_provider(
    service_name: &str,
    resource_attributes: Vec<KeyValue>,
    otlp: &OtlpConfig,
) -> TracerProvider {
    let mut attributes = vec![KeyValue::new("service.name", service_name.to_string())];
    attributes.extend(resource_attributes);
    let resource = Resource::new(attributes);

    let mut builder = TracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    match build_exporter(otlp) {
        Ok(Some(exporter)) => {
            builder = builder.with_batch_exporter(exporter, runtime::Tokio);
        }
        Ok(None) => {
            debug!("no OTLP endpoint or protocol configured; spans will not be exported");
        }
        Err(err) => {
            warn!(error = %err, "could not create span exporter; spans will not be exported");
        }
    }

    builder.build()
}

fn build_exporter(otlp: &OtlpConfig) -> Result<Option<SpanExporter>> {
    let Some(protocol) = otlp.resolved_protocol() else {
        return Ok(None);
    };
    let timeout = Duration::from_secs(otlp.timeout_seconds);

    let exporter = match protocol {
        Protocol::Grpc => {
            let mut builder = SpanExporter::builder().with_tonic().with_timeout(timeout);
            if let Some(endpoint) = &otlp.endpoint {
                builder = builder.with_endpoint(endpoint.clone());
            }
            builder.build()
        }
        Protocol::HttpProtobuf | Protocol::HttpJson => {
            let wire = match protocol {
                Protocol::HttpJson => opentelemetry_otlp::Protocol::HttpJson,
                _ => opentelemetry_otlp::Protocol::HttpBinary,
            };
            let mut builder = SpanExporter::builder()
                .with_http()
                .with_protocol(wire)
                .with_timeout(timeout);
            if let Some(endpoint) = &otlp.endpoint {
                builder = builder.with_endpoint(endpoint.clone());
            }
            builder.build()
        }
    };

    exporter
        .map(Some)
        .map_err(|err| Error::Exporter(err.to_string()))
}
