//! Trace identity resolution (W3C traceparent format).

use opentelemetry::Context;
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt as _, TraceFlags, TraceId, TraceState,
};
use sha2::{Digest, Sha256};
use tracewrap_core::CiDescriptor;
use tracing::debug;

/// Environment variable carrying the propagation header across process
/// boundaries.
pub const TRACEPARENT_VAR: &str = "TRACEPARENT";

/// A resolved trace identity: where the wrapping span will live.
///
/// Either parsed from an inbound traceparent header (nesting the command
/// under a caller-supplied trace) or derived deterministically from the CI
/// descriptor's seeds, so separate processes in the same pipeline converge
/// on one trace without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub flags: TraceFlags,
}

impl TraceContext {
    /// Resolve the trace identity for this run.
    ///
    /// A well-formed inbound header wins; anything else degrades to a log
    /// note and deterministic derivation. This never fails.
    pub fn resolve(inbound: Option<&str>, descriptor: &CiDescriptor) -> Self {
        if let Some(header) = inbound {
            match Self::from_traceparent(header) {
                Some(context) => {
                    debug!(header, "joining inbound trace");
                    return context;
                }
                None => {
                    debug!(header, "ignoring malformed traceparent; deriving trace identity");
                }
            }
        }
        Self::derive(descriptor)
    }

    /// Parse a W3C traceparent header value.
    ///
    /// Requires exactly four hyphen-delimited hex segments of lengths
    /// 2/32/16/2, and non-zero trace and span ids. Returns `None` on any
    /// deviation; an invalid context is never propagated.
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let mut segments = header.split('-');
        let (version, trace_id, span_id, flags) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(version), Some(trace_id), Some(span_id), Some(flags), None) => {
                (version, trace_id, span_id, flags)
            }
            _ => return None,
        };

        if version.len() != 2 || trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }
        if ![version, trace_id, span_id, flags]
            .into_iter()
            .all(|segment| segment.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return None;
        }

        let context = Self {
            trace_id: TraceId::from_hex(trace_id).ok()?,
            span_id: SpanId::from_hex(span_id).ok()?,
            flags: TraceFlags::new(u8::from_str_radix(flags, 16).ok()?),
        };
        context.is_valid().then_some(context)
    }

    /// Derive a trace identity from the descriptor's seeds.
    ///
    /// Equal seeds always produce bit-identical ids, including the empty
    /// string (which hashes like any other input).
    pub fn derive(descriptor: &CiDescriptor) -> Self {
        Self {
            trace_id: derive_trace_id(&descriptor.trace_seed),
            span_id: derive_span_id(&descriptor.span_seed),
            flags: TraceFlags::default(),
        }
    }

    /// A context is valid when both ids are non-zero.
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }

    /// Wrap this identity as the remote parent for span creation.
    pub fn parent_context(&self) -> Context {
        let span_context = SpanContext::new(
            self.trace_id,
            self.span_id,
            self.flags,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }
}

/// Serialize a span context as a traceparent header value.
///
/// Version and flags are fixed literals on generation.
pub fn traceparent(span_context: &SpanContext) -> String {
    format!(
        "00-{:032x}-{:016x}-00",
        u128::from_be_bytes(span_context.trace_id().to_bytes()),
        u64::from_be_bytes(span_context.span_id().to_bytes()),
    )
}

/// Trace id from the leading 16 bytes of the seed's SHA-256 digest.
pub fn derive_trace_id(seed: &str) -> TraceId {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    TraceId::from_bytes(bytes)
}

/// Span id from the leading 8 bytes of the seed's SHA-256 digest.
pub fn derive_span_id(seed: &str) -> SpanId {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    SpanId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn descriptor(trace_seed: &str, span_seed: &str) -> CiDescriptor {
        CiDescriptor {
            name: "Test",
            service_name: "test".to_string(),
            span_name: "cmd".to_string(),
            trace_seed: trace_seed.to_string(),
            span_seed: span_seed.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let desc = descriptor("pipeline-42", "job-7");
        assert_eq!(TraceContext::derive(&desc), TraceContext::derive(&desc));
    }

    #[test]
    fn derivation_matches_sha256_vectors() {
        assert_eq!(
            derive_trace_id("1234567"),
            TraceId::from_hex("8bb0cf6eb9b17d0f7d22b456f121257d").unwrap()
        );
        assert_eq!(
            derive_span_id("1234567"),
            SpanId::from_hex("8bb0cf6eb9b17d0f").unwrap()
        );
    }

    #[test]
    fn empty_seed_yields_fixed_ids() {
        assert_eq!(
            derive_trace_id(""),
            TraceId::from_hex("e3b0c44298fc1c149afbf4c8996fb924").unwrap()
        );
        assert_eq!(derive_span_id(""), SpanId::from_hex("e3b0c44298fc1c14").unwrap());
    }

    #[test]
    fn traceparent_round_trips() {
        let derived = TraceContext::derive(&descriptor("foo", "bar"));
        let span_context = SpanContext::new(
            derived.trace_id,
            derived.span_id,
            derived.flags,
            false,
            TraceState::default(),
        );
        let header = traceparent(&span_context);
        let parsed = TraceContext::from_traceparent(&header).unwrap();
        assert_eq!(parsed.trace_id, derived.trace_id);
        assert_eq!(parsed.span_id, derived.span_id);
    }

    #[test]
    fn traceparent_is_zero_padded() {
        let span_context = SpanContext::new(
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        assert_eq!(
            traceparent(&span_context),
            "00-0af7651916cd43dd8448eb211c80319c-00f067aa0ba902b7-00"
        );
    }

    #[test]
    fn valid_inbound_header_wins_over_derivation() {
        let desc = descriptor("foo", "bar");
        let resolved = TraceContext::resolve(
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
            &desc,
        );
        assert_eq!(
            resolved.trace_id,
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
        assert_eq!(resolved.span_id, SpanId::from_hex("00f067aa0ba902b7").unwrap());
        assert_eq!(resolved.flags, TraceFlags::SAMPLED);
    }

    #[test]
    fn malformed_header_falls_back_to_derivation() {
        let desc = descriptor("foo", "bar");
        let derived = TraceContext::derive(&desc);
        assert_eq!(TraceContext::resolve(Some("foobarbaz"), &desc), derived);
        assert_eq!(TraceContext::resolve(None, &desc), derived);
    }

    #[test]
    fn rejects_structurally_invalid_headers() {
        let cases = [
            "",
            "foobarbaz",
            // wrong segment count
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00-extra",
            // wrong segment lengths
            "0-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
            "00-4bf92f3577b34da6a3ce929d0e0e47-00f067aa0ba902b7-00",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902-00",
            // non-hex
            "zz-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
            "00-4bf92f3577b34da6a3ce929d0e0e473g-00f067aa0ba902b7-00",
        ];
        for header in cases {
            assert!(
                TraceContext::from_traceparent(header).is_none(),
                "accepted {header:?}"
            );
        }
    }

    #[test]
    fn rejects_zero_ids() {
        assert!(
            TraceContext::from_traceparent(
                "00-00000000000000000000000000000000-00f067aa0ba902b7-00"
            )
            .is_none()
        );
        assert!(
            TraceContext::from_traceparent(
                "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-00"
            )
            .is_none()
        );
    }
}
