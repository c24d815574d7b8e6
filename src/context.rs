//! Read-only capability interface the evaluator is compiled against.
//!
//! Isolates the formatter from where headers, trailers, and stream
//! metadata actually come from. A real proxy would implement [`Context`]
//! over its live request/response objects and [`StreamInfo`] over its
//! connection bookkeeping; this crate only needs the narrow read side.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::headers::HeaderMap;

/// The four per-request inputs a format template is evaluated against.
pub trait Context {
    /// Request headers, by name, case-insensitive.
    fn request_headers(&self) -> &HeaderMap;
    /// Response headers, by name, case-insensitive.
    fn response_headers(&self) -> &HeaderMap;
    /// Response trailers, by name, case-insensitive.
    fn response_trailers(&self) -> &HeaderMap;
    /// Per-request connection/timing/routing metadata.
    fn stream_info(&self) -> &dyn StreamInfo;
}

/// Look up a header value, treating a present-but-empty value as present.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)
}

/// Proxy-side per-request bookkeeping: timings, byte counts, addresses,
/// TLS session, dynamic metadata, filter state, protocol, and routing.
///
/// Every accessor returning `Option` renders `-` when `None`; byte counters
/// and `response_code` have their own documented zero-value defaults (see
/// [`crate::directive::BareField`]).
pub trait StreamInfo {
    fn protocol(&self) -> Option<&str>;
    fn response_code(&self) -> Option<u32>;
    fn response_code_details(&self) -> Option<&str>;
    fn response_flags(&self) -> &str;
    fn bytes_received(&self) -> u64;
    fn bytes_sent(&self) -> u64;

    /// Total request duration, start to finish.
    fn request_complete(&self) -> Option<Duration>;
    /// Time from request start to the last byte received from downstream.
    fn last_downstream_rx_byte_received(&self) -> Option<Duration>;
    /// Time from request start to the first byte received from upstream.
    fn first_upstream_rx_byte_received(&self) -> Option<Duration>;
    /// Time from request start to the last byte sent to downstream.
    fn last_downstream_tx_byte_sent(&self) -> Option<Duration>;

    fn upstream_host(&self) -> Option<&str>;
    fn upstream_cluster(&self) -> Option<&str>;
    fn upstream_local_address(&self) -> Option<&str>;
    fn upstream_transport_failure_reason(&self) -> Option<&str>;

    fn downstream_local_address(&self) -> Option<&str>;
    fn downstream_remote_address(&self) -> Option<&str>;
    fn downstream_direct_remote_address(&self) -> Option<&str>;

    fn requested_server_name(&self) -> Option<&str>;
    fn route_name(&self) -> Option<&str>;

    /// `None` for a plaintext connection, mirroring
    /// `downstreamSslConnection() == nullptr`.
    fn downstream_tls(&self) -> Option<&dyn TlsSession>;

    /// The structured-value payload registered under `namespace`, if any.
    fn dynamic_metadata(&self, namespace: &str) -> Option<&Value>;
    /// A filter-state object stored under `key`, if any.
    fn filter_state(&self, key: &str) -> Option<&dyn FilterStateObject>;

    fn start_time(&self) -> DateTime<Utc>;
}

/// TLS session/certificate accessors, present only on TLS connections.
pub trait TlsSession {
    fn peer_uri_san(&self) -> Vec<String>;
    fn local_uri_san(&self) -> Vec<String>;
    fn peer_subject(&self) -> Option<&str>;
    fn local_subject(&self) -> Option<&str>;
    fn session_id(&self) -> Option<&str>;
    fn cipher_suite(&self) -> Option<&str>;
    fn tls_version(&self) -> Option<&str>;
    fn peer_fingerprint_256(&self) -> Option<&str>;
    fn peer_serial(&self) -> Option<&str>;
    fn peer_issuer(&self) -> Option<&str>;
    /// Raw PEM text; the directive catalog percent-encodes it on render.
    fn peer_cert_pem(&self) -> Option<&str>;
    fn peer_cert_valid_from(&self) -> Option<DateTime<Utc>>;
    fn peer_cert_valid_to(&self) -> Option<DateTime<Utc>>;
}

/// A filter-state entry that may or may not be serializable.
///
/// Mirrors `StreamInfo::FilterState::Object::serializeAsProto()` returning
/// null for objects (e.g. opaque WASM/Lua values) that can't produce a
/// structured message.
pub trait FilterStateObject {
    fn serialize(&self) -> Option<Value>;
}
