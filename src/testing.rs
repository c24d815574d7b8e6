//! A concrete, in-memory [`Context`] implementation for tests and for the
//! CLI's `render` subcommand, grounded in the builder-style test fixtures
//! used by `actix-web`'s own `Logger` middleware tests.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::context::{Context, FilterStateObject, StreamInfo, TlsSession};
use crate::headers::HeaderMap;

/// An in-memory, builder-constructed request/response/stream-info bundle.
#[derive(Default)]
pub struct TestContext {
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    response_trailers: HeaderMap,
    info: TestStreamInfo,
}

impl TestContext {
    pub fn with_request_header(mut self, name: &str, value: &str) -> Self {
        insert(&mut self.request_headers, name, value);
        self
    }

    pub fn with_response_header(mut self, name: &str, value: &str) -> Self {
        insert(&mut self.response_headers, name, value);
        self
    }

    pub fn with_trailer(mut self, name: &str, value: &str) -> Self {
        insert(&mut self.response_trailers, name, value);
        self
    }

    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.info.protocol = Some(protocol.to_string());
        self
    }

    pub fn with_response_code(mut self, code: u32) -> Self {
        self.info.response_code = Some(code);
        self
    }

    pub fn with_bytes(mut self, received: u64, sent: u64) -> Self {
        self.info.bytes_received = received;
        self.info.bytes_sent = sent;
        self
    }

    pub fn with_request_complete(mut self, d: Duration) -> Self {
        self.info.request_complete = Some(d);
        self
    }

    pub fn with_upstream_host(mut self, addr: &str) -> Self {
        self.info.upstream_host = Some(addr.to_string());
        self
    }

    pub fn with_downstream_remote_address(mut self, addr: &str) -> Self {
        self.info.downstream_remote_address = Some(addr.to_string());
        self
    }

    pub fn with_start_time(mut self, t: DateTime<Utc>) -> Self {
        self.info.start_time = t;
        self
    }

    pub fn with_tls(mut self, tls: TestTlsSession) -> Self {
        self.info.tls = Some(tls);
        self
    }

    pub fn with_dynamic_metadata(mut self, namespace: &str, value: Value) -> Self {
        self.info.dynamic_metadata.insert(namespace.to_string(), value);
        self
    }

    pub fn with_filter_state(mut self, key: &str, object: impl FilterStateObject + 'static) -> Self {
        self.info.filter_state.insert(key.to_string(), Box::new(object));
        self
    }
}

fn insert(map: &mut HeaderMap, name: &str, value: &str) {
    map.insert(name, value);
}

impl Context for TestContext {
    fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }
    fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }
    fn response_trailers(&self) -> &HeaderMap {
        &self.response_trailers
    }
    fn stream_info(&self) -> &dyn StreamInfo {
        &self.info
    }
}

/// Stream-info half of [`TestContext`]. Every field defaults to "absent".
pub struct TestStreamInfo {
    protocol: Option<String>,
    response_code: Option<u32>,
    response_code_details: Option<String>,
    response_flags: String,
    bytes_received: u64,
    bytes_sent: u64,
    request_complete: Option<Duration>,
    last_downstream_rx_byte_received: Option<Duration>,
    first_upstream_rx_byte_received: Option<Duration>,
    last_downstream_tx_byte_sent: Option<Duration>,
    upstream_host: Option<String>,
    upstream_cluster: Option<String>,
    upstream_local_address: Option<String>,
    upstream_transport_failure_reason: Option<String>,
    downstream_local_address: Option<String>,
    downstream_remote_address: Option<String>,
    downstream_direct_remote_address: Option<String>,
    requested_server_name: Option<String>,
    route_name: Option<String>,
    tls: Option<TestTlsSession>,
    dynamic_metadata: HashMap<String, Value>,
    filter_state: HashMap<String, Box<dyn FilterStateObject>>,
    start_time: DateTime<Utc>,
}

impl Default for TestStreamInfo {
    fn default() -> Self {
        Self {
            protocol: None,
            response_code: None,
            response_code_details: None,
            response_flags: "-".to_string(),
            bytes_received: 0,
            bytes_sent: 0,
            request_complete: None,
            last_downstream_rx_byte_received: None,
            first_upstream_rx_byte_received: None,
            last_downstream_tx_byte_sent: None,
            upstream_host: None,
            upstream_cluster: None,
            upstream_local_address: None,
            upstream_transport_failure_reason: None,
            downstream_local_address: None,
            downstream_remote_address: None,
            downstream_direct_remote_address: None,
            requested_server_name: None,
            route_name: None,
            tls: None,
            dynamic_metadata: HashMap::new(),
            filter_state: HashMap::new(),
            start_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl StreamInfo for TestStreamInfo {
    fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }
    fn response_code(&self) -> Option<u32> {
        self.response_code
    }
    fn response_code_details(&self) -> Option<&str> {
        self.response_code_details.as_deref()
    }
    fn response_flags(&self) -> &str {
        &self.response_flags
    }
    fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
    fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
    fn request_complete(&self) -> Option<Duration> {
        self.request_complete
    }
    fn last_downstream_rx_byte_received(&self) -> Option<Duration> {
        self.last_downstream_rx_byte_received
    }
    fn first_upstream_rx_byte_received(&self) -> Option<Duration> {
        self.first_upstream_rx_byte_received
    }
    fn last_downstream_tx_byte_sent(&self) -> Option<Duration> {
        self.last_downstream_tx_byte_sent
    }
    fn upstream_host(&self) -> Option<&str> {
        self.upstream_host.as_deref()
    }
    fn upstream_cluster(&self) -> Option<&str> {
        self.upstream_cluster.as_deref()
    }
    fn upstream_local_address(&self) -> Option<&str> {
        self.upstream_local_address.as_deref()
    }
    fn upstream_transport_failure_reason(&self) -> Option<&str> {
        self.upstream_transport_failure_reason.as_deref()
    }
    fn downstream_local_address(&self) -> Option<&str> {
        self.downstream_local_address.as_deref()
    }
    fn downstream_remote_address(&self) -> Option<&str> {
        self.downstream_remote_address.as_deref()
    }
    fn downstream_direct_remote_address(&self) -> Option<&str> {
        self.downstream_direct_remote_address.as_deref()
    }
    fn requested_server_name(&self) -> Option<&str> {
        self.requested_server_name.as_deref()
    }
    fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }
    fn downstream_tls(&self) -> Option<&dyn TlsSession> {
        self.tls.as_ref().map(|t| t as &dyn TlsSession)
    }
    fn dynamic_metadata(&self, namespace: &str) -> Option<&Value> {
        self.dynamic_metadata.get(namespace)
    }
    fn filter_state(&self, key: &str) -> Option<&dyn FilterStateObject> {
        self.filter_state.get(key).map(|o| o.as_ref())
    }
    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }
}

/// A plaintext-or-TLS session stand-in for tests.
#[derive(Default, Clone)]
pub struct TestTlsSession {
    pub peer_uri_san: Vec<String>,
    pub local_uri_san: Vec<String>,
    pub peer_subject: Option<String>,
    pub local_subject: Option<String>,
    pub session_id: Option<String>,
    pub cipher_suite: Option<String>,
    pub tls_version: Option<String>,
    pub peer_fingerprint_256: Option<String>,
    pub peer_serial: Option<String>,
    pub peer_issuer: Option<String>,
    pub peer_cert_pem: Option<String>,
    pub peer_cert_valid_from: Option<DateTime<Utc>>,
    pub peer_cert_valid_to: Option<DateTime<Utc>>,
}

impl TlsSession for TestTlsSession {
    fn peer_uri_san(&self) -> Vec<String> {
        self.peer_uri_san.clone()
    }
    fn local_uri_san(&self) -> Vec<String> {
        self.local_uri_san.clone()
    }
    fn peer_subject(&self) -> Option<&str> {
        self.peer_subject.as_deref()
    }
    fn local_subject(&self) -> Option<&str> {
        self.local_subject.as_deref()
    }
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
    fn cipher_suite(&self) -> Option<&str> {
        self.cipher_suite.as_deref()
    }
    fn tls_version(&self) -> Option<&str> {
        self.tls_version.as_deref()
    }
    fn peer_fingerprint_256(&self) -> Option<&str> {
        self.peer_fingerprint_256.as_deref()
    }
    fn peer_serial(&self) -> Option<&str> {
        self.peer_serial.as_deref()
    }
    fn peer_issuer(&self) -> Option<&str> {
        self.peer_issuer.as_deref()
    }
    fn peer_cert_pem(&self) -> Option<&str> {
        self.peer_cert_pem.as_deref()
    }
    fn peer_cert_valid_from(&self) -> Option<DateTime<Utc>> {
        self.peer_cert_valid_from
    }
    fn peer_cert_valid_to(&self) -> Option<DateTime<Utc>> {
        self.peer_cert_valid_to
    }
}

/// A filter-state entry that always serializes to the given JSON value.
pub struct StaticFilterState(pub Value);

impl FilterStateObject for StaticFilterState {
    fn serialize(&self) -> Option<Value> {
        Some(self.0.clone())
    }
}

/// A filter-state entry that never serializes, e.g. an opaque WASM value.
pub struct OpaqueFilterState;

impl FilterStateObject for OpaqueFilterState {
    fn serialize(&self) -> Option<Value> {
        None
    }
}

/// A JSON-deserializable sample request, used by the CLI's `render`
/// subcommand to exercise a compiled template without a live proxy.
#[derive(Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextFixture {
    request_headers: HashMap<String, String>,
    response_headers: HashMap<String, String>,
    response_trailers: HashMap<String, String>,
    protocol: Option<String>,
    response_code: Option<u32>,
    bytes_received: u64,
    bytes_sent: u64,
    duration_ms: Option<u64>,
    upstream_host: Option<String>,
    downstream_remote_address: Option<String>,
    requested_server_name: Option<String>,
    route_name: Option<String>,
    start_time: Option<DateTime<Utc>>,
    dynamic_metadata: HashMap<String, Value>,
}

impl ContextFixture {
    /// Build the concrete [`TestContext`] this fixture describes.
    pub fn into_context(self) -> TestContext {
        let mut ctx = TestContext::default();
        for (k, v) in self.request_headers {
            ctx = ctx.with_request_header(&k, &v);
        }
        for (k, v) in self.response_headers {
            ctx = ctx.with_response_header(&k, &v);
        }
        for (k, v) in self.response_trailers {
            ctx = ctx.with_trailer(&k, &v);
        }
        if let Some(protocol) = self.protocol {
            ctx = ctx.with_protocol(&protocol);
        }
        if let Some(code) = self.response_code {
            ctx = ctx.with_response_code(code);
        }
        ctx = ctx.with_bytes(self.bytes_received, self.bytes_sent);
        if let Some(ms) = self.duration_ms {
            ctx = ctx.with_request_complete(Duration::from_millis(ms));
        }
        if let Some(host) = self.upstream_host {
            ctx = ctx.with_upstream_host(&host);
        }
        if let Some(addr) = self.downstream_remote_address {
            ctx = ctx.with_downstream_remote_address(&addr);
        }
        ctx.info.requested_server_name = self.requested_server_name;
        ctx.info.route_name = self.route_name;
        for (ns, value) in self.dynamic_metadata {
            ctx = ctx.with_dynamic_metadata(&ns, value);
        }
        if let Some(start) = self.start_time {
            ctx = ctx.with_start_time(start);
        }
        ctx
    }
}
