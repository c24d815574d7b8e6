//! The directive catalog: one variant per recognized template token, and
//! the render logic that turns a [`Context`] into the string it produces.
//!
//! Dispatch is a tagged-variant enum with a `render` method per family,
//! not runtime polymorphism over a trait-object hierarchy — the catalog is
//! closed (the parser rejects unknown names at compile time) so there's no
//! benefit to open dispatch here.

use std::net::SocketAddr;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::context::{Context, header_str};
use crate::error::CompileError;

/// The fixed sentinel rendered whenever a directive's data source is
/// absent. Integer zero for byte counts is a real value, not a sentinel.
pub const SENTINEL: &str = "-";

/// The `REQ`/`RESP`/`TRAILER`/`DYNAMIC_METADATA`/`FILTER_STATE`/
/// `START_TIME` family parameters, shared by all parameterized directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLookup {
    pub key: String,
    pub alt: Option<String>,
    pub cap: Option<usize>,
}

/// One compiled instruction inside a format template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Verbatim text between/around directives.
    PlainText(String),
    /// A bare `%NAME%` directive, resolved against StreamInfo.
    Bare(BareField),
    /// `%REQ(KEY[?ALT])[:N]%`
    RequestHeader(HeaderLookup),
    /// `%RESP(KEY[?ALT])[:N]%`
    ResponseHeader(HeaderLookup),
    /// `%TRAILER(KEY[?ALT])[:N]%`
    ResponseTrailer(HeaderLookup),
    /// `%DYNAMIC_METADATA(NS:p1:p2:...)[:N]%`
    DynamicMetadata {
        namespace: String,
        path: Vec<String>,
        cap: Option<usize>,
    },
    /// `%FILTER_STATE(KEY)[:N]%`
    FilterState { key: String, cap: Option<usize> },
    /// `%START_TIME(PATTERN)%`, empty pattern means "use the default".
    StartTime { pattern: String },
}

impl Directive {
    /// Evaluate this directive against `ctx`, appending the result to
    /// `out`. Total: never fails, never panics on missing data.
    pub fn render(&self, ctx: &dyn Context, out: &mut String) {
        match self {
            Directive::PlainText(s) => out.push_str(s),
            Directive::Bare(field) => out.push_str(&field.render(ctx.stream_info())),
            Directive::RequestHeader(lookup) => {
                render_header(ctx.request_headers(), lookup, out)
            }
            Directive::ResponseHeader(lookup) => {
                render_header(ctx.response_headers(), lookup, out)
            }
            Directive::ResponseTrailer(lookup) => {
                render_header(ctx.response_trailers(), lookup, out)
            }
            Directive::DynamicMetadata {
                namespace,
                path,
                cap,
            } => render_dynamic_metadata(ctx, namespace, path, *cap, out),
            Directive::FilterState { key, cap } => render_filter_state(ctx, key, *cap, out),
            Directive::StartTime { pattern } => {
                let start = ctx.stream_info().start_time();
                out.push_str(&crate::time::format_start_time(pattern, start));
            }
        }
    }
}

fn render_header(headers: &crate::headers::HeaderMap, lookup: &HeaderLookup, out: &mut String) {
    let value = header_str(headers, &lookup.key).filter(|v| !v.is_empty()).or_else(|| {
        lookup
            .alt
            .as_deref()
            .and_then(|alt| header_str(headers, alt))
    });
    match value {
        Some(v) => out.push_str(&truncate(v, lookup.cap)),
        None => out.push_str(SENTINEL),
    }
}

fn render_dynamic_metadata(
    ctx: &dyn Context,
    namespace: &str,
    path: &[String],
    cap: Option<usize>,
    out: &mut String,
) {
    let Some(root) = ctx.stream_info().dynamic_metadata(namespace) else {
        out.push_str(SENTINEL);
        return;
    };
    let resolved = path
        .iter()
        .try_fold(root, |value, segment| value.get(segment.as_str()));
    match resolved {
        Some(value) => match serde_json::to_string(value) {
            Ok(json) => out.push_str(&truncate(&json, cap)),
            Err(_) => out.push_str(SENTINEL),
        },
        None => out.push_str(SENTINEL),
    }
}

fn render_filter_state(ctx: &dyn Context, key: &str, cap: Option<usize>, out: &mut String) {
    let Some(object) = ctx.stream_info().filter_state(key) else {
        out.push_str(SENTINEL);
        return;
    };
    match object.serialize().and_then(|v| serde_json::to_string(&v).ok()) {
        Some(json) => out.push_str(&truncate(&json, cap)),
        None => out.push_str(SENTINEL),
    }
}

/// Byte-prefix truncation, codepoint-agnostic as specified.
fn truncate(s: &str, cap: Option<usize>) -> std::borrow::Cow<'_, str> {
    match cap {
        Some(n) if s.len() > n => {
            let mut end = n;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            std::borrow::Cow::Borrowed(&s[..end])
        }
        _ => std::borrow::Cow::Borrowed(s),
    }
}

/// The set of recognized `%NAME%` bare directives, each evaluated purely
/// against [`crate::context::StreamInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BareField {
    Protocol,
    ResponseCode,
    ResponseCodeDetails,
    ResponseFlags,
    BytesReceived,
    BytesSent,
    Duration,
    RequestDuration,
    ResponseDuration,
    ResponseTxDuration,
    UpstreamHost,
    UpstreamCluster,
    UpstreamLocalAddress,
    UpstreamTransportFailureReason,
    DownstreamLocalAddress,
    DownstreamRemoteAddress,
    DownstreamDirectRemoteAddress,
    DownstreamLocalAddressWithoutPort,
    DownstreamRemoteAddressWithoutPort,
    DownstreamDirectRemoteAddressWithoutPort,
    RequestedServerName,
    RouteName,
    DownstreamPeerUriSan,
    DownstreamLocalUriSan,
    DownstreamPeerSubject,
    DownstreamLocalSubject,
    DownstreamTlsSessionId,
    DownstreamTlsCipher,
    DownstreamTlsVersion,
    DownstreamPeerFingerprint256,
    DownstreamPeerSerial,
    DownstreamPeerIssuer,
    DownstreamPeerCert,
    DownstreamPeerCertVStart,
    DownstreamPeerCertVEnd,
}

impl BareField {
    /// Resolve a `%NAME%` identifier into a catalog entry.
    ///
    /// `START_TIME` without parens is handled by the parser before this is
    /// reached (it compiles to `Directive::StartTime` with an empty
    /// pattern, not a `BareField`).
    pub fn from_name(name: &str) -> Result<Self, CompileError> {
        use BareField::*;
        Ok(match name {
            "PROTOCOL" => Protocol,
            "RESPONSE_CODE" => ResponseCode,
            "RESPONSE_CODE_DETAILS" => ResponseCodeDetails,
            "RESPONSE_FLAGS" => ResponseFlags,
            "BYTES_RECEIVED" => BytesReceived,
            "BYTES_SENT" => BytesSent,
            "DURATION" => Duration,
            "REQUEST_DURATION" => RequestDuration,
            "RESPONSE_DURATION" => ResponseDuration,
            "RESPONSE_TX_DURATION" => ResponseTxDuration,
            "UPSTREAM_HOST" => UpstreamHost,
            "UPSTREAM_CLUSTER" => UpstreamCluster,
            "UPSTREAM_LOCAL_ADDRESS" => UpstreamLocalAddress,
            "UPSTREAM_TRANSPORT_FAILURE_REASON" => UpstreamTransportFailureReason,
            "DOWNSTREAM_LOCAL_ADDRESS" => DownstreamLocalAddress,
            "DOWNSTREAM_REMOTE_ADDRESS" => DownstreamRemoteAddress,
            "DOWNSTREAM_DIRECT_REMOTE_ADDRESS" => DownstreamDirectRemoteAddress,
            "DOWNSTREAM_LOCAL_ADDRESS_WITHOUT_PORT" => DownstreamLocalAddressWithoutPort,
            "DOWNSTREAM_REMOTE_ADDRESS_WITHOUT_PORT" => DownstreamRemoteAddressWithoutPort,
            "DOWNSTREAM_DIRECT_REMOTE_ADDRESS_WITHOUT_PORT" => {
                DownstreamDirectRemoteAddressWithoutPort
            }
            "REQUESTED_SERVER_NAME" => RequestedServerName,
            "ROUTE_NAME" => RouteName,
            "DOWNSTREAM_PEER_URI_SAN" => DownstreamPeerUriSan,
            "DOWNSTREAM_LOCAL_URI_SAN" => DownstreamLocalUriSan,
            "DOWNSTREAM_PEER_SUBJECT" => DownstreamPeerSubject,
            "DOWNSTREAM_LOCAL_SUBJECT" => DownstreamLocalSubject,
            "DOWNSTREAM_TLS_SESSION_ID" => DownstreamTlsSessionId,
            "DOWNSTREAM_TLS_CIPHER" => DownstreamTlsCipher,
            "DOWNSTREAM_TLS_VERSION" => DownstreamTlsVersion,
            "DOWNSTREAM_PEER_FINGERPRINT_256" => DownstreamPeerFingerprint256,
            "DOWNSTREAM_PEER_SERIAL" => DownstreamPeerSerial,
            "DOWNSTREAM_PEER_ISSUER" => DownstreamPeerIssuer,
            "DOWNSTREAM_PEER_CERT" => DownstreamPeerCert,
            "DOWNSTREAM_PEER_CERT_V_START" => DownstreamPeerCertVStart,
            "DOWNSTREAM_PEER_CERT_V_END" => DownstreamPeerCertVEnd,
            other => return Err(CompileError::UnknownDirective(other.to_string())),
        })
    }

    fn render(&self, info: &dyn crate::context::StreamInfo) -> String {
        use BareField::*;
        match self {
            Protocol => info.protocol().unwrap_or(SENTINEL).to_string(),
            ResponseCode => info
                .response_code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "0".to_string()),
            ResponseCodeDetails => info.response_code_details().unwrap_or(SENTINEL).to_string(),
            ResponseFlags => info.response_flags().to_string(),
            BytesReceived => info.bytes_received().to_string(),
            BytesSent => info.bytes_sent().to_string(),
            Duration => duration_ms(info.request_complete()),
            RequestDuration => duration_ms(info.last_downstream_rx_byte_received()),
            ResponseDuration => duration_ms(info.first_upstream_rx_byte_received()),
            ResponseTxDuration => {
                match (
                    info.last_downstream_tx_byte_sent(),
                    info.first_upstream_rx_byte_received(),
                ) {
                    (Some(tx), Some(rx)) if tx >= rx => (tx - rx).as_millis().to_string(),
                    _ => SENTINEL.to_string(),
                }
            }
            UpstreamHost => info.upstream_host().unwrap_or(SENTINEL).to_string(),
            UpstreamCluster => non_empty(info.upstream_cluster()),
            UpstreamLocalAddress => info.upstream_local_address().unwrap_or(SENTINEL).to_string(),
            UpstreamTransportFailureReason => non_empty(info.upstream_transport_failure_reason()),
            DownstreamLocalAddress => info.downstream_local_address().unwrap_or(SENTINEL).to_string(),
            DownstreamRemoteAddress => info.downstream_remote_address().unwrap_or(SENTINEL).to_string(),
            DownstreamDirectRemoteAddress => info
                .downstream_direct_remote_address()
                .unwrap_or(SENTINEL)
                .to_string(),
            DownstreamLocalAddressWithoutPort => {
                strip_port(info.downstream_local_address())
            }
            DownstreamRemoteAddressWithoutPort => {
                strip_port(info.downstream_remote_address())
            }
            DownstreamDirectRemoteAddressWithoutPort => {
                strip_port(info.downstream_direct_remote_address())
            }
            RequestedServerName => non_empty(info.requested_server_name()),
            RouteName => non_empty(info.route_name()),
            DownstreamPeerUriSan => join_san(info, |tls| tls.peer_uri_san()),
            DownstreamLocalUriSan => join_san(info, |tls| tls.local_uri_san()),
            DownstreamPeerSubject => tls_str(info, |tls| tls.peer_subject()),
            DownstreamLocalSubject => tls_str(info, |tls| tls.local_subject()),
            DownstreamTlsSessionId => tls_str(info, |tls| tls.session_id()),
            DownstreamTlsCipher => tls_str(info, |tls| tls.cipher_suite()),
            DownstreamTlsVersion => tls_str(info, |tls| tls.tls_version()),
            DownstreamPeerFingerprint256 => tls_str(info, |tls| tls.peer_fingerprint_256()),
            DownstreamPeerSerial => tls_str(info, |tls| tls.peer_serial()),
            DownstreamPeerIssuer => tls_str(info, |tls| tls.peer_issuer()),
            DownstreamPeerCert => match info.downstream_tls().and_then(|tls| tls.peer_cert_pem()) {
                Some(pem) if !pem.is_empty() => url_encode(pem),
                _ => SENTINEL.to_string(),
            },
            DownstreamPeerCertVStart => tls_time(info, |tls| tls.peer_cert_valid_from()),
            DownstreamPeerCertVEnd => tls_time(info, |tls| tls.peer_cert_valid_to()),
        }
    }
}

fn duration_ms(d: Option<Duration>) -> String {
    match d {
        Some(d) => d.as_millis().to_string(),
        None => SENTINEL.to_string(),
    }
}

fn non_empty(s: Option<&str>) -> String {
    match s {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => SENTINEL.to_string(),
    }
}

fn strip_port(addr: Option<&str>) -> String {
    match addr {
        None => SENTINEL.to_string(),
        Some(addr) => match addr.parse::<SocketAddr>() {
            Ok(sock) => sock.ip().to_string(),
            Err(_) => addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr).to_string(),
        },
    }
}

fn join_san(
    info: &dyn crate::context::StreamInfo,
    f: impl Fn(&dyn crate::context::TlsSession) -> Vec<String>,
) -> String {
    match info.downstream_tls() {
        Some(tls) => {
            let sans = f(tls);
            if sans.is_empty() {
                SENTINEL.to_string()
            } else {
                sans.join(",")
            }
        }
        None => SENTINEL.to_string(),
    }
}

fn tls_str<'a>(
    info: &'a dyn crate::context::StreamInfo,
    f: impl Fn(&'a dyn crate::context::TlsSession) -> Option<&'a str>,
) -> String {
    match info.downstream_tls().and_then(f) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => SENTINEL.to_string(),
    }
}

fn tls_time(
    info: &dyn crate::context::StreamInfo,
    f: impl Fn(&dyn crate::context::TlsSession) -> Option<chrono::DateTime<chrono::Utc>>,
) -> String {
    match info.downstream_tls().and_then(f) {
        Some(t) => crate::time::format_start_time("", t),
        None => SENTINEL.to_string(),
    }
}

/// The percent-encoding alphabet used for `DOWNSTREAM_PEER_CERT`: anything
/// that isn't alphanumeric, matching a URL query component.
const PEM_ENCODE_SET: &AsciiSet = NON_ALPHANUMERIC;

fn url_encode(pem: &str) -> String {
    utf8_percent_encode(pem, PEM_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bare_field_rejected() {
        assert!(matches!(
            BareField::from_name("NOT_A_FIELD"),
            Err(CompileError::UnknownDirective(_))
        ));
    }

    #[test]
    fn truncate_is_byte_prefix() {
        assert_eq!(truncate("hello", Some(3)), "hel");
        assert_eq!(truncate("hi", Some(10)), "hi");
        assert_eq!(truncate("hi", None), "hi");
    }

    #[test]
    fn strip_port_handles_ipv4_and_ipv6() {
        assert_eq!(strip_port(Some("10.0.0.1:80")), "10.0.0.1");
        assert_eq!(strip_port(Some("[::1]:443")), "::1");
        assert_eq!(strip_port(None), SENTINEL);
    }

    #[test]
    fn every_bare_field_sentinels_on_empty_context() {
        use crate::testing::TestContext;

        let ctx = TestContext::default();
        let names = [
            "PROTOCOL",
            "RESPONSE_CODE_DETAILS",
            "RESPONSE_FLAGS",
            "DURATION",
            "REQUEST_DURATION",
            "RESPONSE_DURATION",
            "RESPONSE_TX_DURATION",
            "UPSTREAM_HOST",
            "UPSTREAM_CLUSTER",
            "UPSTREAM_LOCAL_ADDRESS",
            "UPSTREAM_TRANSPORT_FAILURE_REASON",
            "DOWNSTREAM_LOCAL_ADDRESS",
            "DOWNSTREAM_REMOTE_ADDRESS",
            "DOWNSTREAM_DIRECT_REMOTE_ADDRESS",
            "DOWNSTREAM_LOCAL_ADDRESS_WITHOUT_PORT",
            "DOWNSTREAM_REMOTE_ADDRESS_WITHOUT_PORT",
            "DOWNSTREAM_DIRECT_REMOTE_ADDRESS_WITHOUT_PORT",
            "REQUESTED_SERVER_NAME",
            "ROUTE_NAME",
            "DOWNSTREAM_PEER_URI_SAN",
            "DOWNSTREAM_LOCAL_URI_SAN",
            "DOWNSTREAM_PEER_SUBJECT",
            "DOWNSTREAM_LOCAL_SUBJECT",
            "DOWNSTREAM_TLS_SESSION_ID",
            "DOWNSTREAM_TLS_CIPHER",
            "DOWNSTREAM_TLS_VERSION",
            "DOWNSTREAM_PEER_FINGERPRINT_256",
            "DOWNSTREAM_PEER_SERIAL",
            "DOWNSTREAM_PEER_ISSUER",
            "DOWNSTREAM_PEER_CERT",
            "DOWNSTREAM_PEER_CERT_V_START",
            "DOWNSTREAM_PEER_CERT_V_END",
        ];
        for name in names {
            let field = BareField::from_name(name).unwrap();
            assert_eq!(field.render(ctx.stream_info()), SENTINEL, "field {name} should sentinel");
        }
        // Documented exceptions to the sentinel rule.
        let response_code = BareField::from_name("RESPONSE_CODE").unwrap();
        assert_eq!(response_code.render(ctx.stream_info()), "0");
        let bytes_received = BareField::from_name("BYTES_RECEIVED").unwrap();
        assert_eq!(bytes_received.render(ctx.stream_info()), "0");
        let bytes_sent = BareField::from_name("BYTES_SENT").unwrap();
        assert_eq!(bytes_sent.render(ctx.stream_info()), "0");
    }
}
