//! Evaluating a compiled template against a [`Context`] to produce output
//! lines. Evaluation is total: it never fails, and unavailable data always
//! renders as the sentinel.

use crate::context::Context;
use crate::template::{FormatTemplate, JsonTemplate};

/// Evaluate `template` against `ctx`, concatenating every directive's
/// rendering in template order. Never embeds a trailing newline; the
/// template itself (or the caller) is responsible for that.
pub fn format_line(template: &FormatTemplate, ctx: &dyn Context) -> String {
    let mut out = String::with_capacity(256);
    for directive in template.directives() {
        directive.render(ctx, &mut out);
    }
    out
}

/// Evaluate every sub-template in `template`, assembling a single-line
/// JSON object whose values are all JSON strings, followed by `\n`.
///
/// Each sub-template is evaluated exactly once; no ordering between fields
/// is guaranteed. On serialization failure (not expected for string-only
/// values, but the original reports it rather than panicking) a fixed
/// error string is emitted as the log line instead of aborting.
pub fn format_json(template: &JsonTemplate, ctx: &dyn Context) -> String {
    let mut object = serde_json::Map::with_capacity(template.fields().len());
    for (name, sub_template) in template.fields() {
        object.insert(name.clone(), serde_json::Value::String(format_line(sub_template, ctx)));
    }
    let mut line = match serde_json::to_string(&serde_json::Value::Object(object)) {
        Ok(json) => json,
        Err(err) => format!("Error serializing access log to JSON: {err}"),
    };
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[test]
    fn plain_text_round_trips() {
        let template = FormatTemplate::compile("hello, world").unwrap();
        let ctx = TestContext::default();
        assert_eq!(format_line(&template, &ctx), "hello, world");
    }

    #[test]
    fn missing_header_renders_sentinel() {
        let template = FormatTemplate::compile("%REQ(X-MISSING)%").unwrap();
        let ctx = TestContext::default();
        assert_eq!(format_line(&template, &ctx), "-");
    }

    #[test]
    fn response_code_defaults_to_zero() {
        let template = FormatTemplate::compile("%RESPONSE_CODE%").unwrap();
        let ctx = TestContext::default();
        assert_eq!(format_line(&template, &ctx), "0");
    }

    #[test]
    fn order_preservation() {
        let template = FormatTemplate::compile("[%PROTOCOL%] %RESPONSE_CODE% done").unwrap();
        let ctx = TestContext::default().with_protocol("HTTP/1.1").with_response_code(200);
        assert_eq!(format_line(&template, &ctx), "[HTTP/1.1] 200 done");
    }

    #[test]
    fn json_envelope_has_string_fields() {
        let template = JsonTemplate::compile([("m", "%REQ(:METHOD)%"), ("code", "%RESPONSE_CODE%")]).unwrap();
        let ctx = TestContext::default().with_request_header(":METHOD", "POST");
        let line = format_json(&template, &ctx);
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["m"], "POST");
        assert_eq!(value["code"], "0");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn s1_default_template_happy_path() {
        use chrono::TimeZone;

        let template = FormatTemplate::compile(crate::DEFAULT_FORMAT).unwrap();
        let ctx = TestContext::default()
            .with_request_header(":METHOD", "GET")
            .with_request_header(":PATH", "/a")
            .with_request_header(":AUTHORITY", "example.com")
            .with_request_header("X-FORWARDED-FOR", "1.2.3.4")
            .with_request_header("USER-AGENT", "curl")
            .with_request_header("X-REQUEST-ID", "r1")
            .with_protocol("HTTP/1.1")
            .with_response_code(200)
            .with_bytes(10, 20)
            .with_request_complete(std::time::Duration::from_millis(5))
            .with_upstream_host("10.0.0.1:80")
            .with_start_time(chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(
            format_line(&template, &ctx),
            "[2020-01-01T00:00:00.000Z] \"GET /a HTTP/1.1\" 200 - 10 20 5 - \"1.2.3.4\" \"curl\" \"r1\" \"example.com\" \"10.0.0.1:80\"\n"
        );
    }

    #[test]
    fn s2_fallback_and_truncation() {
        let template = FormatTemplate::compile("%REQ(X-ORIG?:PATH)% %REQ(USER-AGENT):4%").unwrap();
        let ctx = TestContext::default()
            .with_request_header(":PATH", "/home")
            .with_request_header("USER-AGENT", "MozillaLongString");
        assert_eq!(format_line(&template, &ctx), "/home Mozi");
    }

    #[test]
    fn s3_tls_absent_renders_sentinel() {
        let template = FormatTemplate::compile("%DOWNSTREAM_TLS_VERSION%").unwrap();
        let ctx = TestContext::default();
        assert_eq!(format_line(&template, &ctx), "-");
    }

    #[test]
    fn s4_duration_floors_to_milliseconds() {
        let template = FormatTemplate::compile("%DURATION%").unwrap();
        let ctx = TestContext::default().with_request_complete(std::time::Duration::from_nanos(1_999_999));
        assert_eq!(format_line(&template, &ctx), "1");
    }

    #[test]
    fn s6_illegal_start_time_pattern_rejected() {
        assert!(matches!(
            FormatTemplate::compile("%START_TIME(%Y-%m-%d%n)%"),
            Err(crate::error::CompileError::IllegalTimePattern)
        ));
    }
}
