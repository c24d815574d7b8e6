//! Hand-written scanner/recursive-descent parser for the format grammar.
//!
//! The grammar (plain text / bare directive / parameterized directive with
//! optional `?ALT` and `:N`) is small enough that a generated parser would
//! be pure overhead; this mirrors the approach note in the design docs and
//! removes a parser-generator dependency the original implementation paid
//! for.

use crate::directive::{BareField, Directive, HeaderLookup};
use crate::error::CompileError;

/// Parse a format string into its ordered directive sequence.
pub fn parse(src: &str) -> Result<Vec<Directive>, CompileError> {
    let mut directives = Vec::new();
    let bytes = src.as_bytes();
    let mut idx = 0usize;

    while idx < src.len() {
        match src[idx..].find('%') {
            None => {
                directives.push(Directive::PlainText(src[idx..].to_string()));
                break;
            }
            Some(offset) => {
                let percent_pos = idx + offset;
                if percent_pos > idx {
                    directives.push(Directive::PlainText(src[idx..percent_pos].to_string()));
                }
                let (directive, next) = parse_directive(src, bytes, percent_pos)?;
                directives.push(directive);
                idx = next;
            }
        }
    }

    Ok(directives)
}

/// `bytes[pos] == b'%'`. Returns the parsed directive and the index just
/// past its closing `%`.
fn parse_directive(
    src: &str,
    bytes: &[u8],
    pos: usize,
) -> Result<(Directive, usize), CompileError> {
    let name_start = pos + 1;
    let name_end = scan_identifier(bytes, name_start);
    if name_end == name_start {
        return Err(CompileError::grammar(format!(
            "invalid directive at byte {pos}: expected a directive name"
        )));
    }
    let name = &src[name_start..name_end];

    match bytes.get(name_end) {
        Some(b'%') => {
            let directive = if name == "START_TIME" {
                Directive::StartTime {
                    pattern: String::new(),
                }
            } else {
                Directive::Bare(BareField::from_name(name)?)
            };
            Ok((directive, name_end + 1))
        }
        Some(b'(') => parse_parameterized(src, bytes, name, name_end + 1),
        _ => Err(CompileError::grammar(format!(
            "invalid directive `{name}` at byte {pos}: expected `%` or `(`"
        ))),
    }
}

/// `bytes[key_start - 1] == b'('`. Parses through the closing `%` of a
/// `FUNC(KEY[?ALT])[:N]%` directive.
fn parse_parameterized(
    src: &str,
    bytes: &[u8],
    func: &str,
    key_start: usize,
) -> Result<(Directive, usize), CompileError> {
    let close_paren = find_byte(bytes, key_start, b')').ok_or_else(|| {
        CompileError::grammar(format!("unterminated `(` in `{func}(...)` directive"))
    })?;
    let key = &src[key_start..close_paren];

    if key.contains('\n') {
        return Err(CompileError::grammar(format!(
            "`{func}` key contains an embedded newline"
        )));
    }
    if key.matches('?').count() > 1 {
        return Err(CompileError::TooManyFallbacks);
    }

    let mut after = close_paren + 1;
    let cap = match bytes.get(after) {
        Some(b'%') => None,
        Some(b':') => {
            let digits_start = after + 1;
            let digits_end =
                find_byte(bytes, digits_start, b'%').ok_or_else(|| {
                    CompileError::grammar(format!("unterminated `{func}(...)` directive"))
                })?;
            let digits = &src[digits_start..digits_end];
            let n = digits
                .parse::<usize>()
                .map_err(|_| CompileError::BadLengthSpec(digits.to_string()))?;
            after = digits_end;
            Some(n)
        }
        _ => {
            return Err(CompileError::grammar(format!(
                "`{func}(...)` must be followed by `:N` or `%`"
            )));
        }
    };
    // `after` now indexes the trailing `%`.
    let end = after + 1;

    let directive = match func {
        "REQ" => Directive::RequestHeader(split_fallback(key, cap)?),
        "RESP" => Directive::ResponseHeader(split_fallback(key, cap)?),
        "TRAILER" => Directive::ResponseTrailer(split_fallback(key, cap)?),
        "DYNAMIC_METADATA" => {
            let mut segments = key.split(':').map(str::to_string);
            let namespace = segments.next().unwrap_or_default();
            Directive::DynamicMetadata {
                namespace,
                path: segments.collect(),
                cap,
            }
        }
        "FILTER_STATE" => Directive::FilterState {
            key: key.to_string(),
            cap,
        },
        "START_TIME" => {
            if cap.is_some() {
                return Err(CompileError::grammar(
                    "START_TIME does not accept a `:N` length cap",
                ));
            }
            if crate::time::contains_illegal_newline(key) {
                return Err(CompileError::IllegalTimePattern);
            }
            Directive::StartTime {
                pattern: key.to_string(),
            }
        }
        other => return Err(CompileError::UnknownDirective(other.to_string())),
    };

    Ok((directive, end))
}

/// Splits a header KEY on its optional `?ALT` separator. The `?`-count
/// limit is already enforced by the caller for every parameterized
/// directive, not just header lookups.
fn split_fallback(key: &str, cap: Option<usize>) -> Result<HeaderLookup, CompileError> {
    let (main, alt) = match key.split_once('?') {
        Some((main, alt)) => (main.to_string(), Some(alt.to_string())),
        None => (key.to_string(), None),
    };
    Ok(HeaderLookup {
        key: main,
        alt,
        cap,
    })
}

fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    match bytes.get(i) {
        Some(&b) if b.is_ascii_uppercase() || b == b'_' => i += 1,
        _ => return start,
    }
    while let Some(&b) = bytes.get(i) {
        if b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_' {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_round_trips() {
        let d = parse("hello world, no directives here").unwrap();
        assert_eq!(d, vec![Directive::PlainText("hello world, no directives here".into())]);
    }

    #[test]
    fn bare_directive() {
        let d = parse("%PROTOCOL%").unwrap();
        assert_eq!(d, vec![Directive::Bare(BareField::Protocol)]);
    }

    #[test]
    fn unknown_bare_directive_rejected() {
        assert!(matches!(parse("%UNKNOWN%"), Err(CompileError::UnknownDirective(_))));
    }

    #[test]
    fn req_with_fallback_and_cap() {
        let d = parse("%REQ(A?B):16%").unwrap();
        assert_eq!(
            d,
            vec![Directive::RequestHeader(HeaderLookup {
                key: "A".into(),
                alt: Some("B".into()),
                cap: Some(16),
            })]
        );
    }

    #[test]
    fn bad_length_spec_rejected() {
        assert!(matches!(parse("%REQ(H):abc%"), Err(CompileError::BadLengthSpec(_))));
    }

    #[test]
    fn too_many_fallbacks_rejected() {
        assert!(matches!(parse("%REQ(A?B?C)%"), Err(CompileError::TooManyFallbacks)));
    }

    #[test]
    fn too_many_fallbacks_rejected_for_dynamic_metadata_and_filter_state() {
        assert!(matches!(
            parse("%DYNAMIC_METADATA(ns?a?b)%"),
            Err(CompileError::TooManyFallbacks)
        ));
        assert!(matches!(
            parse("%FILTER_STATE(A?B?C)%"),
            Err(CompileError::TooManyFallbacks)
        ));
    }

    #[test]
    fn illegal_time_pattern_rejected() {
        assert!(matches!(
            parse("%START_TIME(%Y-%m-%d%n)%"),
            Err(CompileError::IllegalTimePattern)
        ));
    }

    #[test]
    fn unterminated_percent_rejected() {
        assert!(parse("abc%REQ").is_err());
        assert!(parse("abc%").is_err());
    }

    #[test]
    fn dynamic_metadata_splits_on_colon() {
        let d = parse("%DYNAMIC_METADATA(ns:a:b)%").unwrap();
        assert_eq!(
            d,
            vec![Directive::DynamicMetadata {
                namespace: "ns".into(),
                path: vec!["a".into(), "b".into()],
                cap: None,
            }]
        );
    }

    #[test]
    fn default_template_parses() {
        let fmt = crate::DEFAULT_FORMAT;
        assert!(parse(fmt).is_ok());
    }
}
