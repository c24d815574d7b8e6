//! A minimal case-insensitive header map.
//!
//! `http::HeaderName` (and therefore `actix_web`'s) enforces RFC 7230 token
//! syntax, which rejects the `:`-prefixed pseudo-header names
//! (`:METHOD`, `:PATH`, `:AUTHORITY`) that header lookups here must accept
//! verbatim. Real header names never collide with pseudo-headers, so one
//! flat, name-agnostic map covers both.

use indexmap::IndexMap;

/// Header/trailer storage, insertion-ordered, case-insensitive on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: IndexMap<String, String>,
}

impl HeaderMap {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up `name`, matching case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = HeaderMap::default();
        headers.insert("User-Agent", "curl");
        assert_eq!(headers.get("USER-AGENT"), Some("curl"));
        assert_eq!(headers.get("user-agent"), Some("curl"));
    }

    #[test]
    fn pseudo_header_names_accepted() {
        let mut headers = HeaderMap::default();
        headers.insert(":method", "GET");
        assert_eq!(headers.get(":METHOD"), Some("GET"));
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(HeaderMap::default().get("X-Missing"), None);
    }
}
