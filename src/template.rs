//! Compiled templates: immutable, evaluable any number of times.

use indexmap::IndexMap;

use crate::directive::Directive;
use crate::error::CompileError;
use crate::parser;

/// A compiled flat-line format template.
///
/// Built once via [`FormatTemplate::compile`]; evaluation never mutates
/// it, so the same template can be shared across concurrent callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    directives: Vec<Directive>,
}

impl FormatTemplate {
    /// Compile a format string into its directive sequence.
    pub fn compile(format: &str) -> Result<Self, CompileError> {
        log::trace!("compiling access log format: {format}");
        let directives = parser::parse(format)?;
        Ok(Self { directives })
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}

/// A named collection of sub-templates whose evaluations become the
/// fields of one JSON object. Field order has no semantic meaning; an
/// [`IndexMap`] is used anyway so iteration order is deterministic for
/// reproducible test fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonTemplate {
    fields: IndexMap<String, FormatTemplate>,
}

impl JsonTemplate {
    /// Compile a `field name -> format string` mapping into a JSON
    /// template, failing on the first field whose format string doesn't
    /// compile.
    pub fn compile<I, S>(fields: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, format)| {
                FormatTemplate::compile(format.as_ref()).map(|t| (name.as_ref().to_string(), t))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &IndexMap<String, FormatTemplate> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiling_twice_is_identical() {
        let a = FormatTemplate::compile("%PROTOCOL% %RESPONSE_CODE%").unwrap();
        let b = FormatTemplate::compile("%PROTOCOL% %RESPONSE_CODE%").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn json_template_compiles_each_field() {
        let t = JsonTemplate::compile([("m", "%REQ(:METHOD)%"), ("code", "%RESPONSE_CODE%")]).unwrap();
        assert_eq!(t.fields().len(), 2);
    }

    #[test]
    fn json_template_propagates_compile_error() {
        assert!(JsonTemplate::compile([("bad", "%UNKNOWN%")]).is_err());
    }
}
