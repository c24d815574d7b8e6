//! YAML-backed configuration for the CLI: which format to compile, and
//! which masks to run over the finished line. Grounded in the teacher
//! repo's `config::read_config` (file -> `serde_yaml` -> validated struct).

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::format::{format_json, format_line};
use crate::mask::{Mask, MaskPipeline};
use crate::template::{FormatTemplate, JsonTemplate};

/// Top-level access-log configuration: one format (flat or JSON) plus an
/// ordered list of masks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessLogConfig {
    pub format: FormatSpec,
    #[serde(default)]
    pub masks: Vec<MaskSpec>,
}

/// Either a flat format string, or a mapping of field name to format
/// string that's serialized as a JSON object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FormatSpec {
    Line(String),
    Json(IndexMap<String, String>),
}

/// One `(pattern, replacement)` masking rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskSpec {
    pub pattern: String,
    pub replacement: String,
}

/// Load an [`AccessLogConfig`] from a YAML file.
pub fn read_config(path: &Path) -> Result<AccessLogConfig> {
    let s = std::fs::read_to_string(path).context("failed to read config")?;
    let config: AccessLogConfig = serde_yaml::from_str(&s).context("invalid config")?;
    Ok(config)
}

/// A compiled format, either a single line template or a JSON mapping.
pub enum CompiledFormat {
    Line(FormatTemplate),
    Json(JsonTemplate),
}

impl CompiledFormat {
    pub fn evaluate(&self, ctx: &dyn crate::context::Context) -> String {
        match self {
            CompiledFormat::Line(t) => format_line(t, ctx),
            CompiledFormat::Json(t) => format_json(t, ctx),
        }
    }
}

impl AccessLogConfig {
    /// Compile the format and build the mask pipeline, surfacing the first
    /// [`crate::error::CompileError`] as an `anyhow::Error`.
    pub fn compile(&self) -> Result<(CompiledFormat, MaskPipeline)> {
        let format = match &self.format {
            FormatSpec::Line(s) => CompiledFormat::Line(FormatTemplate::compile(s)?),
            FormatSpec::Json(fields) => {
                let fields: Vec<(String, String)> =
                    fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                CompiledFormat::Json(JsonTemplate::compile(fields)?)
            }
        };
        let masks = self
            .masks
            .iter()
            .map(|m| Mask::new(&m.pattern, m.replacement.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("invalid mask pattern: {e}"))?;
        Ok((format, MaskPipeline::new(masks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_format_and_masks() {
        let yaml = r##"
format: "%PROTOCOL% %RESPONSE_CODE%"
masks:
  - pattern: "\\d+"
    replacement: "#"
"##;
        let config: AccessLogConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.format, FormatSpec::Line(_)));
        assert_eq!(config.masks.len(), 1);
        let (_, masks) = config.compile().unwrap();
        assert_eq!(masks.apply("HTTP/1.1 200"), "HTTP/#.# #");
    }

    #[test]
    fn parses_json_format() {
        let yaml = r#"
format:
  m: "%REQ(:METHOD)%"
  code: "%RESPONSE_CODE%"
"#;
        let config: AccessLogConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.format, FormatSpec::Json(_)));
    }

    #[test]
    fn compile_error_propagates() {
        let yaml = r#"format: "%UNKNOWN%""#;
        let config: AccessLogConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.compile().is_err());
    }

    #[test]
    fn evaluate_line_format_does_not_add_its_own_newline() {
        let yaml = r##"format: "%PROTOCOL%\n""##;
        let config: AccessLogConfig = serde_yaml::from_str(yaml).unwrap();
        let (format, masks) = config.compile().unwrap();
        let ctx = crate::testing::TestContext::default().with_protocol("HTTP/1.1");
        let line = masks.apply(&format.evaluate(&ctx));
        assert_eq!(line, "HTTP/1.1\n");
    }

    #[test]
    fn evaluate_default_format_has_exactly_one_trailing_newline() {
        let yaml = format!("format: {:?}", crate::DEFAULT_FORMAT);
        let config: AccessLogConfig = serde_yaml::from_str(&yaml).unwrap();
        let (format, masks) = config.compile().unwrap();
        let ctx = crate::testing::TestContext::default();
        let line = masks.apply(&format.evaluate(&ctx));
        assert!(line.ends_with('\n'));
        assert!(!line.ends_with("\n\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
