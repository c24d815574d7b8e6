//! Ordered regex-substitution masking, applied to a finished log line
//! before it reaches the sink.

use regex::Regex;

/// A single `(pattern, replacement)` substitution. `replacement` supports
/// the `regex` crate's standard `$1`/`${name}` back-reference syntax.
#[derive(Debug, Clone)]
pub struct Mask {
    regex: Regex,
    replacement: String,
}

impl Mask {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }
}

/// An ordered, immutable list of masks applied in configuration order.
/// Overlapping patterns interact order-dependently; that's intentional,
/// users configure the order themselves.
#[derive(Debug, Clone, Default)]
pub struct MaskPipeline {
    masks: Vec<Mask>,
}

impl MaskPipeline {
    pub fn new(masks: Vec<Mask>) -> Self {
        Self { masks }
    }

    /// Apply every mask, in order, to `line`.
    pub fn apply(&self, line: &str) -> String {
        self.masks.iter().fold(line.to_string(), |line, mask| {
            mask.regex.replace_all(&line, mask.replacement.as_str()).into_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_apply_in_order() {
        let pipeline = MaskPipeline::new(vec![
            Mask::new(r"\d{12}(\d{4})", "************$1").unwrap(),
            Mask::new(r"secret", "[REDACTED]").unwrap(),
        ]);
        assert_eq!(
            pipeline.apply("card=1234567812345678 secret=1"),
            "card=************5678 [REDACTED]=1"
        );
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = MaskPipeline::default();
        assert_eq!(pipeline.apply("unchanged"), "unchanged");
    }

    #[test]
    fn backreferences_supported() {
        let pipeline = MaskPipeline::new(vec![Mask::new(r"(\w+)=\S+", "$1=***").unwrap()]);
        assert_eq!(pipeline.apply("token=abc123"), "token=***");
    }
}
