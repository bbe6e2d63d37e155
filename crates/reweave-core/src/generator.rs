//! Template expansion seam.
//!
//! Reconstructing the previous generation means replaying the
//! previous template against the previous input model, both fetched
//! from history. The engine only needs the expansion function; the
//! default implementation renders Handlebars templates over a JSON
//! input model.

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The input model could not be read as JSON.
    #[error("input model is not valid JSON: {0}")]
    Model(#[from] serde_json::Error),

    /// The template itself failed to expand.
    #[error("template rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Expands a template against a serialized input model.
pub trait TemplateExpander {
    fn generate(&self, template: &str, input: &str) -> Result<String, GenerateError>;
}

/// Handlebars-backed expander. Escaping is disabled: the output is
/// source code, not HTML, and `List<String>` must stay `List<String>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlebarsGenerator;

impl HandlebarsGenerator {
    pub fn new() -> Self {
        HandlebarsGenerator
    }
}

impl TemplateExpander for HandlebarsGenerator {
    fn generate(&self, template: &str, input: &str) -> Result<String, GenerateError> {
        let model: Value = serde_json::from_str(input)?;
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Ok(registry.render_template(template, &model)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_placeholders_from_the_model() {
        let generator = HandlebarsGenerator::new();
        let out = generator
            .generate("class {{name}} {}", r#"{"name": "Person"}"#)
            .unwrap();
        assert_eq!(out, "class Person {}");
    }

    #[test]
    fn iterates_collections() {
        let generator = HandlebarsGenerator::new();
        let out = generator
            .generate(
                "{{#each fields}}{{type}} {{name}};\n{{/each}}",
                r#"{"fields": [{"type": "String", "name": "s"}, {"type": "int", "name": "n"}]}"#,
            )
            .unwrap();
        assert_eq!(out, "String s;\nint n;\n");
    }

    #[test]
    fn output_is_not_html_escaped() {
        let generator = HandlebarsGenerator::new();
        let out = generator
            .generate("{{field}}", r#"{"field": "List<String> names"}"#)
            .unwrap();
        assert_eq!(out, "List<String> names");
    }

    #[test]
    fn bad_input_models_are_model_errors() {
        let generator = HandlebarsGenerator::new();
        let err = generator.generate("{{x}}", "not json").unwrap_err();
        assert!(matches!(err, GenerateError::Model(_)));
    }

    #[test]
    fn broken_templates_are_render_errors() {
        let generator = HandlebarsGenerator::new();
        let err = generator.generate("{{#if x}}no closing", "{}").unwrap_err();
        assert!(matches!(err, GenerateError::Render(_)));
    }

    #[test]
    fn absent_fields_expand_to_nothing() {
        let generator = HandlebarsGenerator::new();
        let out = generator.generate("a{{missing}}b", "{}").unwrap();
        assert_eq!(out, "ab");
    }
}
