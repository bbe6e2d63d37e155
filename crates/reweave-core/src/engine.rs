//! Top-level merge pipeline.
//!
//! The engine owns the settings and the template expander, picks a
//! parser to match the configured granularity, and runs the full
//! sequence: reconstruct the previous generation from its template and
//! input, parse the three texts, reconcile them, and splice the edit
//! set into the current file.

use tracing::debug;

use crate::config::{MergeGranularity, Settings};
use crate::document::{DocRole, Document};
use crate::error::MergeError;
use crate::generator::{HandlebarsGenerator, TemplateExpander};
use crate::parser::{DocumentParser, PlainParser, TreeSitterParser};
use crate::patch;
use crate::reconcile::{reconcile, Reconciliation};

pub struct MergeEngine {
    settings: Settings,
    generator: Box<dyn TemplateExpander>,
}

impl MergeEngine {
    pub fn new(settings: Settings) -> Self {
        Self::with_generator(settings, Box::new(HandlebarsGenerator::new()))
    }

    /// Build an engine around a custom expander, for callers whose
    /// fragments come from something other than Handlebars templates.
    pub fn with_generator(settings: Settings, generator: Box<dyn TemplateExpander>) -> Self {
        MergeEngine {
            settings,
            generator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replay the previous template over the previous input to recover
    /// the text the generator produced last time. With either half of
    /// the history missing there is nothing to replay, and the merge
    /// degrades to insert-only.
    pub fn reconstruct_previous(
        &self,
        previous_template: Option<&str>,
        previous_input: Option<&str>,
    ) -> Result<Option<String>, MergeError> {
        match (previous_template, previous_input) {
            (Some(template), Some(input)) => {
                let text = self.generator.generate(template, input)?;
                debug!(bytes = text.len(), "reconstructed previous generation");
                Ok(Some(text))
            }
            _ => Ok(None),
        }
    }

    /// Merge a freshly generated fragment into the current file,
    /// reconstructing the previous generation from its template and
    /// input first.
    pub fn merge(
        &self,
        current: &str,
        new_fragment: &str,
        previous_template: Option<&str>,
        previous_input: Option<&str>,
    ) -> Result<String, MergeError> {
        let previous = self.reconstruct_previous(previous_template, previous_input)?;
        self.merge_texts(current, new_fragment, previous.as_deref())
    }

    /// Merge with the previous generation already in hand.
    pub fn merge_texts(
        &self,
        current: &str,
        new_fragment: &str,
        previous: Option<&str>,
    ) -> Result<String, MergeError> {
        let reconciliation = self.preview_texts(current, new_fragment, previous)?;
        patch::apply(current, new_fragment, &reconciliation.combined())
    }

    /// Derive the edit set without touching the current file, with the
    /// previous generation reconstructed from its template and input.
    pub fn preview(
        &self,
        current: &str,
        new_fragment: &str,
        previous_template: Option<&str>,
        previous_input: Option<&str>,
    ) -> Result<Reconciliation, MergeError> {
        let previous = self.reconstruct_previous(previous_template, previous_input)?;
        self.preview_texts(current, new_fragment, previous.as_deref())
    }

    /// Derive the edit set for an already-reconstructed trio of texts.
    pub fn preview_texts(
        &self,
        current: &str,
        new_fragment: &str,
        previous: Option<&str>,
    ) -> Result<Reconciliation, MergeError> {
        let parser = self.parser()?;
        let current_doc = parser.parse(current, DocRole::Current)?;
        let new_doc = parser.parse(new_fragment, DocRole::New)?;
        let previous_doc = match previous {
            Some(text) => Some(parser.parse(text, DocRole::Previous)?),
            None => None,
        };
        Ok(reconcile(&current_doc, &new_doc, previous_doc.as_ref()))
    }

    /// Parse one text at the configured granularity. Exposed for
    /// tooling that wants to look at the unit tree itself.
    pub fn parse_document(&self, text: &str, role: DocRole) -> Result<Document, MergeError> {
        Ok(self.parser()?.parse(text, role)?)
    }

    fn parser(&self) -> Result<Box<dyn DocumentParser>, MergeError> {
        match self.settings.granularity {
            MergeGranularity::File => Ok(Box::new(PlainParser::whole_file())),
            MergeGranularity::Line => Ok(Box::new(PlainParser::lines())),
            MergeGranularity::Declaration => {
                let language = self
                    .settings
                    .language
                    .ok_or(MergeError::LanguageRequired)?;
                Ok(Box::new(TreeSitterParser::new(language)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerateError;
    use crate::parser::Language;

    fn engine(granularity: MergeGranularity, language: Option<Language>) -> MergeEngine {
        let mut settings = Settings::default();
        settings.granularity = granularity;
        settings.language = language;
        MergeEngine::new(settings)
    }

    fn java_engine() -> MergeEngine {
        engine(MergeGranularity::Declaration, Some(Language::Java))
    }

    struct FixedExpander(&'static str);

    impl TemplateExpander for FixedExpander {
        fn generate(&self, _template: &str, _input: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn first_generation_into_a_blank_file_is_verbatim() {
        let engine = engine(MergeGranularity::File, None);
        let fragment = "package p;\nclass A {}\n";
        let merged = engine.merge_texts("", fragment, None).unwrap();
        assert_eq!(merged, fragment);
    }

    #[test]
    fn agreeing_documents_merge_to_a_no_op() {
        let engine = engine(MergeGranularity::Line, None);
        let text = "alpha();\nbeta();\n";
        let r = engine.preview_texts(text, text, Some(text)).unwrap();
        assert!(r.is_empty());
        assert_eq!(engine.merge_texts(text, text, Some(text)).unwrap(), text);
    }

    #[test]
    fn new_lines_are_inserted_after_their_anchor() {
        let engine = engine(MergeGranularity::Line, None);
        let merged = engine
            .merge_texts("alpha\nbeta\n", "alpha\nbeta\ngamma\n", None)
            .unwrap();
        assert_eq!(merged, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn merging_twice_changes_nothing_more() {
        let engine = engine(MergeGranularity::Line, None);
        let previous = "a\nold\n";
        let fragment = "a\nnew\n";
        let current = "a\nold\nuser\n";
        let once = engine
            .merge_texts(current, fragment, Some(previous))
            .unwrap();
        assert_eq!(once, "a\nnew\nuser\n");
        let twice = engine.merge_texts(&once, fragment, Some(previous)).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn a_blank_fragment_withdraws_everything_generated() {
        let engine = engine(MergeGranularity::Line, None);
        let merged = engine
            .merge_texts("a\nb\nuser\n", "", Some("a\nb\n"))
            .unwrap();
        assert_eq!(merged, "user\n");
    }

    #[test]
    fn declaration_granularity_requires_a_language() {
        let engine = engine(MergeGranularity::Declaration, None);
        assert!(matches!(
            engine.merge_texts("", "class A {}\n", None),
            Err(MergeError::LanguageRequired)
        ));
    }

    #[test]
    fn a_grown_method_body_keeps_user_statements_in_place() {
        // The template gained a statement; the user had inserted a
        // check of their own. Both end up in the merged body.
        let previous = r#"class Person {
    void setName(String name) {
        this.name = name;
    }
}
"#;
        let fragment = r#"class Person {
    void setName(String name) {
        this.name = name;
        changed = true;
    }
}
"#;
        let current = r#"class Person {
    void setName(String name) {
        check(name);
        this.name = name;
    }
}
"#;
        let merged = java_engine()
            .merge_texts(current, fragment, Some(previous))
            .unwrap();
        assert_eq!(
            merged,
            r#"class Person {
    void setName(String name) {
        check(name);
        this.name = name;
        changed = true;
    }
}
"#
        );
    }

    #[test]
    fn an_added_statement_lands_after_the_existing_assignment() {
        // No history at all: the appended statement is novel and goes
        // in right after the statement both versions share.
        let current = r#"class C {
    void setS(String a) {
        this.s = a;
    }
}
"#;
        let fragment = r#"class C {
    void setS(String a) {
        this.s = a;
        sb.append(a);
    }
}
"#;
        let merged = java_engine().merge_texts(current, fragment, None).unwrap();
        assert_eq!(merged, fragment);
    }

    #[test]
    fn a_dropped_field_disappears_but_hand_written_code_stays() {
        let previous = r#"class Person {
    int age;
    String name;
}
"#;
        let fragment = r#"class Person {
    String name;
}
"#;
        let current = r#"class Person {
    int age;
    String name;
    void greet() {}
}
"#;
        let merged = java_engine()
            .merge_texts(current, fragment, Some(previous))
            .unwrap();
        assert_eq!(
            merged,
            r#"class Person {
    String name;
    void greet() {}
}
"#
        );
    }

    #[test]
    fn a_reworded_statement_is_swapped_in_its_scope() {
        let previous = "class A {\n    old();\n}\n";
        let fragment = "class A {\n    fresh();\n}\n";
        let merged = java_engine()
            .merge_texts(previous, fragment, Some(previous))
            .unwrap();
        assert_eq!(merged, "class A {\n    fresh();\n}\n");
    }

    #[test]
    fn whole_file_granularity_follows_template_drift_only() {
        let engine = engine(MergeGranularity::File, None);
        // Template output changed: the new version wins.
        let merged = engine
            .merge_texts("v1 body\n", "v2 body\n", Some("v1 body\n"))
            .unwrap();
        assert_eq!(merged, "v2 body\n");
        // Template output stable: the user's edit wins.
        let kept = engine
            .merge_texts("user edited\n", "v1\n", Some("v1\n"))
            .unwrap();
        assert_eq!(kept, "user edited\n");
    }

    #[test]
    fn merge_reconstructs_the_previous_generation_from_history() {
        let engine = engine(MergeGranularity::Line, None);
        let template = "alpha();\n{{#if beta}}beta();\n{{/if}}";
        // Last time the input enabled beta; this time the generator
        // emitted alpha alone, so beta is withdrawn.
        let merged = engine
            .merge(
                "alpha();\nbeta();\n",
                "alpha();\n",
                Some(template),
                Some(r#"{"beta": true}"#),
            )
            .unwrap();
        assert_eq!(merged, "alpha();\n");
    }

    #[test]
    fn missing_history_degrades_to_insert_only() {
        let engine = engine(MergeGranularity::Line, None);
        // Without a previous generation nothing can be withdrawn.
        let merged = engine
            .merge("alpha();\nbeta();\n", "alpha();\n", None, Some("{}"))
            .unwrap();
        assert_eq!(merged, "alpha();\nbeta();\n");
    }

    #[test]
    fn an_injected_expander_supplies_the_previous_text() {
        let mut settings = Settings::default();
        settings.granularity = MergeGranularity::Line;
        let engine =
            MergeEngine::with_generator(settings, Box::new(FixedExpander("a\nb\n")));
        let merged = engine
            .merge("a\nb\n", "a\n", Some("ignored"), Some("ignored"))
            .unwrap();
        assert_eq!(merged, "a\n");
    }

    #[test]
    fn preview_reports_edits_without_applying_them() {
        let engine = engine(MergeGranularity::Line, None);
        let r = engine
            .preview_texts("a\nold\n", "a\nnew\n", Some("a\nold\n"))
            .unwrap();
        assert_eq!(r.insertions.len(), 1);
        assert_eq!(r.deletions.len(), 1);
        assert!(r.replacements.is_empty());
        assert_eq!(r.edit_count(), 2);
    }
}
