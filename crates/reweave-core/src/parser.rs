//! Document parsers: turn text into the node trees the locator
//! matches over.
//!
//! Declaration granularity goes through tree-sitter. The tree is cut
//! down to two levels of interest: named program elements become
//! declaration nodes (recursing through their bodies), everything
//! else inside a body becomes a statement leaf whose identity is its
//! whitespace-normalized text. File and line granularity need no
//! grammar and go through [`PlainParser`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{
    normalize_text, DocRole, Document, DocumentBuilder, NodeId, NodeKind, Signature, UnitKind,
};
use crate::location::{LineIndex, Location};

/// Languages with bundled grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Java,
    Go,
    C,
    Cpp,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "rs" => Some(Language::Rust),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" => Some(Language::TypeScript),
            "py" | "pyi" => Some(Language::Python),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Language> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// Node kinds treated as declarations. Anything else inside a
    /// body is a statement leaf.
    fn declaration_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "union_item",
                "trait_item",
                "impl_item",
                "mod_item",
                "const_item",
                "static_item",
                "type_item",
            ],
            Language::JavaScript => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
                "method_definition",
                "field_definition",
                "lexical_declaration",
                "variable_declaration",
            ],
            Language::TypeScript => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
                "abstract_class_declaration",
                "method_definition",
                "public_field_definition",
                "interface_declaration",
                "enum_declaration",
                "type_alias_declaration",
                "lexical_declaration",
                "variable_declaration",
            ],
            Language::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Language::Java => &[
                "class_declaration",
                "interface_declaration",
                "enum_declaration",
                "record_declaration",
                "annotation_type_declaration",
                "method_declaration",
                "constructor_declaration",
                "field_declaration",
            ],
            Language::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
                "const_declaration",
                "var_declaration",
            ],
            Language::C => &[
                "function_definition",
                "declaration",
                "struct_specifier",
                "enum_specifier",
                "union_specifier",
                "type_definition",
            ],
            Language::Cpp => &[
                "function_definition",
                "declaration",
                "struct_specifier",
                "class_specifier",
                "enum_specifier",
                "union_specifier",
                "type_definition",
                "namespace_definition",
                "template_declaration",
            ],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
        };
        f.write_str(name)
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Language::Rust),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "go" => Ok(Language::Go),
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load {language} grammar: {message}")]
    Grammar { language: Language, message: String },

    #[error("{role} document has syntax errors")]
    Syntax { role: DocRole },

    #[error("{role} document could not be parsed")]
    Unparsable { role: DocRole },
}

/// Seam between the engine and whatever produces node trees.
/// Embedders with their own front end implement this and hand the
/// engine pre-parsed documents.
pub trait DocumentParser {
    fn parse(&self, text: &str, role: DocRole) -> Result<Document, ParseError>;
}

/// Grammar-free parser for the file and line granularities.
#[derive(Debug, Clone, Copy)]
pub struct PlainParser {
    unit: UnitKind,
}

impl PlainParser {
    /// One unit spanning the whole document; none at all when the
    /// document is blank.
    pub fn whole_file() -> Self {
        PlainParser {
            unit: UnitKind::File,
        }
    }

    /// One unit per non-blank line, spanning the line and its
    /// newline. Blank lines are formatting and carry no identity.
    pub fn lines() -> Self {
        PlainParser {
            unit: UnitKind::Line,
        }
    }
}

impl DocumentParser for PlainParser {
    fn parse(&self, text: &str, role: DocRole) -> Result<Document, ParseError> {
        let mut b = DocumentBuilder::new(role, text);
        match self.unit {
            UnitKind::File => {
                if !text.trim().is_empty() {
                    let loc = b.index().location_of(0..text.len());
                    b.add(
                        b.root(),
                        NodeKind::Custom(UnitKind::File),
                        Signature::new("<file>"),
                        loc,
                    );
                }
            }
            UnitKind::Line => {
                let line_count = b.index().line_count() as u32;
                for line in 1..=line_count {
                    let range = b.index().line_range(line);
                    let content = &text[range.clone()];
                    if content.trim().is_empty() {
                        continue;
                    }
                    let loc = b.index().location_of(range);
                    let sig = Signature::new(content.trim());
                    b.add(b.root(), NodeKind::Custom(UnitKind::Line), sig, loc);
                }
            }
        }
        Ok(b.finish())
    }
}

/// Syntax-aware parser for declaration granularity.
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterParser {
    language: Language,
}

impl TreeSitterParser {
    pub fn new(language: Language) -> Self {
        TreeSitterParser { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

impl DocumentParser for TreeSitterParser {
    fn parse(&self, text: &str, role: DocRole) -> Result<Document, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.language.grammar())
            .map_err(|e| ParseError::Grammar {
                language: self.language,
                message: e.to_string(),
            })?;
        let tree = parser
            .parse(text, None)
            .ok_or(ParseError::Unparsable { role })?;
        if tree.root_node().has_error() {
            return Err(ParseError::Syntax { role });
        }
        let mut b = DocumentBuilder::new(role, text);
        let root = b.root();
        collect_scope(self.language, tree.root_node(), text, &mut b, root);
        Ok(b.finish())
    }
}

fn ts_location(node: tree_sitter::Node<'_>) -> Location {
    let start = node.start_position();
    let end = node.end_position();
    Location::new(
        start.row as u32 + 1,
        start.column as u32 + 1,
        end.row as u32 + 1,
        end.column as u32 + 1,
    )
}

fn node_source<'a>(node: tree_sitter::Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Caret just inside a body: after the opening brace when there is
/// one, at the body's start otherwise.
fn body_open_caret(body: tree_sitter::Node<'_>, source: &str, index: &LineIndex) -> Location {
    let start = body.start_byte();
    let open = if source[start..].starts_with('{') {
        start + 1
    } else {
        start
    };
    let (line, col) = index.point_of(open);
    Location::caret(line, col)
}

fn collect_scope(
    language: Language,
    scope: tree_sitter::Node<'_>,
    source: &str,
    b: &mut DocumentBuilder,
    parent: NodeId,
) {
    let declaration_kinds = language.declaration_kinds();
    let mut cursor = scope.walk();
    let children: Vec<tree_sitter::Node<'_>> = scope.named_children(&mut cursor).collect();
    for child in children {
        let kind = child.kind();
        if kind.contains("comment") {
            continue;
        }
        if declaration_kinds.contains(&kind) {
            // Decorators and annotations are part of the declaration
            // span; the signature comes from the wrapped definition.
            let sig_node = if kind == "decorated_definition" {
                child.child_by_field_name("definition").unwrap_or(child)
            } else {
                child
            };
            let signature = declaration_signature(language, sig_node, source);
            let location = ts_location(child);
            match sig_node.child_by_field_name("body") {
                Some(body) => {
                    let open = body_open_caret(body, source, b.index());
                    let id = b.add_container(
                        parent,
                        NodeKind::Declaration,
                        signature,
                        location,
                        Some(open),
                    );
                    collect_scope(language, body, source, b, id);
                }
                None => {
                    b.add(parent, NodeKind::Declaration, signature, location);
                }
            }
        } else {
            let signature = Signature::new(normalize_text(node_source(child, source)));
            b.add(parent, NodeKind::Statement, signature, ts_location(child));
        }
    }
}

/// Identity of a declaration: its syntactic category plus the
/// semantically relevant parts, such as the declared name, parameter
/// types, and modifiers. The body never contributes, so two versions
/// of the same element keep one identity while their texts drift.
fn declaration_signature(
    language: Language,
    node: tree_sitter::Node<'_>,
    source: &str,
) -> Signature {
    let mut parts: Vec<String> = vec![node.kind().to_string()];
    match (language, node.kind()) {
        (Language::Java, "field_declaration") => {
            if let Some(ty) = node.child_by_field_name("type") {
                parts.push(normalize_text(node_source(ty, source)));
            }
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator.child_by_field_name("name") {
                    parts.push(node_source(name, source).to_string());
                }
            }
        }
        (Language::Java, "method_declaration" | "constructor_declaration") => {
            if let Some(name) = node.child_by_field_name("name") {
                parts.push(node_source(name, source).to_string());
            }
            parts.push(java_parameter_types(node, source));
        }
        (Language::Rust, "impl_item") => {
            if let Some(tr) = node.child_by_field_name("trait") {
                parts.push(normalize_text(node_source(tr, source)));
            }
            if let Some(ty) = node.child_by_field_name("type") {
                parts.push(normalize_text(node_source(ty, source)));
            }
        }
        _ => {
            if let Some(name) = node.child_by_field_name("name") {
                parts.push(normalize_text(node_source(name, source)));
            } else if let Some(declarator) = node.child_by_field_name("declarator") {
                parts.push(normalize_text(node_source(declarator, source)));
            }
            if let Some(params) = node.child_by_field_name("parameters") {
                parts.push(normalize_text(node_source(params, source)));
            }
        }
    }
    if language == Language::Java {
        if let Some(mods) = java_modifiers(node, source) {
            parts.push(mods);
        }
    }
    Signature::new(parts.join(" "))
}

/// Parameter types only, names stripped, so a renamed parameter does
/// not change a method's identity.
fn java_parameter_types(node: tree_sitter::Node<'_>, source: &str) -> String {
    let mut types = Vec::new();
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if let Some(ty) = param.child_by_field_name("type") {
                types.push(normalize_text(node_source(ty, source)));
            }
        }
    }
    format!("({})", types.join(","))
}

/// Sorted modifier tokens, annotations included. Sorting makes the
/// identity order-insensitive.
fn java_modifiers(node: tree_sitter::Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let mods = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "modifiers")?;
    let mut tokens: Vec<&str> = node_source(mods, source).split_whitespace().collect();
    tokens.sort_unstable();
    Some(tokens.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_java(text: &str) -> Document {
        TreeSitterParser::new(Language::Java)
            .parse(text, DocRole::Current)
            .unwrap()
    }

    const PERSON: &str = "\
public class Person {
    private String s;

    public void setS(String a) {
        this.s = a;
    }
}
";

    #[test]
    fn java_classes_nest_members_under_the_class() {
        let doc = parse_java(PERSON);
        let root = doc.root();
        assert_eq!(root.children.len(), 1);
        let class = doc.node(root.children[0]);
        assert_eq!(class.kind, NodeKind::Declaration);
        assert_eq!(class.children.len(), 2);
        let field = doc.node(class.children[0]);
        let method = doc.node(class.children[1]);
        assert!(field.is_leaf());
        assert_eq!(method.children.len(), 1);
        let stmt = doc.node(method.children[0]);
        assert_eq!(stmt.kind, NodeKind::Statement);
        assert_eq!(doc.node_text(stmt.id), "this.s = a;");
    }

    #[test]
    fn method_identity_tracks_parameter_types_not_names() {
        let a = parse_java("class C { void m(String a) {} }");
        let b = parse_java("class C { void m(String renamed) {} }");
        let c = parse_java("class C { void m(int a) {} }");
        let sig = |doc: &Document| doc.node(doc.node(1).children[0]).signature.clone();
        assert_eq!(sig(&a), sig(&b));
        assert_ne!(sig(&a), sig(&c));
    }

    #[test]
    fn field_identity_ignores_the_initializer() {
        let a = parse_java("class C { private int count = 0; }");
        let b = parse_java("class C { private int count = 1; }");
        let c = parse_java("class C { private int total = 0; }");
        let sig = |doc: &Document| doc.node(doc.node(1).children[0]).signature.clone();
        assert_eq!(sig(&a), sig(&b));
        assert_ne!(sig(&a), sig(&c));
    }

    #[test]
    fn modifier_changes_change_identity() {
        let a = parse_java("class C { public int count; }");
        let b = parse_java("class C { private int count; }");
        let sig = |doc: &Document| doc.node(doc.node(1).children[0]).signature.clone();
        assert_ne!(sig(&a), sig(&b));
    }

    #[test]
    fn statement_identity_is_normalized_text() {
        let a = parse_java("class C { void m() { this.s   = a; } }");
        let b = parse_java("class C { void m() { this.s = a; } }");
        let stmt = |doc: &Document| {
            let method = doc.node(1).children[0];
            doc.node(doc.node(method).children[0]).signature.clone()
        };
        assert_eq!(stmt(&a), stmt(&b));
    }

    #[test]
    fn body_open_caret_sits_after_the_brace() {
        let doc = parse_java("class C {\n}\n");
        let class = doc.node(1);
        assert_eq!(class.body_insert, Some(Location::caret(1, 10)));
        assert!(class.is_leaf());
    }

    #[test]
    fn syntax_errors_name_the_failing_document() {
        let err = TreeSitterParser::new(Language::Java)
            .parse("class C { void m( }", DocRole::New)
            .unwrap_err();
        assert!(matches!(err, ParseError::Syntax { role: DocRole::New }));
        assert_eq!(err.to_string(), "new document has syntax errors");
    }

    #[test]
    fn empty_text_parses_to_no_units() {
        let doc = parse_java("");
        assert_eq!(doc.node_count(), 1);
        assert!(doc.is_blank());
    }

    #[test]
    fn rust_declarations_are_recognized() {
        let doc = TreeSitterParser::new(Language::Rust)
            .parse(
                "struct Point { x: i32 }\n\nfn origin() -> Point {\n    Point { x: 0 }\n}\n",
                DocRole::Current,
            )
            .unwrap();
        assert_eq!(doc.root().children.len(), 2);
        let strukt = doc.node(doc.root().children[0]);
        let func = doc.node(doc.root().children[1]);
        assert_eq!(strukt.kind, NodeKind::Declaration);
        assert_eq!(func.kind, NodeKind::Declaration);
        assert_ne!(strukt.signature, func.signature);
    }

    #[test]
    fn python_decorated_functions_keep_the_inner_identity() {
        let parser = TreeSitterParser::new(Language::Python);
        let plain = parser
            .parse("def f():\n    return 1\n", DocRole::Current)
            .unwrap();
        let decorated = parser
            .parse("@wraps\ndef f():\n    return 1\n", DocRole::Current)
            .unwrap();
        let sig = |doc: &Document| doc.node(doc.root().children[0]).signature.clone();
        assert_eq!(sig(&plain), sig(&decorated));
        // The span still covers the decorator.
        let node = decorated.node(decorated.root().children[0]);
        assert_eq!(node.location.start_line, 1);
    }

    #[test]
    fn line_parser_spans_lines_with_their_newline() {
        let doc = PlainParser::lines()
            .parse("alpha\n\n  beta\n", DocRole::Current)
            .unwrap();
        assert_eq!(doc.root().children.len(), 2);
        let alpha = doc.node(doc.root().children[0]);
        let beta = doc.node(doc.root().children[1]);
        assert_eq!(doc.text_at(&alpha.location), "alpha\n");
        assert_eq!(doc.text_at(&beta.location), "  beta\n");
        assert_eq!(beta.signature, Signature::new("beta"));
    }

    #[test]
    fn file_parser_emits_one_unit_or_none() {
        let full = PlainParser::whole_file()
            .parse("anything at all\n", DocRole::Current)
            .unwrap();
        assert_eq!(full.root().children.len(), 1);
        let blank = PlainParser::whole_file()
            .parse("  \n", DocRole::Current)
            .unwrap();
        assert_eq!(blank.root().children.len(), 0);
    }

    #[test]
    fn extensions_resolve_to_languages() {
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("java"), Some(Language::Java));
        assert_eq!(
            Language::from_path(Path::new("src/Person.java")),
            Some(Language::Java)
        );
        assert_eq!(Language::from_extension("txt"), None);
        assert_eq!("c++".parse::<Language>(), Ok(Language::Cpp));
        assert!("fortran".parse::<Language>().is_err());
    }
}
