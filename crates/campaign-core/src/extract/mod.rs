//! Default-value extraction from the server-side config class.
//!
//! Parses `server-side.ts` with tree-sitter, finds its class declarations,
//! and lifts every property initializer that is a literal into
//! [`CampaignData`]. Decorators on properties become [`FieldAnnotations`].
//! Anything that is not a literal (constructor calls, expressions) is skipped
//! with a warning.
//!
//! ```text
//! program
//!   export_statement? > class_declaration > class_body
//!     public_field_definition  (decorator*, name, value?)
//!                                                 |
//!                                           evaluate()
//!                                     Literal | Unsupported
//! ```

pub mod annotation;
pub mod literal;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser, Tree};

use crate::data::CampaignData;

pub use annotation::{AnnotationKind, FieldAnnotation, FieldAnnotations, KnownAnnotation};
pub use literal::{Evaluation, Literal, evaluate};

use literal::{node_text, string_value};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    #[error("failed to parse config source")]
    ParseFailed,
}

/// A property that had an initializer the evaluator could not turn into data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub field: String,
    pub kind: &'static str,
    pub source: String,
}

/// Result of extracting defaults from a config source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub class_names: Vec<String>,
    pub data: CampaignData,
    pub annotations: FieldAnnotations,
    pub skipped: Vec<SkippedField>,
    pub warnings: Vec<String>,
}

/// Read and extract defaults from a config file on disk.
pub fn extract_from_path(path: &Path) -> Result<Extraction, ExtractError> {
    debug!(path = %path.display(), "reading component data");
    let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_defaults(&source)
}

/// Parse TypeScript source into a syntax tree.
///
/// tree-sitter recovers from syntax errors, so a tree is returned for any
/// input; check [`tree_sitter::Node::has_error`] on the root.
pub(crate) fn parse_source(source: &str) -> Result<Tree, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        .map_err(|e| ExtractError::ParserInit(e.to_string()))?;
    parser.parse(source, None).ok_or(ExtractError::ParseFailed)
}

/// Extract literal property defaults from every class in `source`.
///
/// Properties from all classes are merged; helper classes in config files
/// usually declare fields without initializers and contribute nothing.
/// Syntax errors elsewhere in the file produce a warning, and whatever
/// classes still parsed are extracted.
pub fn extract_defaults(source: &str) -> Result<Extraction, ExtractError> {
    let tree = parse_source(source)?;
    let root = tree.root_node();
    let mut extraction = Extraction::default();

    if root.has_error() {
        let (line, column) = first_error(root)
            .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
            .unwrap_or((1, 1));
        push_warning(
            &mut extraction,
            format!("config source has a syntax error at {line}:{column}"),
        );
    }

    for node in named_children(root) {
        if let Some(class) = class_declaration(node) {
            extract_class(class, source, &mut extraction);
        }
    }

    if extraction.class_names.is_empty() {
        push_warning(&mut extraction, "could not find a class declaration".to_string());
    } else if extraction.data.is_empty() {
        let message = format!(
            "no properties with literal initializers found in class {}",
            extraction.class_names.join(", ")
        );
        push_warning(&mut extraction, message);
    }

    debug!(
        classes = ?extraction.class_names,
        fields = extraction.data.len(),
        skipped = extraction.skipped.len(),
        "extracted campaign data"
    );
    Ok(extraction)
}

fn push_warning(extraction: &mut Extraction, message: String) {
    warn!("{message}");
    extraction.warnings.push(message);
}

fn named_children<'t>(node: Node<'t>) -> impl Iterator<Item = Node<'t>> {
    (0..node.named_child_count()).filter_map(move |i| node.named_child(i))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .filter(|child| child.has_error())
        .find_map(first_error)
}

/// A top-level class, either bare or behind `export` / `export default`.
fn class_declaration(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "class_declaration" | "abstract_class_declaration" | "class" => Some(node),
        "export_statement" => named_children(node).find_map(|child| match child.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => Some(child),
            _ => None,
        }),
        _ => None,
    }
}

fn extract_class(class: Node<'_>, source: &str, extraction: &mut Extraction) {
    // Anonymous default-exported classes have nothing to report under.
    let Some(name) = class.child_by_field_name("name") else {
        return;
    };
    let Some(body) = class.child_by_field_name("body") else {
        return;
    };
    let name = node_text(name, source);
    debug!(class = name, "found class");
    extraction.class_names.push(name.to_string());

    for member in named_children(body) {
        if member.kind() != "public_field_definition" {
            continue;
        }
        let Some(field) = member
            .child_by_field_name("name")
            .and_then(|n| property_name(n, source))
        else {
            continue;
        };

        for annotation in decorators(member, source) {
            extraction.annotations.add(field.as_str(), annotation);
        }
        if let Some(value) = member.child_by_field_name("value") {
            record_initializer(extraction, &field, value, source);
        }
    }
}

/// The key a property is stored under. Computed names have none.
fn property_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => Some(string_value(node, source)),
        "computed_property_name" => None,
        _ => Some(node_text(node, source).to_string()),
    }
}

fn decorators(member: Node<'_>, source: &str) -> Vec<FieldAnnotation> {
    named_children(member)
        .filter(|child| child.kind() == "decorator")
        .filter_map(|decorator| annotation(decorator, source))
        .collect()
}

/// `@name`, `@ns.name` or `@name(args...)`.
fn annotation(decorator: Node<'_>, source: &str) -> Option<FieldAnnotation> {
    let expr = decorator.named_child(0)?;
    let (callee, args) = match expr.kind() {
        "call_expression" => (
            expr.child_by_field_name("function")?,
            expr.child_by_field_name("arguments"),
        ),
        _ => (expr, None),
    };
    let name = match callee.kind() {
        "member_expression" => node_text(callee.child_by_field_name("property")?, source),
        _ => node_text(callee, source),
    };

    let args = args
        .map(|list| {
            named_children(list)
                .filter(|arg| arg.kind() != "comment")
                .map(|arg| match evaluate(arg, source) {
                    Evaluation::Literal(lit) => lit.into_value(),
                    Evaluation::Unsupported { .. } => {
                        serde_json::Value::String(node_text(arg, source).to_string())
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Some(FieldAnnotation {
        kind: AnnotationKind::from_name(name),
        args,
    })
}

fn record_initializer(extraction: &mut Extraction, field: &str, value: Node<'_>, source: &str) {
    match evaluate(value, source) {
        Evaluation::Literal(Literal::Verbatim(text)) => {
            push_warning(
                extraction,
                format!("could not parse initializer for {field} as JSON, keeping source text: {text}"),
            );
            extraction.data.insert(field, text);
        }
        Evaluation::Literal(literal) => {
            extraction.data.insert(field, literal.into_value());
        }
        Evaluation::Unsupported { kind } => {
            let text = node_text(value, source).to_string();
            warn!(field, kind, initializer = %text, "skipping non-literal initializer");
            extraction.skipped.push(SkippedField {
                field: field.to_string(),
                kind,
                source: text,
            });
        }
    }
}
