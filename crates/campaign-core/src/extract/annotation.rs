//! Field annotations lifted from property decorators.
//!
//! The host runtime reads decorators such as `@title("Label")` or
//! `@richText(true)` as editor metadata. Here they are captured as plain
//! records keyed by field name instead of relying on decorator side effects.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Annotation kinds the template editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KnownAnnotation {
    Title,
    RichText,
    Header,
    Subtitle,
    Options,
}

/// Decorator name -> annotation kind.
const ANNOTATION_TABLE: &[(&str, KnownAnnotation)] = &[
    ("title", KnownAnnotation::Title),
    ("richText", KnownAnnotation::RichText),
    ("header", KnownAnnotation::Header),
    ("subtitle", KnownAnnotation::Subtitle),
    ("options", KnownAnnotation::Options),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnnotationKind {
    Known(KnownAnnotation),
    Other(String),
}

impl AnnotationKind {
    pub fn from_name(name: &str) -> Self {
        ANNOTATION_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| AnnotationKind::Known(*kind))
            .unwrap_or_else(|| AnnotationKind::Other(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAnnotation {
    pub kind: AnnotationKind,
    pub args: Vec<Value>,
}

/// Annotations for every field of a config class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldAnnotations(BTreeMap<String, Vec<FieldAnnotation>>);

impl FieldAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, annotation: FieldAnnotation) {
        self.0.entry(field.into()).or_default().push(annotation);
    }

    pub fn get(&self, field: &str) -> &[FieldAnnotation] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The editor label from `@title(...)`, if any.
    pub fn title(&self, field: &str) -> Option<&str> {
        self.find(field, KnownAnnotation::Title)
            .and_then(|a| a.args.first())
            .and_then(Value::as_str)
    }

    /// Whether the field is marked `@richText(true)`.
    pub fn is_rich_text(&self, field: &str) -> bool {
        self.find(field, KnownAnnotation::RichText)
            .is_some_and(|a| a.args.first().and_then(Value::as_bool).unwrap_or(true))
    }

    fn find(&self, field: &str, kind: KnownAnnotation) -> Option<&FieldAnnotation> {
        self.get(field)
            .iter()
            .find(|a| a.kind == AnnotationKind::Known(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_names_resolve_through_table() {
        assert_eq!(
            AnnotationKind::from_name("richText"),
            AnnotationKind::Known(KnownAnnotation::RichText)
        );
        assert_eq!(
            AnnotationKind::from_name("lookup"),
            AnnotationKind::Other("lookup".to_string())
        );
    }

    #[test]
    fn title_and_rich_text_queries() {
        let mut annotations = FieldAnnotations::new();
        annotations.add(
            "imageUrl",
            FieldAnnotation {
                kind: AnnotationKind::from_name("title"),
                args: vec![json!("Form Image URL")],
            },
        );
        annotations.add(
            "formSubheader",
            FieldAnnotation {
                kind: AnnotationKind::from_name("richText"),
                args: vec![json!(true)],
            },
        );

        assert_eq!(annotations.title("imageUrl"), Some("Form Image URL"));
        assert!(annotations.is_rich_text("formSubheader"));
        assert!(!annotations.is_rich_text("imageUrl"));
        assert!(annotations.get("missing").is_empty());
    }

    #[test]
    fn serializes_kind_names_in_camel_case() {
        let annotation = FieldAnnotation {
            kind: AnnotationKind::from_name("richText"),
            args: vec![json!(true)],
        };
        assert_eq!(
            serde_json::to_value(&annotation).unwrap(),
            json!({"kind": "richText", "args": [true]})
        );
    }
}
