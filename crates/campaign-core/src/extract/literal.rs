//! Typed evaluation of property initializers.
//!
//! An initializer node either evaluates to a [`Literal`] or is reported as
//! [`Evaluation::Unsupported`] with a short description of what it was, so
//! callers decide whether to warn or fail.

use serde_json::{Number, Value};
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Bool(bool),
    /// Object or array literal that parsed as JSON.
    Structured(Value),
    /// Object or array literal that did not parse as JSON; holds the source text.
    Verbatim(String),
}

impl Literal {
    pub fn into_value(self) -> Value {
        match self {
            Literal::String(s) | Literal::Verbatim(s) => Value::String(s),
            Literal::Number(n) => Value::Number(n),
            Literal::Bool(b) => Value::Bool(b),
            Literal::Structured(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Literal(Literal),
    Unsupported { kind: &'static str },
}

/// Evaluate one initializer expression node.
///
/// `source` is the text the tree was parsed from; object and array literals
/// are re-read from it verbatim.
pub fn evaluate(node: Node<'_>, source: &str) -> Evaluation {
    match node.kind() {
        "string" => Evaluation::Literal(Literal::String(string_value(node, source))),
        "template_string" => {
            if has_named_child(node, "template_substitution") {
                Evaluation::Unsupported {
                    kind: "template expression",
                }
            } else {
                Evaluation::Literal(Literal::String(string_value(node, source)))
            }
        }
        "number" => number(node_text(node, source), false),
        "unary_expression" => evaluate_signed(node, source),
        "true" => Evaluation::Literal(Literal::Bool(true)),
        "false" => Evaluation::Literal(Literal::Bool(false)),
        "object" | "array" => {
            let text = node_text(node, source);
            match serde_json::from_str::<Value>(text) {
                Ok(value) => Evaluation::Literal(Literal::Structured(value)),
                Err(_) => Evaluation::Literal(Literal::Verbatim(text.to_string())),
            }
        }
        kind => Evaluation::Unsupported {
            kind: describe_expression(kind),
        },
    }
}

/// `-1` and `+1` are numbers; any other unary expression is not.
fn evaluate_signed(node: Node<'_>, source: &str) -> Evaluation {
    let operator = node.child_by_field_name("operator").map(|op| op.kind());
    let argument = node.child_by_field_name("argument");
    match (operator, argument) {
        (Some(op @ ("-" | "+")), Some(arg)) if arg.kind() == "number" => {
            number(node_text(arg, source), op == "-")
        }
        _ => Evaluation::Unsupported { kind: "expression" },
    }
}

fn number(raw: &str, negate: bool) -> Evaluation {
    match parse_number(raw, negate) {
        Some(n) => Evaluation::Literal(Literal::Number(n)),
        None => Evaluation::Unsupported {
            kind: "numeric literal",
        },
    }
}

fn describe_expression(kind: &str) -> &'static str {
    match kind {
        "null" => "null",
        "undefined" => "undefined",
        "identifier" | "member_expression" => "identifier",
        "new_expression" => "new expression",
        "call_expression" => "call expression",
        "arrow_function" => "arrow function",
        "function_expression" | "function" | "generator_function" => "function expression",
        "as_expression" | "satisfies_expression" | "type_assertion" | "non_null_expression" => {
            "type assertion"
        }
        _ => "expression",
    }
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn has_named_child(node: Node<'_>, kind: &str) -> bool {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .any(|child| child.kind() == kind)
}

/// The cooked value of a string or template literal.
///
/// Text between the quotes is copied through, except `escape_sequence`
/// children which are decoded.
pub(crate) fn string_value(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte() + 1;
    let end = node.end_byte().saturating_sub(1).max(start);
    let mut out = String::new();
    let mut pos = start;
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        if child.kind() != "escape_sequence" {
            continue;
        }
        out.push_str(source.get(pos..child.start_byte()).unwrap_or_default());
        decode_escape(node_text(child, source), &mut out);
        pos = child.end_byte();
    }
    out.push_str(source.get(pos..end).unwrap_or_default());
    out
}

fn decode_escape(escape: &str, out: &mut String) {
    let body = escape.strip_prefix('\\').unwrap_or(escape);
    let mut chars = body.chars();
    let Some(first) = chars.next() else {
        return;
    };
    match first {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'b' => out.push('\u{8}'),
        'f' => out.push('\u{c}'),
        'v' => out.push('\u{b}'),
        '0' if body.len() == 1 => out.push('\0'),
        // Line continuation.
        '\n' | '\r' | '\u{2028}' | '\u{2029}' => {}
        'x' => push_code_point(&body[1..], out, escape),
        'u' => {
            let hex = body[1..].trim_start_matches('{').trim_end_matches('}');
            push_code_point(hex, out, escape);
        }
        _ => out.push_str(body),
    }
}

fn push_code_point(hex: &str, out: &mut String, raw: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push_str(raw),
    }
}

/// Parse a numeric literal, storing integral values as JSON integers.
pub(crate) fn parse_number(raw: &str, negate: bool) -> Option<Number> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();

    let radix = if lower.starts_with("0x") {
        Some(16)
    } else if lower.starts_with("0o") {
        Some(8)
    } else if lower.starts_with("0b") {
        Some(2)
    } else {
        None
    };

    if let Some(radix) = radix {
        let value = i64::from_str_radix(&lower[2..], radix).ok()?;
        return Some(Number::from(if negate { -value } else { value }));
    }

    let value: f64 = lower.parse().ok()?;
    let value = if negate { -value } else { value };
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_source;
    use serde_json::json;

    /// Parse `let v = <src>;` and evaluate the initializer.
    fn eval(src: &str) -> Evaluation {
        let source = format!("let v = {src};");
        let tree = parse_source(&source).unwrap();
        let root = tree.root_node();
        let declaration = root.named_child(0).unwrap();
        let declarator = declaration.named_child(0).unwrap();
        assert_eq!(declarator.kind(), "variable_declarator");
        let value = declarator.child_by_field_name("value").unwrap();
        evaluate(value, &source)
    }

    fn literal(src: &str) -> Value {
        match eval(src) {
            Evaluation::Literal(l) => l.into_value(),
            other => panic!("expected literal for {src:?}, got {other:?}"),
        }
    }

    #[test]
    fn strings_and_templates() {
        assert_eq!(literal(r#""x""#), json!("x"));
        assert_eq!(literal("'single'"), json!("single"));
        assert_eq!(literal("`tmpl`"), json!("tmpl"));
        assert_eq!(literal("''"), json!(""));
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(literal(r#""a\nb""#), json!("a\nb"));
        assert_eq!(literal(r#"'it\'s'"#), json!("it's"));
        assert_eq!(literal(r#""A\x42\u{43}""#), json!("ABC"));
        assert_eq!(literal(r#""back\\slash""#), json!("back\\slash"));
    }

    #[test]
    fn integral_numbers_are_integers() {
        assert_eq!(literal("3"), json!(3));
        assert_eq!(literal("-1"), json!(-1));
        assert_eq!(literal("0xff"), json!(255));
        assert_eq!(literal("1_000"), json!(1000));
        assert_eq!(literal("2.5"), json!(2.5));
    }

    #[test]
    fn booleans() {
        assert_eq!(literal("true"), json!(true));
        assert_eq!(literal("false"), json!(false));
    }

    #[test]
    fn json_compatible_object_and_array() {
        assert_eq!(literal(r#"{"a": 1, "b": [true]}"#), json!({"a": 1, "b": [true]}));
        assert_eq!(literal(r#"["x", "y"]"#), json!(["x", "y"]));
    }

    #[test]
    fn non_json_object_falls_back_to_verbatim() {
        match eval("{ label: 'x' }") {
            Evaluation::Literal(Literal::Verbatim(text)) => assert_eq!(text, "{ label: 'x' }"),
            other => panic!("expected verbatim, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_kinds_are_described() {
        assert_eq!(eval("new Foo()"), Evaluation::Unsupported { kind: "new expression" });
        assert_eq!(eval("compute(1)"), Evaluation::Unsupported { kind: "call expression" });
        assert_eq!(eval("() => 1"), Evaluation::Unsupported { kind: "arrow function" });
        assert_eq!(eval("null"), Evaluation::Unsupported { kind: "null" });
        assert_eq!(eval("OTHER"), Evaluation::Unsupported { kind: "identifier" });
        assert_eq!(eval("-x"), Evaluation::Unsupported { kind: "expression" });
        assert_eq!(
            eval("`a ${b}`"),
            Evaluation::Unsupported { kind: "template expression" }
        );
    }
}
