//! CSS selector subset used by the mock SDK.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`), descendant and child
//! combinators, and comma-separated lists. Pseudo-classes and sibling
//! combinators are rejected.

use thiserror::Error;

use super::{Document, NodeId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector, stored right-to-left: `parts[0]` is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let fail = |reason: String| SelectorError {
            selector: selector.to_string(),
            reason,
        };

        let mut selectors = Vec::new();
        for part in split_list(selector) {
            let part = part.trim();
            if part.is_empty() {
                return Err(fail("empty selector".to_string()));
            }
            selectors.push(parse_complex(part).map_err(fail)?);
        }
        Ok(Self {
            source: selector.to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.selectors.iter().any(|c| matches_complex(c, doc, node))
    }
}

/// Split on commas outside attribute brackets and quotes.
fn split_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut compounds: Vec<Compound> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut pending: Option<Combinator> = None;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            continue;
        }
        if c == '>' {
            if compounds.is_empty() || pending == Some(Combinator::Child) {
                return Err("unexpected '>'".to_string());
            }
            pending = Some(Combinator::Child);
            pos += 1;
            continue;
        }
        if matches!(c, '+' | '~') {
            return Err(format!("sibling combinator '{c}' is not supported"));
        }

        let compound = parse_compound(&chars, &mut pos)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().ok_or("expected combinator")?);
        }
        pending = None;
        compounds.push(compound);
    }

    if pending == Some(Combinator::Child) {
        return Err("dangling '>'".to_string());
    }

    let subject = compounds.pop().ok_or("empty selector")?;
    let mut ancestors = Vec::new();
    while let Some(compound) = compounds.pop() {
        let combinator = combinators.pop().ok_or("expected combinator")?;
        ancestors.push((combinator, compound));
    }
    Ok(Complex { subject, ancestors })
}

fn parse_compound(chars: &[char], pos: &mut usize) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let start = *pos;

    if chars[*pos] == '*' {
        *pos += 1;
    } else if is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '#' => {
                *pos += 1;
                let id = read_ident(chars, pos);
                if id.is_empty() {
                    return Err("expected id after '#'".to_string());
                }
                compound.id = Some(id);
            }
            '.' => {
                *pos += 1;
                let class = read_ident(chars, pos);
                if class.is_empty() {
                    return Err("expected class name after '.'".to_string());
                }
                compound.classes.push(class);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos)?);
            }
            ':' => return Err("pseudo-classes are not supported".to_string()),
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => break,
            c => return Err(format!("unexpected character '{c}'")),
        }
    }

    if *pos == start {
        return Err(format!("unexpected character '{}'", chars[start]));
    }
    Ok(compound)
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Result<AttrSelector, String> {
    skip_ws(chars, pos);
    let name = read_ident(chars, pos).to_ascii_lowercase();
    if name.is_empty() {
        return Err("expected attribute name".to_string());
    }
    skip_ws(chars, pos);

    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrSelector {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => AttrOp::Equals,
        Some(c @ ('~' | '^' | '$' | '*')) if chars.get(*pos + 1) == Some(&'=') => {
            *pos += 1;
            match c {
                '~' => AttrOp::Includes,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Substring,
            }
        }
        Some(c) => return Err(format!("unsupported attribute operator at '{c}'")),
        None => return Err("unterminated attribute selector".to_string()),
    };
    *pos += 1;
    skip_ws(chars, pos);

    let value = match chars.get(*pos) {
        Some(&q @ ('"' | '\'')) => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated string in attribute selector".to_string());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };
    skip_ws(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return Err("expected ']'".to_string());
    }
    *pos += 1;
    Ok(AttrSelector { name, op, value })
}

fn matches_compound(compound: &Compound, doc: &Document, node: NodeId) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };
    if compound.tag.as_deref().is_some_and(|t| t != tag) {
        return false;
    }
    if let Some(id) = &compound.id {
        if doc.attribute(node, "id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = doc.attribute(node, "class").unwrap_or_default();
        let has = |c: &String| class_attr.split_ascii_whitespace().any(|x| x == c);
        if !compound.classes.iter().all(has) {
            return false;
        }
    }
    compound.attrs.iter().all(|a| {
        let Some(actual) = doc.attribute(node, &a.name) else {
            return false;
        };
        match a.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == a.value,
            AttrOp::Includes => actual.split_ascii_whitespace().any(|w| w == a.value),
            AttrOp::Prefix => !a.value.is_empty() && actual.starts_with(&a.value),
            AttrOp::Suffix => !a.value.is_empty() && actual.ends_with(&a.value),
            AttrOp::Substring => !a.value.is_empty() && actual.contains(&a.value),
        }
    })
}

fn matches_complex(complex: &Complex, doc: &Document, node: NodeId) -> bool {
    matches_compound(&complex.subject, doc, node) && matches_ancestors(&complex.ancestors, doc, node)
}

fn matches_ancestors(ancestors: &[(Combinator, Compound)], doc: &Document, node: NodeId) -> bool {
    let Some(((combinator, compound), rest)) = ancestors.split_first() else {
        return true;
    };
    let mut current = doc.parent_element(node);
    while let Some(candidate) = current {
        if matches_compound(compound, doc, candidate) && matches_ancestors(rest, doc, candidate) {
            return true;
        }
        if *combinator == Combinator::Child {
            return false;
        }
        current = doc.parent_element(candidate);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_forms() {
        for s in [
            "div",
            "*",
            "#id",
            ".a.b",
            "div#x.y[data-z]",
            "[type=\"submit\"]",
            "[class~=a]",
            "a[href^='https'] , p",
            "body > div .small a",
        ] {
            SelectorList::parse(s).unwrap_or_else(|e| panic!("{s}: {e}"));
        }
    }

    #[test]
    fn rejects_unsupported_forms() {
        for s in ["", "a:hover", "a + b", "a ~ b", "> a", "a >", "div,", "[x", "#", "a!"] {
            assert!(SelectorList::parse(s).is_err(), "expected error for {s:?}");
        }
    }

    #[test]
    fn error_names_the_selector() {
        let err = SelectorList::parse("li:first-child").unwrap_err();
        assert_eq!(err.selector, "li:first-child");
        assert!(err.to_string().contains("pseudo-classes"));
    }

    #[test]
    fn matching_against_a_document() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.append_html(
            body,
            r#"<div class="popup big" id="p"><p class="small"><a href="https://x">x</a></p><span><a>y</a></span></div>"#,
        );

        let count = |s: &str| doc.query_selector_all(s).unwrap().len();
        assert_eq!(count(".popup"), 1);
        assert_eq!(count("div.popup.big#p"), 1);
        assert_eq!(count(".small a"), 1);
        assert_eq!(count("div > a"), 0);
        assert_eq!(count("div a"), 2);
        assert_eq!(count("span > a"), 1);
        assert_eq!(count("a[href^=https]"), 1);
        assert_eq!(count("a[href$=x]"), 1);
        assert_eq!(count("a[href*='//']"), 1);
        assert_eq!(count("[class~=big]"), 1);
        assert_eq!(count("[class=big]"), 0);
        assert_eq!(count("p, span"), 2);
        assert_eq!(count("body *"), 5);
    }
}
