//! Tolerant HTML fragment parser.
//!
//! Handles what rendered templates contain in practice: nested elements,
//! quoted and bare attributes, void elements, comments, and raw-text
//! elements. Stray end tags are dropped and unclosed elements are closed at
//! end of input; the parser never fails.
//!
//! As in browsers, a trailing `/>` on an HTML element is ignored: `<div/>`
//! opens a `div`. It only closes elements inside `svg` or `math`.

/// A parsed node, before insertion into a [`super::Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ParsedNode>,
    },
    Text(String),
    Comment(String),
}

pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Roots of foreign content, where self-closing syntax is honoured.
const FOREIGN_ROOTS: &[&str] = &["svg", "math"];

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<ParsedNode>,
}

struct Builder {
    roots: Vec<ParsedNode>,
    stack: Vec<OpenElement>,
}

impl Builder {
    fn push(&mut self, node: ParsedNode) {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let siblings = match self.stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.roots,
        };
        if let Some(ParsedNode::Text(prev)) = siblings.last_mut() {
            prev.push_str(text);
        } else {
            siblings.push(ParsedNode::Text(text.to_string()));
        }
    }

    fn close_top(&mut self) {
        if let Some(open) = self.stack.pop() {
            self.push(ParsedNode::Element {
                tag: open.tag,
                attrs: open.attrs,
                children: open.children,
            });
        }
    }

    /// Close up to and including the innermost open `tag`; ignore if absent.
    fn close(&mut self, tag: &str) {
        if let Some(idx) = self.stack.iter().rposition(|e| e.tag == tag) {
            while self.stack.len() > idx {
                self.close_top();
            }
        }
    }

    fn in_foreign_content(&self) -> bool {
        self.stack
            .iter()
            .any(|open| FOREIGN_ROOTS.contains(&open.tag.as_str()))
    }

    fn finish(mut self) -> Vec<ParsedNode> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.roots
    }
}

/// Parse an HTML fragment into a node list.
pub fn parse_fragment(html: &str) -> Vec<ParsedNode> {
    let bytes = html.as_bytes();
    let mut builder = Builder {
        roots: Vec::new(),
        stack: Vec::new(),
    };
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let rest = &html[pos..];

        if rest.starts_with("<!--") {
            builder.push_text(&html[text_start..pos]);
            let body_start = pos + 4;
            let end = html[body_start..].find("-->").map(|i| body_start + i);
            let (comment, next) = match end {
                Some(end) => (&html[body_start..end], end + 3),
                None => (&html[body_start..], html.len()),
            };
            builder.push(ParsedNode::Comment(comment.to_string()));
            pos = next;
            text_start = pos;
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            // Doctype or processing instruction.
            builder.push_text(&html[text_start..pos]);
            pos = html[pos..].find('>').map_or(html.len(), |i| pos + i + 1);
            text_start = pos;
            continue;
        }

        if rest.starts_with("</") {
            let name_start = pos + 2;
            let name_end = scan_name(bytes, name_start);
            if name_end == name_start {
                pos += 1;
                continue;
            }
            builder.push_text(&html[text_start..pos]);
            let tag = html[name_start..name_end].to_ascii_lowercase();
            pos = html[name_end..].find('>').map_or(html.len(), |i| name_end + i + 1);
            text_start = pos;
            builder.close(&tag);
            continue;
        }

        let name_start = pos + 1;
        let name_end = scan_name(bytes, name_start);
        if name_end == name_start || !bytes[name_start].is_ascii_alphabetic() {
            pos += 1;
            continue;
        }

        builder.push_text(&html[text_start..pos]);
        let tag = html[name_start..name_end].to_ascii_lowercase();
        let (attrs, self_closing, after) = parse_attributes(html, name_end);
        pos = after;
        text_start = pos;

        let foreign = FOREIGN_ROOTS.contains(&tag.as_str()) || builder.in_foreign_content();
        if VOID_ELEMENTS.contains(&tag.as_str()) || (self_closing && foreign) {
            builder.push(ParsedNode::Element {
                tag,
                attrs,
                children: Vec::new(),
            });
            continue;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let close = format!("</{tag}");
            let end = find_ascii_case_insensitive(&html[pos..], &close).map(|i| pos + i);
            let (content, next) = match end {
                Some(end) => {
                    let after_close = html[end..].find('>').map_or(html.len(), |i| end + i + 1);
                    (&html[pos..end], after_close)
                }
                None => (&html[pos..], html.len()),
            };
            let children = if content.is_empty() {
                Vec::new()
            } else {
                vec![ParsedNode::Text(content.to_string())]
            };
            builder.push(ParsedNode::Element {
                tag,
                attrs,
                children,
            });
            pos = next;
            text_start = pos;
            continue;
        }

        builder.stack.push(OpenElement {
            tag,
            attrs,
            children: Vec::new(),
        });
    }

    builder.push_text(&html[text_start..]);
    builder.finish()
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-' || bytes[end] == b':')
    {
        end += 1;
    }
    end
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Parse attributes after a tag name. Returns the attributes, whether the
/// tag was self-closing, and the position after `>`.
fn parse_attributes(html: &str, start: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = html.as_bytes();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut pos = start;
    let mut self_closing = false;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (attrs, self_closing, pos);
        }
        match bytes[pos] {
            b'>' => return (attrs, self_closing, pos + 1),
            b'/' => {
                pos += 1;
                if bytes.get(pos) == Some(&b'>') {
                    self_closing = true;
                }
                continue;
            }
            _ => {}
        }

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let name = html[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let mut value = String::new();
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                Some(&q @ (b'"' | b'\'')) => {
                    let value_start = pos + 1;
                    let end = html[value_start..]
                        .find(q as char)
                        .map_or(html.len(), |i| value_start + i);
                    value = decode_entities(&html[value_start..end]);
                    pos = (end + 1).min(html.len());
                }
                _ => {
                    let value_start = pos;
                    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    value = decode_entities(&html[value_start..pos]);
                }
            }
        }

        if !name.is_empty() && !attrs.iter().any(|(n, _)| *n == name) {
            attrs.push((name, value));
        }
    }
}

/// Decode the character references that appear in template output.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for an attribute value in double quotes.
pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)], children: Vec<ParsedNode>) -> ParsedNode {
        ParsedNode::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    fn text(s: &str) -> ParsedNode {
        ParsedNode::Text(s.to_string())
    }

    #[test]
    fn nested_elements_and_attributes() {
        let nodes = parse_fragment(r#"<div id="a" class='b c' hidden data-x=1><h1>Hi</h1></div>"#);
        assert_eq!(
            nodes,
            vec![el(
                "div",
                &[("id", "a"), ("class", "b c"), ("hidden", ""), ("data-x", "1")],
                vec![el("h1", &[], vec![text("Hi")])]
            )]
        );
    }

    #[test]
    fn void_and_self_closing_elements() {
        let nodes = parse_fragment(r#"<p>a<br>b<img src="x"/><span/>c</p>"#);
        assert_eq!(
            nodes,
            vec![el(
                "p",
                &[],
                vec![
                    text("a"),
                    el("br", &[], vec![]),
                    text("b"),
                    el("img", &[("src", "x")], vec![]),
                    el("span", &[], vec![text("c")]),
                ]
            )]
        );
    }

    #[test]
    fn self_closing_html_element_stays_open() {
        let nodes = parse_fragment("<div/><p>x</p>");
        assert_eq!(
            nodes,
            vec![el("div", &[], vec![el("p", &[], vec![text("x")])])]
        );
    }

    #[test]
    fn self_closing_is_honoured_in_svg() {
        let nodes = parse_fragment(r#"<svg><path d="M0"/><circle r="1"/></svg><i>y</i>"#);
        assert_eq!(
            nodes,
            vec![
                el(
                    "svg",
                    &[],
                    vec![
                        el("path", &[("d", "M0")], vec![]),
                        el("circle", &[("r", "1")], vec![]),
                    ]
                ),
                el("i", &[], vec![text("y")]),
            ]
        );
    }

    #[test]
    fn raw_text_and_comments() {
        let nodes = parse_fragment("<!-- note --><style>a > b { c: d }</style><script>if (a<b) {}</script>");
        assert_eq!(
            nodes,
            vec![
                ParsedNode::Comment(" note ".to_string()),
                el("style", &[], vec![text("a > b { c: d }")]),
                el("script", &[], vec![text("if (a<b) {}")]),
            ]
        );
    }

    #[test]
    fn stray_end_tags_and_unclosed_elements() {
        let nodes = parse_fragment("</span><div><p>open");
        assert_eq!(
            nodes,
            vec![el("div", &[], vec![el("p", &[], vec![text("open")])])]
        );
    }

    #[test]
    fn end_tag_closes_intervening_elements() {
        let nodes = parse_fragment("<div><p>x</div>y");
        assert_eq!(
            nodes,
            vec![el("div", &[], vec![el("p", &[], vec![text("x")])]), text("y")]
        );
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        assert_eq!(parse_fragment("a < b"), vec![text("a < b")]);
    }

    #[test]
    fn tag_and_attribute_names_are_lowercased() {
        let nodes = parse_fragment(r#"<DIV Data-Name="v"></DIV>"#);
        assert_eq!(nodes, vec![el("div", &[("data-name", "v")], vec![])]);
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#39;&#x41;"), "a & b <c> 'A");
        assert_eq!(decode_entities("AT&T &unknown;"), "AT&T &unknown;");
        assert_eq!(escape_attribute(r#"a "b" & c"#), "a &quot;b&quot; &amp; c");
    }
}
