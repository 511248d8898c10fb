//! `cashDom` query handles.

use tracing::{error, warn};

use crate::dom::{Document, NodeId, SharedDocument};

/// What a [`CashDom`] handle selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Selector(String),
    Element(NodeId),
}

impl From<&str> for Query {
    fn from(selector: &str) -> Self {
        Query::Selector(selector.to_string())
    }
}

impl From<String> for Query {
    fn from(selector: String) -> Self {
        Query::Selector(selector)
    }
}

impl From<NodeId> for Query {
    fn from(node: NodeId) -> Self {
        Query::Element(node)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Selector(s) => f.write_str(s),
            Query::Element(id) => write!(f, "element {id:?}"),
        }
    }
}

/// A query handle. Every method re-evaluates the query against the live
/// document, so a handle created before a mutation sees its effects.
#[derive(Debug, Clone)]
pub struct CashDom {
    doc: SharedDocument,
    query: Query,
}

impl CashDom {
    pub(crate) fn new(doc: SharedDocument, query: Query) -> Self {
        Self { doc, query }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    fn resolve(&self, doc: &Document) -> Vec<NodeId> {
        match &self.query {
            Query::Selector(selector) => match doc.query_selector_all(selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    error!(error = %e, "cashDom failed to query selector");
                    Vec::new()
                }
            },
            Query::Element(node) => vec![*node],
        }
    }

    pub fn length(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn elements(&self) -> Vec<NodeId> {
        let doc = self.doc.lock();
        self.resolve(&doc)
    }

    /// Append markup to the first matched element. Returns the top-level
    /// nodes inserted.
    pub fn append(&self, html: &str) -> Vec<NodeId> {
        let mut doc = self.doc.lock();
        match self.resolve(&doc).first() {
            Some(&first) => doc.append_html(first, html),
            None => {
                warn!(query = %self.query, "cashDom append: no elements found to append to");
                Vec::new()
            }
        }
    }

    /// Remove every matched element. Returns how many were removed.
    pub fn remove(&self) -> usize {
        let mut doc = self.doc.lock();
        let nodes = self.resolve(&doc);
        if nodes.is_empty() {
            warn!(query = %self.query, "cashDom remove: no elements found to remove");
            return 0;
        }
        nodes.into_iter().filter(|n| doc.remove(*n)).count()
    }

    /// Replace the contents of the first matched element.
    pub fn html(&self, html: &str) {
        let mut doc = self.doc.lock();
        match self.resolve(&doc).first() {
            Some(&first) => doc.set_inner_html(first, html),
            None => warn!(query = %self.query, "cashDom html: no elements found to set html for"),
        }
    }

    /// Set an attribute on every matched element.
    pub fn attr(&self, name: &str, value: &str) {
        let mut doc = self.doc.lock();
        for node in self.resolve(&doc) {
            doc.set_attribute(node, name, value);
        }
    }

    /// Serialized contents of the first matched element.
    pub fn inner_html(&self) -> Option<String> {
        let doc = self.doc.lock();
        self.resolve(&doc).first().map(|n| doc.inner_html(*n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(html: &str) -> SharedDocument {
        let shared = SharedDocument::new();
        {
            let mut doc = shared.lock();
            let body = doc.body();
            doc.append_html(body, html);
        }
        shared
    }

    #[test]
    fn query_is_deferred_to_call_time() {
        let shared = SharedDocument::new();
        let handle = CashDom::new(shared.clone(), ".late".into());
        assert_eq!(handle.length(), 0);

        {
            let mut doc = shared.lock();
            let body = doc.body();
            doc.append_html(body, "<p class='late'></p>");
        }
        assert_eq!(handle.length(), 1);
    }

    #[test]
    fn append_targets_first_match_only() {
        let shared = doc_with("<ul></ul><ul></ul>");
        CashDom::new(shared.clone(), "ul".into()).append("<li>x</li>");
        assert_eq!(shared.body_html(), "<ul><li>x</li></ul><ul></ul>");
    }

    #[test]
    fn remove_clears_every_match() {
        let shared = doc_with("<p class='x'></p><div><p class='x'></p></div>");
        let handle = CashDom::new(shared.clone(), ".x".into());
        assert_eq!(handle.remove(), 2);
        assert_eq!(handle.length(), 0);
        assert_eq!(shared.body_html(), "<div></div>");
    }

    #[test]
    fn remove_with_no_matches_is_a_no_op() {
        let shared = doc_with("<p></p>");
        assert_eq!(CashDom::new(shared.clone(), ".none".into()).remove(), 0);
        assert_eq!(shared.body_html(), "<p></p>");
    }

    #[test]
    fn html_and_attr() {
        let shared = doc_with("<div id='a'></div><a></a><a></a>");
        CashDom::new(shared.clone(), "#a".into()).html("<b>hi</b>");
        CashDom::new(shared.clone(), "a".into()).attr("target", "_blank");
        assert_eq!(
            shared.body_html(),
            r#"<div id="a"><b>hi</b></div><a target="_blank"></a><a target="_blank"></a>"#
        );
    }

    #[test]
    fn invalid_selector_behaves_as_empty() {
        let shared = doc_with("<p></p>");
        let handle = CashDom::new(shared.clone(), "p::before".into());
        assert_eq!(handle.length(), 0);
        handle.append("<i></i>");
        assert_eq!(shared.body_html(), "<p></p>");
    }

    #[test]
    fn wraps_an_element() {
        let shared = doc_with("<section></section>");
        let section = shared.lock().query_selector("section").unwrap().unwrap();
        let handle = CashDom::new(shared.clone(), section.into());
        handle.append("<h2>t</h2>");
        assert_eq!(handle.inner_html().as_deref(), Some("<h2>t</h2>"));
    }
}
