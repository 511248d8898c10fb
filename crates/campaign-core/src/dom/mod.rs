//! In-memory document the mock SDK operates on.
//!
//! Stands in for the browser DOM: an arena of nodes with an `html` root
//! holding `head` and `body`, a fragment parser for inserting markup, a
//! selector engine for queries, and child-list watchers that fire when a
//! mutation makes a target selector match.
//!
//! ```text
//! SharedDocument (Arc<Mutex<Document>>)
//!     |
//!     +-- query_selector_all(".popup")  --> Vec<NodeId>
//!     +-- append_html(body, "<div>..")  --> notify watchers under body
//!     +-- watch_for(".popup", root)     --> oneshot::Receiver<String>
//! ```
//!
//! A [`NodeId`] is only meaningful for the document that produced it.
//! Removed nodes stay in the arena, detached, until
//! [`Document::reclaim_detached`] frees their slots for reuse. Ids carry a
//! generation, so a stale id reads as a detached, empty node.

pub mod parse;
pub mod selector;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use parse::{ParsedNode, VOID_ELEMENTS, decode_entities, escape_attribute, parse_fragment};
pub use selector::{SelectorError, SelectorList};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Handle to a registered mutation watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
}

struct Watcher {
    id: WatchId,
    target: SelectorList,
    root: NodeId,
    tx: oneshot::Sender<String>,
}

pub struct Document {
    nodes: Vec<Node>,
    free: Vec<usize>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    watchers: Vec<Watcher>,
    next_watch: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with `html`, `head` and `body` elements.
    pub fn new() -> Self {
        let placeholder = NodeId {
            index: 0,
            generation: 0,
        };
        let mut doc = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            html: placeholder,
            head: placeholder,
            body: placeholder,
            watchers: Vec::new(),
            next_watch: 1,
        };
        doc.html = doc.alloc(element_kind("html"), None);
        doc.head = doc.alloc(element_kind("head"), Some(doc.html));
        doc.body = doc.alloc(element_kind("body"), Some(doc.html));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let parent = parent.filter(|p| self.get(*p).is_some());
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.kind = kind;
                slot.parent = parent;
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Node {
                    kind,
                    parent,
                    children: Vec::new(),
                    generation: 0,
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        };
        if let Some(parent) = parent {
            self.nodes[parent.index].children.push(id);
        }
        id
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.index)
            .filter(|node| node.generation == id.generation)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.index)
            .filter(|node| node.generation == id.generation)
    }

    /// Free the slots of every node no longer reachable from the root.
    ///
    /// Ids of reclaimed nodes go stale. Returns how many slots were freed.
    pub fn reclaim_detached(&mut self) -> usize {
        let mut keep = vec![false; self.nodes.len()];
        for &index in &self.free {
            keep[index] = true;
        }
        let mut stack = vec![self.html];
        while let Some(id) = stack.pop() {
            keep[id.index] = true;
            stack.extend(self.nodes[id.index].children.iter().copied());
        }

        let mut reclaimed = 0;
        for (index, kept) in keep.into_iter().enumerate() {
            if kept {
                continue;
            }
            let slot = &mut self.nodes[index];
            slot.kind = NodeKind::Text(String::new());
            slot.parent = None;
            slot.children.clear();
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            reclaimed += 1;
        }
        if reclaimed > 0 {
            let watchers = std::mem::take(&mut self.watchers);
            self.watchers = watchers
                .into_iter()
                .filter(|w| self.get(w.root).is_some())
                .collect();
            debug!(reclaimed, free = self.free.len(), "reclaimed detached nodes");
        }
        reclaimed
    }

    /// Number of arena slots holding live (attached or detached) nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    // -----------------------------------------------------------------------
    // Tree accessors
    // -----------------------------------------------------------------------

    /// Lowercase tag name, or `None` for text and comment nodes.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    pub(crate) fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|p| self.tag_name(*p).is_some())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    /// Whether `node` is still attached under the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.html, node)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Elements under `scope` (inclusive) in document order.
    fn descendant_elements(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(node) = stack.pop() {
            if self.tag_name(node).is_some() {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_first(&list))
    }

    pub fn select(&self, list: &SelectorList) -> Vec<NodeId> {
        self.descendant_elements(self.html)
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect()
    }

    pub fn select_first(&self, list: &SelectorList) -> Option<NodeId> {
        self.descendant_elements(self.html)
            .into_iter()
            .find(|n| list.matches(self, *n))
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Parse `html` and append the resulting nodes to `parent`.
    ///
    /// Returns the top-level inserted nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        if self.get(parent).is_none() {
            return Vec::new();
        }
        let inserted: Vec<NodeId> = parse_fragment(html)
            .into_iter()
            .map(|parsed| self.insert_parsed(parent, parsed))
            .collect();
        trace!(?parent, count = inserted.len(), "appended html");
        self.notify(parent);
        inserted
    }

    /// Replace the children of `node` with parsed `html`.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) {
        let Some(slot) = self.get_mut(node) else {
            return;
        };
        let old = std::mem::take(&mut slot.children);
        for child in old {
            self.nodes[child.index].parent = None;
        }
        for parsed in parse_fragment(html) {
            self.insert_parsed(node, parsed);
        }
        self.notify(node);
    }

    /// Append a new empty element to `parent`.
    pub fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(element_kind(&tag.to_ascii_lowercase()), Some(parent));
        self.notify(parent);
        id
    }

    fn insert_parsed(&mut self, parent: NodeId, parsed: ParsedNode) -> NodeId {
        match parsed {
            ParsedNode::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.alloc(NodeKind::Element { tag, attrs }, Some(parent));
                for child in children {
                    self.insert_parsed(id, child);
                }
                id
            }
            ParsedNode::Text(text) => self.alloc(NodeKind::Text(text), Some(parent)),
            ParsedNode::Comment(text) => self.alloc(NodeKind::Comment(text), Some(parent)),
        }
    }

    /// Detach `node` from its parent. Returns `false` if already detached.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.get_mut(node).and_then(|n| n.parent.take()) else {
            return false;
        };
        self.nodes[parent.index].children.retain(|c| *c != node);
        self.notify(parent);
        true
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.get_mut(node)
        {
            let name = name.to_ascii_lowercase();
            match attrs.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name, value.to_string())),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Concatenated, entity-decoded text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.get(node) else {
            return;
        };
        match &slot.kind {
            NodeKind::Text(text) => out.push_str(&decode_entities(text)),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } => {
                for child in &slot.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.get(node) else {
            return;
        };
        match &slot.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &slot.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    // -----------------------------------------------------------------------
    // Watchers
    // -----------------------------------------------------------------------

    /// Watch for `target` to match after a child-list mutation under `root`.
    ///
    /// The receiver gets the target selector text once, after which the
    /// watcher is detached. Matching is checked across the whole document,
    /// but only mutations under `root` trigger the check.
    pub fn watch_for(
        &mut self,
        target: &str,
        root: NodeId,
    ) -> Result<(WatchId, oneshot::Receiver<String>), SelectorError> {
        let target = SelectorList::parse(target)?;
        let (tx, rx) = oneshot::channel();
        let id = WatchId(self.next_watch);
        self.next_watch += 1;
        debug!(target = target.as_str(), ?root, watch = id.0, "registered element watcher");
        self.watchers.push(Watcher {
            id,
            target,
            root,
            tx,
        });
        Ok((id, rx))
    }

    /// Detach a watcher. Returns `false` if it already fired or was cancelled.
    pub fn cancel_watch(&mut self, id: WatchId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|w| w.id != id);
        let removed = self.watchers.len() != before;
        if removed {
            debug!(watch = id.0, "cancelled element watcher");
        }
        removed
    }

    /// Detach every watcher, returning how many were live.
    pub fn cancel_all_watches(&mut self) -> usize {
        let count = self.watchers.len();
        self.watchers.clear();
        count
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    fn notify(&mut self, mutated: NodeId) {
        if self.watchers.is_empty() {
            return;
        }
        let watchers = std::mem::take(&mut self.watchers);
        let mut remaining = Vec::with_capacity(watchers.len());
        for watcher in watchers {
            if watcher.tx.is_closed() {
                continue;
            }
            let in_scope = self.is_inclusive_ancestor(watcher.root, mutated);
            if in_scope && self.select_first(&watcher.target).is_some() {
                debug!(target = watcher.target.as_str(), watch = watcher.id.0, "element watcher fired");
                let _ = watcher.tx.send(watcher.target.as_str().to_string());
            } else {
                remaining.push(watcher);
            }
        }
        self.watchers = remaining;
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_string(),
        attrs: Vec::new(),
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

/// A document shared between the session and the SDK handles.
#[derive(Debug, Clone, Default)]
pub struct SharedDocument(Arc<Mutex<Document>>);

impl SharedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the document. A poisoned lock is recovered; the arena has no
    /// invariants a panicking reader could break halfway.
    pub fn lock(&self) -> MutexGuard<'_, Document> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialized `body` contents.
    pub fn body_html(&self) -> String {
        let doc = self.lock();
        doc.inner_html(doc.body())
    }
}
