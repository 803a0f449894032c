//! # SCL Document Tree
//!
//! Arena-backed XML tree. Every node lives in one slot of the owning
//! [`Document`] and is addressed by a [`NodeId`]. Read access goes through
//! borrowed [`Node`] handles; structural edits go through the small set of
//! tree primitives at the bottom of this file, which the editor's action
//! applier is the only intended caller of.
//!
//! New subtrees are built detached as [`Fragment`]s. Their ids are reserved
//! up front, so an edit list can insert a fragment and then refer to it as
//! the parent of a later insertion.
//!
//! Removing a node detaches its subtree without freeing it. Queries from the
//! root no longer see it, but its ids stay valid until the document is
//! dropped, so later edits may still reach into it or put it back.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

use crate::error::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<Attribute>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl NodeKind {
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|attr| attr.name == name)
                .map(|attr| attr.value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed XML document
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Option<NodeData>>,
    root: Option<NodeId>,

    /// Content of the `<?xml ...?>` declaration, if the source had one
    pub declaration: Option<String>,

    /// Next id handed out by [`Document::reserve_id`]
    next_id: Cell<u32>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document holding a single empty root element
    pub fn with_root(tag: impl Into<String>, attributes: &[(&str, &str)]) -> Self {
        let mut doc = Self::new();
        let fragment = doc.create_element(tag, attributes);
        let id = doc.attach(fragment, None);
        doc.root = Some(id);
        doc
    }

    pub fn root(&self) -> Option<Node<'_>> {
        self.root.and_then(|id| self.node(id))
    }

    /// Handle to a live node
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|data| Node { doc: self, id, data })
    }

    /// Whether the node exists, attached or detached
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let top = node.ancestors().last().unwrap_or(node);
        Some(top.id) == self.root
    }

    /// All elements in document order, root included
    pub fn elements(&self) -> impl Iterator<Item = Node<'_>> {
        self.root()
            .into_iter()
            .flat_map(|root| std::iter::once(root).chain(root.descendants()))
            .filter(Node::is_element)
    }

    /// Elements with the given tag in document order
    pub fn elements_by_tag<'a, 't>(&'a self, tag: &'t str) -> impl Iterator<Item = Node<'a>> + 't
    where
        'a: 't,
    {
        self.elements().filter(move |node| node.has_tag(tag))
    }

    /// Number of nodes, detached subtrees included
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Reserve a fresh id for a node that does not exist yet.
    ///
    /// Takes `&self` so detached fragments can be built while read handles
    /// into the document are alive.
    pub fn reserve_id(&self) -> NodeId {
        let id = self.next_id.get().max(self.nodes.len() as u32);
        self.next_id.set(id + 1);
        NodeId(id)
    }

    /// Build a detached element
    pub fn create_element(&self, tag: impl Into<String>, attributes: &[(&str, &str)]) -> Fragment {
        Fragment {
            id: self.reserve_id(),
            kind: NodeKind::Element {
                tag: tag.into(),
                attributes: attributes
                    .iter()
                    .map(|(name, value)| Attribute {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            },
            children: Vec::new(),
        }
    }

    /// Build a detached text node
    pub fn create_text(&self, text: impl Into<String>) -> Fragment {
        Fragment {
            id: self.reserve_id(),
            kind: NodeKind::Text { text: text.into() },
            children: Vec::new(),
        }
    }

    /// Copy of a live subtree, ids included
    pub fn snapshot(&self, id: NodeId) -> Option<Fragment> {
        let node = self.node(id)?;
        Some(Fragment {
            id,
            kind: node.data.kind.clone(),
            children: node
                .data
                .children
                .iter()
                .filter_map(|child| self.snapshot(*child))
                .collect(),
        })
    }

    // ---- tree primitives ----

    /// Insert a fragment under `parent`, before `reference` or at the end.
    ///
    /// A fragment whose root id names a detached subtree re-attaches that
    /// subtree as it is now; the fragment's content is not used then.
    pub fn insert(
        &mut self,
        parent: NodeId,
        fragment: Fragment,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let parent_data = self.data(parent)?;
        if !matches!(parent_data.kind, NodeKind::Element { .. }) {
            return Err(TreeError::NotAnElement(parent));
        }
        let position = match reference {
            Some(reference) => parent_data
                .children
                .iter()
                .position(|child| *child == reference)
                .ok_or(TreeError::NotAChild { parent, reference })?,
            None => parent_data.children.len(),
        };

        let existing = self.data(fragment.id).ok().map(|data| data.parent);
        let id = match existing {
            Some(Some(_)) => return Err(TreeError::IdInUse(fragment.id)),
            Some(None) if self.root == Some(fragment.id) => {
                return Err(TreeError::IdInUse(fragment.id))
            }
            Some(None) => {
                let cyclic = parent == fragment.id
                    || self
                        .node(parent)
                        .map_or(false, |node| node.ancestors().any(|a| a.id == fragment.id));
                if cyclic {
                    return Err(TreeError::Cycle(fragment.id));
                }
                if let Some(Some(data)) = self.nodes.get_mut(fragment.id.index()) {
                    data.parent = Some(parent);
                }
                fragment.id
            }
            None => {
                if let Some(taken) = fragment.ids().find(|id| self.contains(*id)) {
                    return Err(TreeError::IdInUse(taken));
                }
                self.attach(fragment, Some(parent))
            }
        };

        if let Some(Some(data)) = self.nodes.get_mut(parent.index()) {
            data.children.insert(position, id);
        }
        Ok(())
    }

    /// Detach a subtree, returning a copy of it with its former position.
    ///
    /// The detached nodes stay addressable: they can still be updated, have
    /// their own children removed, and be inserted again.
    pub fn remove(&mut self, id: NodeId) -> Result<Removed, TreeError> {
        let parent = match self.data(id)?.parent {
            Some(parent) => parent,
            None if self.root == Some(id) => return Err(TreeError::RootRemoval),
            None => return Err(TreeError::Detached(id)),
        };
        let fragment = self.snapshot(id).ok_or(TreeError::NodeNotFound(id))?;

        let mut next_sibling = None;
        if let Some(Some(data)) = self.nodes.get_mut(parent.index()) {
            if let Some(position) = data.children.iter().position(|child| *child == id) {
                data.children.remove(position);
                next_sibling = data.children.get(position).copied();
            }
        }
        if let Some(Some(data)) = self.nodes.get_mut(id.index()) {
            data.parent = None;
        }

        Ok(Removed {
            fragment,
            parent,
            next_sibling,
        })
    }

    /// Set or (with `None`) remove an attribute, returning the previous value
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<Option<String>, TreeError> {
        let data = self
            .nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(TreeError::NodeNotFound(id))?;
        let NodeKind::Element { attributes, .. } = &mut data.kind else {
            return Err(TreeError::NotAnElement(id));
        };

        let existing = attributes.iter().position(|attr| attr.name == name);
        let previous = match (existing, value) {
            (Some(index), Some(value)) => Some(std::mem::replace(
                &mut attributes[index].value,
                value.to_string(),
            )),
            (Some(index), None) => Some(attributes.remove(index).value),
            (None, Some(value)) => {
                attributes.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                });
                None
            }
            (None, None) => None,
        };
        Ok(previous)
    }

    fn data(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(TreeError::NodeNotFound(id))
    }

    /// Store a fragment's nodes under their own ids
    fn attach(&mut self, fragment: Fragment, parent: Option<NodeId>) -> NodeId {
        let Fragment { id, kind, children } = fragment;
        let child_ids = children
            .into_iter()
            .map(|child| self.attach(child, Some(id)))
            .collect();

        if self.nodes.len() <= id.index() {
            self.nodes.resize_with(id.index() + 1, || None);
        }
        self.nodes[id.index()] = Some(NodeData {
            kind,
            parent,
            children: child_ids,
        });
        if self.next_id.get() <= id.0 {
            self.next_id.set(id.0 + 1);
        }
        id
    }

    pub(crate) fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = self.reserve_id();
        let id = self.attach(
            Fragment {
                id,
                kind,
                children: Vec::new(),
            },
            parent,
        );
        if let Some(parent) = parent {
            if let Some(Some(data)) = self.nodes.get_mut(parent.index()) {
                data.children.push(id);
            }
        }
        id
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }
}

/// A subtree detached by [`Document::remove`]
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub fragment: Fragment,
    pub parent: NodeId,
    pub next_sibling: Option<NodeId>,
}

/// Borrowed handle to a live node
#[derive(Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a NodeData,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.data.kind
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data.kind, NodeKind::Text { .. })
    }

    pub fn tag_name(&self) -> Option<&'a str> {
        self.data.kind.tag_name()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_name() == Some(tag)
    }

    pub fn has_any_tag(&self, tags: &[&str]) -> bool {
        self.tag_name().map_or(false, |tag| tags.contains(&tag))
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.data.kind.attribute(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        match &self.data.kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data.parent.and_then(|id| self.doc.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let doc = self.doc;
        self.data.children.iter().filter_map(move |id| doc.node(*id))
    }

    pub fn element_children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.children().filter(Node::is_element)
    }

    /// Direct element children with the given tag
    pub fn children_by_tag(&self, tag: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.children().filter(move |child| child.has_tag(tag))
    }

    pub fn first_child(&self) -> Option<Node<'a>> {
        self.children().next()
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        std::iter::successors(self.parent(), Node::parent)
    }

    /// This node or its nearest ancestor carrying one of `tags`
    pub fn closest(&self, tags: &[&str]) -> Option<Node<'a>> {
        std::iter::once(*self)
            .chain(self.ancestors())
            .find(|node| node.has_any_tag(tags))
    }

    /// Every node below this one in document order
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            doc: self.doc,
            stack: self.data.children.iter().rev().copied().collect(),
        }
    }

    /// Descendant elements with the given tag in document order
    pub fn descendants_by_tag(&self, tag: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.descendants().filter(move |node| node.has_tag(tag))
    }

    pub fn descendants_by_any_tag(
        &self,
        tags: &'a [&'a str],
    ) -> impl Iterator<Item = Node<'a>> + 'a {
        self.descendants().filter(move |node| node.has_any_tag(tags))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        match &self.data.kind {
            NodeKind::Text { text } => text.clone(),
            NodeKind::Comment { .. } => String::new(),
            NodeKind::Element { .. } => self
                .descendants()
                .filter_map(|node| match &node.data.kind {
                    NodeKind::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Index among siblings, counting every node kind
    pub fn index(&self) -> usize {
        self.parent()
            .and_then(|parent| parent.data.children.iter().position(|id| *id == self.id))
            .unwrap_or(0)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data.kind {
            NodeKind::Element { tag, .. } => write!(f, "<{}>{}", tag, self.id),
            NodeKind::Text { text } => write!(f, "{:?}{}", text, self.id),
            NodeKind::Comment { .. } => write!(f, "<!---->{}", self.id),
        }
    }
}

/// Pre-order walk below a node
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.doc.node(id) {
                self.stack.extend(node.data.children.iter().rev().copied());
                return Some(node);
            }
        }
        None
    }
}

/// A detached subtree waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn tag_name(&self) -> Option<&str> {
        self.kind.tag_name()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.kind.attribute(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.kind {
            let value = value.into();
            match attributes.iter_mut().find(|attr| attr.name == name) {
                Some(attr) => attr.value = value,
                None => attributes.push(Attribute {
                    name: name.to_string(),
                    value,
                }),
            }
        }
    }

    pub fn push(&mut self, child: Fragment) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Fragment) -> Self {
        self.push(child);
        self
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Fragment> {
        self.children.iter().filter(|child| child.tag_name().is_some())
    }

    pub fn text_content(&self) -> String {
        match &self.kind {
            NodeKind::Text { text } => text.clone(),
            NodeKind::Comment { .. } => String::new(),
            NodeKind::Element { .. } => self.children.iter().map(Fragment::text_content).collect(),
        }
    }

    /// Ids of this node and all its descendants
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next.id)
        })
    }
}
