//! # Edit Actions
//!
//! The protocol every mutator in this crate speaks: an ordered list of
//! [`EditAction`]s computed from a read-only view of the document and
//! applied afterwards, in order, by the host.
//!
//! ## Semantics
//!
//! ### Remove
//! - Detaches a node (element or text) together with its subtree
//! - The detached nodes remain addressable, so later actions of the same
//!   list may update them or remove their children
//! - Inverse: insert the same subtree back before its former next sibling
//!
//! ### Update
//! - Sets each named attribute, `None` removes the attribute
//! - Inverse: update with the previous values
//!
//! ### Insert
//! - Inserts a detached fragment before `reference`, or appends
//! - Fragment ids are reserved by the document that created them, so later
//!   actions in the same list may use the inserted node as a parent
//! - Inverse: remove the inserted node

use indexmap::IndexMap;
use scl_parser::ast::{Document, Fragment, Node, NodeId};
use scl_parser::TreeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute changes of an update, or attributes of a new element.
///
/// Keeps insertion order so created elements serialize their attributes in
/// the order they were given. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Option<String>>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<impl Into<String>>) {
        self.0.insert(name.into(), value.map(Into::into));
    }

    pub fn with(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.set(name, value);
        self
    }

    /// `None` when the attribute is not part of the change set,
    /// `Some(None)` when it is explicitly nulled
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0.get(name).map(|value| value.as_deref())
    }

    /// The non-null value of an attribute
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Option<String>> {
        self.0.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Non-null pairs, as taken by `Document::create_element`
    pub fn present(&self) -> Vec<(&str, &str)> {
        self.iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.map(Into::into)))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, Option<&str>); N]> for Attributes {
    fn from(pairs: [(&str, Option<&str>); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// One step of an edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EditAction {
    /// Detach a node from its parent
    Remove { node: NodeId },

    /// Set or (with `None`) remove attributes of an element
    Update {
        element: NodeId,
        attributes: Attributes,
    },

    /// Insert `node` as child of `parent` before `reference`, or append
    Insert {
        parent: NodeId,
        node: Fragment,
        reference: Option<NodeId>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid structure: {0}")]
    InvalidStructure(#[from] TreeError),
}

impl EditAction {
    pub fn remove(node: Node<'_>) -> Self {
        EditAction::Remove { node: node.id() }
    }

    pub fn update(element: Node<'_>, attributes: Attributes) -> Self {
        EditAction::Update {
            element: element.id(),
            attributes,
        }
    }

    pub fn insert(parent: NodeId, node: Fragment, reference: Option<Node<'_>>) -> Self {
        EditAction::Insert {
            parent,
            node,
            reference: reference.map(|node| node.id()),
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, EditAction::Remove { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, EditAction::Update { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, EditAction::Insert { .. })
    }

    /// Apply the action, returning the action that reverts it
    pub fn apply(&self, doc: &mut Document) -> Result<EditAction, MutationError> {
        match self {
            EditAction::Remove { node } => Self::apply_remove(doc, *node),

            EditAction::Update {
                element,
                attributes,
            } => Self::apply_update(doc, *element, attributes),

            EditAction::Insert {
                parent,
                node,
                reference,
            } => Self::apply_insert(doc, *parent, node, *reference),
        }
    }

    fn apply_remove(doc: &mut Document, node: NodeId) -> Result<EditAction, MutationError> {
        if !doc.contains(node) {
            return Err(MutationError::NodeNotFound(node));
        }
        let removed = doc.remove(node)?;

        Ok(EditAction::Insert {
            parent: removed.parent,
            node: removed.fragment,
            reference: removed.next_sibling,
        })
    }

    fn apply_update(
        doc: &mut Document,
        element: NodeId,
        attributes: &Attributes,
    ) -> Result<EditAction, MutationError> {
        if !doc.contains(element) {
            return Err(MutationError::NodeNotFound(element));
        }

        let mut previous = Attributes::new();
        for (name, value) in attributes.iter() {
            let old = doc.set_attribute(element, name, value)?;
            // first value wins if a name repeats
            if !previous.contains(name) {
                previous.set(name, old);
            }
        }

        Ok(EditAction::Update {
            element,
            attributes: previous,
        })
    }

    fn apply_insert(
        doc: &mut Document,
        parent: NodeId,
        node: &Fragment,
        reference: Option<NodeId>,
    ) -> Result<EditAction, MutationError> {
        if !doc.contains(parent) {
            return Err(MutationError::NodeNotFound(parent));
        }
        doc.insert(parent, node.clone(), reference)?;

        Ok(EditAction::Remove { node: node.id })
    }
}

/// Apply an action list in order, all or nothing.
///
/// Returns the inverse actions in the order they must be applied to revert
/// the whole list. On failure everything applied so far is rolled back
/// before the error is returned.
pub fn apply_transaction(
    doc: &mut Document,
    actions: &[EditAction],
) -> Result<Vec<EditAction>, MutationError> {
    let mut inverses: Vec<EditAction> = Vec::with_capacity(actions.len());

    for action in actions {
        match action.apply(doc) {
            Ok(inverse) => inverses.push(inverse),
            Err(err) => {
                for inverse in inverses.iter().rev() {
                    if let Err(rollback) = inverse.apply(doc) {
                        tracing::error!(%rollback, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
    }

    inverses.reverse();
    Ok(inverses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl_parser::{parse, serialize};

    const SOURCE: &str = r#"<SCL version="2007">
        <IED name="IED1">
            <LDevice inst="ld1"/>
            <LDevice inst="ld2"/>
        </IED>
    </SCL>"#;

    fn find<'a>(doc: &'a Document, tag: &'a str, attr: &str, value: &str) -> Node<'a> {
        doc.elements_by_tag(tag)
            .find(|node| node.attribute(attr) == Some(value))
            .unwrap()
    }

    #[test]
    fn test_remove_inverse_restores_position() {
        let mut doc = parse(SOURCE).unwrap();
        let before = serialize(&doc);
        let ld1 = find(&doc, "LDevice", "inst", "ld1").id();

        let inverse = EditAction::Remove { node: ld1 }.apply(&mut doc).unwrap();
        assert!(inverse.is_insert());
        assert_eq!(doc.elements_by_tag("LDevice").count(), 1);

        inverse.apply(&mut doc).unwrap();
        assert_eq!(serialize(&doc), before);
    }

    #[test]
    fn test_update_inverse_restores_values() {
        let mut doc = parse(SOURCE).unwrap();
        let ied = find(&doc, "IED", "name", "IED1").id();

        let update = EditAction::Update {
            element: ied,
            attributes: Attributes::from([("name", Some("IED2")), ("desc", Some("d"))]),
        };
        let inverse = update.apply(&mut doc).unwrap();
        assert_eq!(
            inverse,
            EditAction::Update {
                element: ied,
                attributes: Attributes::from([("name", Some("IED1")), ("desc", None)]),
            }
        );

        inverse.apply(&mut doc).unwrap();
        let ied = doc.node(ied).unwrap();
        assert_eq!(ied.attribute("name"), Some("IED1"));
        assert!(!ied.has_attribute("desc"));
    }

    #[test]
    fn test_insert_then_insert_into_inserted() {
        let mut doc = parse(SOURCE).unwrap();
        let ied = find(&doc, "IED", "name", "IED1");
        let ld2 = find(&doc, "LDevice", "inst", "ld2");

        let ld = doc.create_element("LDevice", &[("inst", "ld0")]);
        let ln0 = doc.create_element("LN0", &[("lnClass", "LLN0")]);
        let actions = vec![
            EditAction::insert(ld.id, ln0, None),
            EditAction::insert(ied.id(), ld, Some(ld2)),
        ];
        // inserted out of order: the LDevice is not there yet
        assert!(apply_transaction(&mut doc, &actions).is_err());

        let actions: Vec<_> = actions.into_iter().rev().collect();
        apply_transaction(&mut doc, &actions).unwrap();
        let order: Vec<_> = doc
            .elements_by_tag("LDevice")
            .map(|ld| ld.attribute("inst").unwrap())
            .collect();
        assert_eq!(order, vec!["ld1", "ld0", "ld2"]);
        assert_eq!(doc.elements_by_tag("LN0").count(), 1);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let mut doc = parse(SOURCE).unwrap();
        let before = serialize(&doc);
        let ld1 = find(&doc, "LDevice", "inst", "ld1").id();
        let ied = find(&doc, "IED", "name", "IED1").id();

        let actions = vec![
            EditAction::Update {
                element: ied,
                attributes: Attributes::from([("name", Some("X"))]),
            },
            EditAction::Remove { node: ld1 },
            EditAction::Remove { node: ld1 },
        ];
        let err = apply_transaction(&mut doc, &actions).unwrap_err();
        assert_eq!(
            err,
            MutationError::InvalidStructure(TreeError::Detached(ld1))
        );
        assert_eq!(serialize(&doc), before);
    }

    #[test]
    fn test_actions_reach_into_removed_subtree() {
        let mut doc = parse(SOURCE).unwrap();
        let before = serialize(&doc);
        let ied = find(&doc, "IED", "name", "IED1").id();
        let ld1 = find(&doc, "LDevice", "inst", "ld1").id();

        let actions = vec![
            EditAction::Remove { node: ied },
            EditAction::Update {
                element: ld1,
                attributes: Attributes::from([("inst", None)]),
            },
            EditAction::Remove { node: ld1 },
        ];
        let inverses = apply_transaction(&mut doc, &actions).unwrap();
        assert_eq!(doc.elements_by_tag("IED").count(), 0);

        apply_transaction(&mut doc, &inverses).unwrap();
        assert_eq!(serialize(&doc), before);
    }

    #[test]
    fn test_transaction_inverses_revert_all() {
        let mut doc = parse(SOURCE).unwrap();
        let before = serialize(&doc);
        let ld1 = find(&doc, "LDevice", "inst", "ld1").id();
        let ld2 = find(&doc, "LDevice", "inst", "ld2").id();

        let inverses = apply_transaction(
            &mut doc,
            &[EditAction::Remove { node: ld1 }, EditAction::Remove { node: ld2 }],
        )
        .unwrap();
        apply_transaction(&mut doc, &inverses).unwrap();
        assert_eq!(serialize(&doc), before);
    }

    #[test]
    fn test_action_json_shape() {
        let action = EditAction::Update {
            element: NodeId(4),
            attributes: Attributes::from([("datSet", None)]),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "update");
        assert_eq!(json["element"], 4);
        assert!(json["attributes"]["datSet"].is_null());
    }

    #[test]
    fn test_attributes_equality_ignores_order() {
        let a = Attributes::from([("a", Some("1")), ("b", None)]);
        let b = Attributes::from([("b", None), ("a", Some("1"))]);
        assert_eq!(a, b);
        assert_eq!(a.get("b"), Some(None));
        assert_eq!(a.get("c"), None);
        assert_eq!(a.value("a"), Some("1"));
    }
}
