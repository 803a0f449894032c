//! Data set mutators: create, rename and remove.

use scl_parser::ast::Node;
use tracing::{debug, instrument};

use crate::actions::{Attributes, EditAction};
use crate::control_block::control_blocks;
use crate::fcda::remove_fcdas;
use crate::scl::{unique_name, LOGICAL_NODE_TAGS};
use crate::schema::insertion_reference;

/// Actions removing a data set.
///
/// Control blocks publishing it lose their `datSet`, its FCDAs are removed
/// and so is every subscription to them.
#[instrument(skip_all, fields(name = data_set.attribute("name")))]
pub fn remove_data_set(data_set: Node<'_>) -> Vec<EditAction> {
    let mut actions = vec![EditAction::remove(data_set)];

    let ctrl_blocks = control_blocks(data_set);
    debug!(ctrl_blocks = ctrl_blocks.len(), "detaching control blocks");
    actions.extend(ctrl_blocks.into_iter().map(|ctrl_block| {
        EditAction::update(ctrl_block, Attributes::from([("datSet", None)]))
    }));

    let fcdas: Vec<Node<'_>> = data_set.children_by_tag("FCDA").collect();
    actions.extend(remove_fcdas(&fcdas));
    actions
}

/// Actions updating data set attributes.
///
/// A new `name` is carried over to the `datSet` of every control block
/// publishing the data set. Detached data sets yield no actions.
pub fn update_data_set(data_set: Node<'_>, attributes: &Attributes) -> Vec<EditAction> {
    if data_set.parent().is_none() {
        return Vec::new();
    }

    let mut actions = vec![EditAction::update(data_set, attributes.clone())];
    let Some(name) = attributes.value("name").filter(|name| !name.is_empty()) else {
        return actions;
    };

    actions.extend(control_blocks(data_set).into_iter().map(|ctrl_block| {
        EditAction::update(ctrl_block, Attributes::from([("datSet", Some(name))]))
    }));
    actions
}

/// Insert of a new, empty data set.
///
/// `parent` is either the logical node to hold it or any element whose
/// first `LN0`/`LN` descendant is used. Without a given `name` the first
/// free `newDataSet_NNN` of that logical node is taken. `None` when there is
/// no logical node.
pub fn add_data_set(parent: Node<'_>, attributes: Option<&Attributes>) -> Option<EditAction> {
    let any_ln = if parent.has_any_tag(&LOGICAL_NODE_TAGS) {
        parent
    } else {
        parent.descendants_by_any_tag(&LOGICAL_NODE_TAGS).next()?
    };

    let name = attributes
        .and_then(|attributes| attributes.value("name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| unique_name(any_ln, "DataSet", "newDataSet"));

    let mut values = Attributes::new().with("name", Some(name));
    if let Some(attributes) = attributes {
        for (key, value) in attributes.iter().filter(|(key, _)| *key != "name") {
            values.set(key, value);
        }
    }

    let data_set = parent
        .document()
        .create_element("DataSet", &values.present());
    Some(EditAction::insert(
        any_ln.id(),
        data_set,
        insertion_reference(any_ln, "DataSet"),
    ))
}
