//! Publisher side: control blocks, the data sets they publish and the
//! subscribers bound to them. Every relationship is looked up from the tree
//! on each call.

use scl_parser::ast::Node;
use tracing::{debug, instrument};

use crate::actions::EditAction;
use crate::data_set::remove_data_set;
use crate::ext_ref::{match_ext_ref_ctrl_block_attr, unsubscribe};
use crate::scl::{ied_name, normalize, same_normalized, CONTROL_BLOCK_TAGS, LOGICAL_NODE_TAGS};

/// IEC 61850-7-3 object reference `<ied><ldInst>/<prefix><lnClass><lnInst>.<name>`
pub fn control_block_object_reference(ctrl_block: Node<'_>) -> Option<String> {
    let ied_name = ied_name(ctrl_block)?;
    let ld_inst = ctrl_block.closest(&["LDevice"])?.attribute("inst")?;
    let ln = ctrl_block.closest(&LOGICAL_NODE_TAGS)?;
    let ln_class = ln.attribute("lnClass")?;
    let name = ctrl_block.attribute("name")?;

    Some(format!(
        "{}{}/{}{}{}.{}",
        ied_name,
        ld_inst,
        normalize(ln.attribute("prefix")),
        ln_class,
        normalize(ln.attribute("inst")),
        name
    ))
}

/// The control block an `ExtRef` names through its `iedName` and `src*`
/// attributes. Only `srcPrefix` and `srcLNInst` treat missing and empty alike.
pub fn control_block<'a>(ext_ref: Node<'a>) -> Option<Node<'a>> {
    let ied_name = ext_ref.attribute("iedName")?;
    let attr = |name: &str| ext_ref.attribute(name);

    ext_ref
        .document()
        .elements_by_tag("IED")
        .filter(|ied| ied.attribute("name") == Some(ied_name))
        .flat_map(|ied| ied.descendants_by_any_tag(&CONTROL_BLOCK_TAGS))
        .find(|ctrl_block| {
            let (Some(ld), Some(ln)) = (
                ctrl_block.closest(&["LDevice"]),
                ctrl_block.closest(&LOGICAL_NODE_TAGS),
            ) else {
                return false;
            };
            ld.attribute("inst") == attr("srcLDInst")
                && same_normalized(ln.attribute("prefix"), attr("srcPrefix"))
                && ln.attribute("lnClass") == attr("srcLNClass")
                && same_normalized(ln.attribute("inst"), attr("srcLNInst"))
                && ctrl_block.attribute("name") == attr("srcCBName")
        })
}

/// Control blocks of the same logical node publishing the data set of
/// `fcda_or_data_set`, in document order
pub fn control_blocks<'a>(fcda_or_data_set: Node<'a>) -> Vec<Node<'a>> {
    let Some(data_set) = fcda_or_data_set
        .closest(&["DataSet"])
        .and_then(|data_set| data_set.attribute("name"))
    else {
        return Vec::new();
    };
    let Some(ln) = fcda_or_data_set.closest(&LOGICAL_NODE_TAGS) else {
        return Vec::new();
    };

    ln.element_children()
        .filter(|child| child.has_any_tag(&CONTROL_BLOCK_TAGS))
        .filter(|child| child.attribute("datSet") == Some(data_set))
        .collect()
}

/// Subscribers of a control block anywhere in the document
pub fn find_ctrl_block_subscription<'a>(ctrl_block: Node<'a>) -> Vec<Node<'a>> {
    let Some(ied_name) = ied_name(ctrl_block) else {
        return Vec::new();
    };

    ctrl_block
        .document()
        .elements_by_tag("ExtRef")
        .filter(|ext_ref| ext_ref.attribute("iedName") == Some(ied_name))
        .filter(|ext_ref| match_ext_ref_ctrl_block_attr(*ext_ref, ctrl_block))
        .collect()
}

/// Actions removing a control block.
///
/// A data set shared with other control blocks stays and only this block's
/// subscribers are disconnected. A data set used by this block alone is
/// removed together with everything hanging off it.
#[instrument(skip_all, fields(name = ctrl_block.attribute("name")))]
pub fn remove_control_block(ctrl_block: Node<'_>) -> Vec<EditAction> {
    let mut actions = vec![EditAction::remove(ctrl_block)];

    let data_set = ctrl_block
        .attribute("datSet")
        .zip(ctrl_block.parent())
        .and_then(|(name, parent)| {
            parent
                .descendants_by_tag("DataSet")
                .find(|data_set| data_set.attribute("name") == Some(name))
        });
    let Some(data_set) = data_set else {
        debug!("no data set referenced");
        return actions;
    };

    if control_blocks(data_set).len() > 1 {
        debug!("data set shared, unsubscribing");
        actions.extend(unsubscribe(&find_ctrl_block_subscription(ctrl_block)));
    } else {
        debug!("data set exclusive, removing it");
        actions.extend(remove_data_set(data_set));
    }
    actions
}
