//! # Subscription Supervision
//!
//! `LGOS` (GOOSE) and `LSVS` (sampled values) logical nodes in a subscriber
//! IED monitor one subscription each through
//! `DOI[GoCBRef|SvCBRef] > DAI[setSrcRef] > Val`, whose text is the object
//! reference of the supervised control block.
//!
//! Supervision carrying a `Private[type="OpenSCD.create"]` child was created
//! by an editor and may be removed as a whole logical node. Anything else is
//! only pruned at the `DOI`.

use indexmap::IndexMap;
use scl_parser::ast::Node;
use tracing::{debug, instrument};

use crate::actions::EditAction;
use crate::control_block::{control_block, control_block_object_reference};
use crate::scl::{same_normalized, ControlBlockKind, Edition, LOGICAL_NODE_TAGS};

/// `Private/@type` of supervision nodes created by an editor
pub const EDITOR_CREATED_MARKER: &str = "OpenSCD.create";

/// Who created a supervision logical node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Carries the editor marker, the whole LN may go
    EditorCreated,
    /// Came with the IED configuration, only the DOI may go
    Configured,
}

/// A supervision `DOI` and the logical node holding it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Supervision<'a> {
    pub ln: Node<'a>,
    pub doi: Node<'a>,
    pub provenance: Provenance,
}

impl<'a> Supervision<'a> {
    /// The node to remove once the supervised subscription is gone
    pub fn removable(&self) -> Node<'a> {
        match self.provenance {
            Provenance::EditorCreated => self.ln,
            Provenance::Configured => self.doi,
        }
    }
}

fn supervision_ln_class(kind: ControlBlockKind) -> &'static str {
    match kind {
        ControlBlockKind::Goose => "LGOS",
        _ => "LSVS",
    }
}

fn provenance(ln: Node<'_>) -> Provenance {
    let marked = ln
        .children_by_tag("Private")
        .any(|private| private.attribute("type") == Some(EDITOR_CREATED_MARKER));
    if marked {
        Provenance::EditorCreated
    } else {
        Provenance::Configured
    }
}

/// The supervision of `ctrl_block` inside `subscriber_ied`, if any
pub fn subscriber_supervision<'a>(
    ctrl_block: Node<'_>,
    subscriber_ied: Node<'a>,
) -> Option<Supervision<'a>> {
    let kind = ControlBlockKind::of(ctrl_block)?;
    let reference = control_block_object_reference(ctrl_block)?;
    let ln_class = supervision_ln_class(kind);

    let val = subscriber_ied
        .descendants_by_any_tag(&LOGICAL_NODE_TAGS)
        .filter(|ln| ln.attribute("lnClass") == Some(ln_class))
        .flat_map(|ln| ln.children_by_tag("DOI"))
        .flat_map(|doi| doi.children_by_tag("DAI"))
        .flat_map(|dai| dai.children_by_tag("Val"))
        .find(|val| val.text_content() == reference)?;

    let ln = val.closest(&LOGICAL_NODE_TAGS)?;
    let doi = val.closest(&["DOI"])?;
    Some(Supervision {
        ln,
        doi,
        provenance: provenance(ln),
    })
}

/// Whether the data type template lets an editor change `setSrcRef` of the
/// supervision of `ctrl_block`. False whenever anything is missing.
pub fn is_src_ref_editable(ctrl_block: Node<'_>, subscriber_ied: Node<'_>) -> bool {
    let Some(supervision) = subscriber_supervision(ctrl_block, subscriber_ied) else {
        return false;
    };
    let ln = supervision.ln;
    let Some(ln_class) = ln.attribute("lnClass") else {
        return false;
    };
    let do_name = if ln_class == "LGOS" { "GoCBRef" } else { "SvCBRef" };
    let Some(templates) = ln
        .document()
        .root()
        .and_then(|root| root.children_by_tag("DataTypeTemplates").next())
    else {
        return false;
    };

    let data_object = templates
        .children_by_tag("LNodeType")
        .filter(|ln_type| {
            ln_type.attribute("id") == ln.attribute("lnType")
                && ln_type.attribute("lnClass") == Some(ln_class)
        })
        .flat_map(|ln_type| ln_type.children_by_tag("DO"))
        .find(|data_object| data_object.attribute("name") == Some(do_name));
    let Some(do_type) = data_object.and_then(|data_object| data_object.attribute("type")) else {
        return false;
    };

    let set_src_ref = templates
        .children_by_tag("DOType")
        .filter(|candidate| candidate.attribute("id") == Some(do_type))
        .flat_map(|candidate| candidate.children_by_tag("DA"))
        .find(|da| da.attribute("name") == Some("setSrcRef"));

    set_src_ref.map_or(false, |da| {
        matches!(da.attribute("valKind"), Some("Conf") | Some("RO"))
            && da.attribute("valImport") == Some("true")
    })
}

/// Whether another `ExtRef` of the same IED, outside `group`, subscribes to
/// the same control block as the first member of `group`
fn other_subscriber_of_same_block(group: &[Node<'_>]) -> bool {
    let Some(first) = group.first() else {
        return false;
    };
    let Some(ied) = first.closest(&["IED"]) else {
        return false;
    };
    let exact = ["srcCBName", "srcLDInst", "srcLNClass", "iedName", "serviceType"];
    let loose = ["srcPrefix", "srcLNInst"];

    ied.descendants_by_tag("ExtRef").any(|other| {
        !group.contains(&other)
            && loose
                .iter()
                .all(|name| same_normalized(other.attribute(name), first.attribute(name)))
            && exact
                .iter()
                .all(|name| other.attribute(name) == first.attribute(name))
    })
}

struct Group<'a> {
    ext_refs: Vec<Node<'a>>,
    ctrl_block: Node<'a>,
    subscriber_ied: Node<'a>,
}

/// Removals of supervision that monitors only subscriptions in `ext_refs`.
/// Edition 1 documents have no supervision to remove.
#[instrument(skip_all, fields(ext_refs = ext_refs.len()))]
pub fn remove_subscription_supervision(ext_refs: &[Node<'_>]) -> Vec<EditAction> {
    let Some(first) = ext_refs.first() else {
        return Vec::new();
    };
    if Edition::of_node(*first) == Edition::Ed1 {
        return Vec::new();
    }

    let mut groups: IndexMap<String, Group<'_>> = IndexMap::new();
    for ext_ref in ext_refs {
        let Some(ctrl_block) = control_block(*ext_ref) else {
            continue;
        };
        let Some(reference) = control_block_object_reference(ctrl_block) else {
            continue;
        };
        let Some(subscriber_ied) = ext_ref.closest(&["IED"]) else {
            continue;
        };
        groups
            .entry(reference)
            .or_insert_with(|| Group {
                ext_refs: Vec::new(),
                ctrl_block,
                subscriber_ied,
            })
            .ext_refs
            .push(*ext_ref);
    }

    groups
        .into_iter()
        .filter_map(|(reference, group)| {
            if other_subscriber_of_same_block(&group.ext_refs) {
                debug!(%reference, "supervision kept, control block still subscribed");
                return None;
            }
            if !is_src_ref_editable(group.ctrl_block, group.subscriber_ied) {
                debug!(%reference, "supervision kept, setSrcRef not editable");
                return None;
            }
            let supervision = subscriber_supervision(group.ctrl_block, group.subscriber_ied)?;
            Some(EditAction::remove(supervision.removable()))
        })
        .collect()
}
