//! Subscriber side: matching `ExtRef`s against published data and control
//! blocks, and the unsubscribe cascade.

use scl_parser::ast::{Node, NodeId};
use tracing::{debug, instrument, trace};

use crate::actions::{Attributes, EditAction};
use crate::scl::{same_normalized, ControlBlockKind, Edition, LOGICAL_NODE_TAGS};
use crate::supervision::remove_subscription_supervision;

/// Attributes binding an `ExtRef` to its source, cleared for later binding refs
pub const BINDING_ATTRIBUTES: [&str; 13] = [
    "iedName",
    "ldInst",
    "prefix",
    "lnClass",
    "lnInst",
    "doName",
    "daName",
    "srcLDInst",
    "srcPrefix",
    "srcLNClass",
    "srcLNInst",
    "srcCBName",
    "serviceType",
];

/// Whether `ext_ref` points at the data `fcda` describes
pub fn match_ext_ref_fcda(ext_ref: Node<'_>, fcda: Node<'_>) -> bool {
    let exact = |name: &str| ext_ref.attribute(name) == fcda.attribute(name);
    let loose = |name: &str| same_normalized(ext_ref.attribute(name), fcda.attribute(name));

    exact("ldInst")
        && loose("prefix")
        && exact("lnClass")
        && loose("lnInst")
        && exact("doName")
        && loose("daName")
}

/// Whether the `src*` and `serviceType` attributes of `ext_ref` name
/// `ctrl_block`. Always false in Edition 1 documents.
pub fn match_ext_ref_ctrl_block_attr(ext_ref: Node<'_>, ctrl_block: Node<'_>) -> bool {
    if Edition::of_node(ext_ref) == Edition::Ed1 {
        return false;
    }
    let Some(kind) = ControlBlockKind::of(ctrl_block) else {
        return false;
    };
    let Some(ln) = ctrl_block.closest(&LOGICAL_NODE_TAGS) else {
        return false;
    };
    let Some(ld_inst) = ctrl_block.closest(&["LDevice"]).and_then(|ld| ld.attribute("inst")) else {
        return false;
    };

    ext_ref.attribute("srcCBName") == ctrl_block.attribute("name")
        && ext_ref.attribute("srcLDInst") == Some(ld_inst)
        && same_normalized(ext_ref.attribute("srcPrefix"), ln.attribute("prefix"))
        && same_normalized(ext_ref.attribute("srcLNInst"), ln.attribute("inst"))
        && ext_ref.attribute("srcLNClass") == ln.attribute("lnClass")
        && ext_ref.attribute("serviceType") == Some(kind.service_type())
}

/// Actions disconnecting `ext_refs` from their sources.
///
/// Later binding refs (with `intAddr`) keep their element and lose the
/// binding attributes, all others are removed. `Inputs` left without any
/// `ExtRef` are removed next, then supervision no longer needed.
#[instrument(skip_all, fields(ext_refs = ext_refs.len()))]
pub fn unsubscribe(ext_refs: &[Node<'_>]) -> Vec<EditAction> {
    let mut seen: Vec<NodeId> = Vec::new();
    let ext_refs: Vec<Node<'_>> = ext_refs
        .iter()
        .copied()
        .filter(|ext_ref| {
            let fresh = !seen.contains(&ext_ref.id());
            seen.push(ext_ref.id());
            fresh
        })
        .collect();

    let mut actions = Vec::new();
    let mut removed = Vec::new();
    for ext_ref in &ext_refs {
        if ext_ref.attribute("intAddr").map_or(false, |addr| !addr.is_empty()) {
            trace!(ext_ref = ?ext_ref, "clearing later binding reference");
            let attributes = BINDING_ATTRIBUTES
                .iter()
                .map(|name| (*name, None::<String>))
                .collect::<Attributes>();
            actions.push(EditAction::update(*ext_ref, attributes));
        } else {
            actions.push(EditAction::remove(*ext_ref));
            removed.push(*ext_ref);
        }
    }

    actions.extend(empty_inputs(&removed));
    let supervision = remove_subscription_supervision(&ext_refs);
    debug!(
        actions = actions.len(),
        supervision = supervision.len(),
        "unsubscribe planned"
    );
    actions.extend(supervision);
    actions
}

/// Removals for parents losing all of their `ExtRef`s
fn empty_inputs(removed: &[Node<'_>]) -> Vec<EditAction> {
    let mut parents: Vec<Node<'_>> = Vec::new();
    for parent in removed.iter().filter_map(Node::parent) {
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    parents
        .into_iter()
        .filter(|parent| {
            let removed_here = removed
                .iter()
                .filter(|ext_ref| ext_ref.parent().as_ref() == Some(parent))
                .count();
            parent.descendants_by_tag("ExtRef").count() == removed_here
        })
        .map(EditAction::remove)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl_parser::parse;

    const ED2: &str = r#"<SCL version="2007">
        <IED name="Publisher">
            <AccessPoint name="AP1"><Server><LDevice inst="ld1">
                <LN0 lnClass="LLN0" inst="">
                    <GSEControl name="gse" datSet="ds"/>
                </LN0>
                <LN prefix="" lnClass="XCBR" inst="1">
                    <SampledValueControl name="smv" datSet="ds"/>
                </LN>
            </LDevice></Server></AccessPoint>
        </IED>
        <IED name="Subscriber">
            <AccessPoint name="AP1"><Server><LDevice inst="ld1">
                <LN0 lnClass="LLN0">
                    <Inputs>
                        <ExtRef iedName="Publisher" ldInst="ld1" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" serviceType="GOOSE" srcLDInst="ld1" srcLNClass="LLN0" srcCBName="gse"/>
                        <ExtRef iedName="Publisher" ldInst="ld1" prefix="" lnClass="XCBR" lnInst="1" doName="Pos" daName="q" serviceType="GOOSE" srcLDInst="ld1" srcLNClass="LLN0" srcCBName="gse" intAddr="in2"/>
                    </Inputs>
                </LN0>
                <LN lnClass="GGIO" inst="1">
                    <Inputs>
                        <ExtRef iedName="Publisher" ldInst="ld1" lnClass="XCBR" lnInst="1" doName="Pos" serviceType="SMV" srcLDInst="ld1" srcLNClass="XCBR" srcLNInst="1" srcCBName="smv"/>
                    </Inputs>
                </LN>
            </LDevice></Server></AccessPoint>
        </IED>
    </SCL>"#;

    #[test]
    fn test_match_fcda_normalizes_optional_attributes() {
        let doc = parse(ED2).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        let data = parse(
            r#"<FCDA ldInst="ld1" prefix="" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" fc="ST"/>"#,
        )
        .unwrap();
        let fcda = data.root().unwrap();

        assert!(match_ext_ref_fcda(ext_refs[0], fcda));
        assert!(!match_ext_ref_fcda(ext_refs[1], fcda));
        assert!(!match_ext_ref_fcda(ext_refs[2], fcda));
    }

    #[test]
    fn test_match_control_block_attributes() {
        let doc = parse(ED2).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        let gse = doc.elements_by_tag("GSEControl").next().unwrap();
        let smv = doc.elements_by_tag("SampledValueControl").next().unwrap();

        assert!(match_ext_ref_ctrl_block_attr(ext_refs[0], gse));
        assert!(match_ext_ref_ctrl_block_attr(ext_refs[1], gse));
        assert!(!match_ext_ref_ctrl_block_attr(ext_refs[2], gse));
        assert!(match_ext_ref_ctrl_block_attr(ext_refs[2], smv));
    }

    #[test]
    fn test_match_control_block_is_false_in_ed1() {
        let doc = parse(&ED2.replace(r#"<SCL version="2007">"#, "<SCL>")).unwrap();
        let gse = doc.elements_by_tag("GSEControl").next().unwrap();
        assert!(doc
            .elements_by_tag("ExtRef")
            .all(|ext_ref| !match_ext_ref_ctrl_block_attr(ext_ref, gse)));
    }

    #[test]
    fn test_unsubscribe_removes_and_clears() {
        let doc = parse(ED2).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").take(2).collect();

        let actions = unsubscribe(&ext_refs);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], EditAction::remove(ext_refs[0]));
        match &actions[1] {
            EditAction::Update {
                element,
                attributes,
            } => {
                assert_eq!(*element, ext_refs[1].id());
                assert_eq!(attributes.len(), 13);
                assert!(attributes.iter().all(|(_, value)| value.is_none()));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_unsubscribe_removes_emptied_inputs() {
        let doc = parse(ED2).unwrap();
        let last = doc.elements_by_tag("ExtRef").last().unwrap();

        let actions = unsubscribe(&[last, last]);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], EditAction::remove(last));
        assert_eq!(actions[1], EditAction::remove(last.parent().unwrap()));
    }

    #[test]
    fn test_unsubscribe_empty() {
        assert!(unsubscribe(&[]).is_empty());
    }
}
