//! Functionally constrained data (FCDA) inside a data set.

use scl_parser::ast::{Document, Node};
use tracing::{debug, instrument, trace};

use crate::actions::EditAction;
use crate::control_block::control_blocks;
use crate::ext_ref::{match_ext_ref_ctrl_block_attr, match_ext_ref_fcda, unsubscribe};
use crate::scl::{ied_name, normalize, Edition, LOGICAL_NODE_TAGS};

/// Subscribers of the data an FCDA publishes.
///
/// Edition 1 documents only match the data reference. Later editions also
/// require the subscription to name a control block publishing the FCDA's
/// data set.
pub fn find_fcda_subscription<'a>(fcda: Node<'a>) -> Vec<Node<'a>> {
    let Some(ied_name) = ied_name(fcda) else {
        return Vec::new();
    };
    let doc = fcda.document();

    if Edition::of(doc) == Edition::Ed1 {
        return data_subscribers(doc, ied_name, fcda).collect();
    }
    control_blocks(fcda)
        .into_iter()
        .flat_map(|ctrl_block| {
            data_subscribers(doc, ied_name, fcda)
                .filter(move |ext_ref| match_ext_ref_ctrl_block_attr(*ext_ref, ctrl_block))
        })
        .collect()
}

/// `ExtRef`s of `ied_name` pointing at the data of `fcda`
fn data_subscribers<'a>(
    doc: &'a Document,
    ied_name: &'a str,
    fcda: Node<'a>,
) -> impl Iterator<Item = Node<'a>> + 'a {
    doc.elements_by_tag("ExtRef")
        .filter(move |ext_ref| ext_ref.attribute("iedName") == Some(ied_name))
        .filter(move |ext_ref| match_ext_ref_fcda(*ext_ref, fcda))
}

/// Whether anything subscribes to the data of `fcda`
pub fn is_subscribed(fcda: Node<'_>) -> bool {
    !find_fcda_subscription(fcda).is_empty()
}

/// Actions removing FCDAs together with their subscriptions
#[instrument(skip_all, fields(fcdas = fcdas.len()))]
pub fn remove_fcdas(fcdas: &[Node<'_>]) -> Vec<EditAction> {
    let mut actions: Vec<EditAction> = fcdas.iter().copied().map(EditAction::remove).collect();

    let subscriptions: Vec<Node<'_>> = fcdas
        .iter()
        .flat_map(|fcda| find_fcda_subscription(*fcda))
        .collect();
    debug!(subscriptions = subscriptions.len(), "unsubscribing removed data");
    actions.extend(unsubscribe(&subscriptions));
    actions
}

pub fn remove_fcda(fcda: Node<'_>) -> Vec<EditAction> {
    remove_fcdas(&[fcda])
}

/// A data object path with the functional constraint to publish it under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcPath<'a> {
    pub path: Vec<Node<'a>>,
    pub fc: String,
}

/// The attribute tuple identifying an FCDA
#[derive(Debug, Clone, PartialEq, Eq)]
struct FcdaKey {
    ld_inst: String,
    prefix: String,
    ln_class: String,
    ln_inst: String,
    do_name: String,
    da_name: Option<String>,
    fc: String,
}

impl FcdaKey {
    /// Key of an existing FCDA, `None` when required attributes are missing
    fn of(fcda: Node<'_>) -> Option<Self> {
        Some(FcdaKey {
            ld_inst: fcda.attribute("ldInst")?.to_string(),
            prefix: normalize(fcda.attribute("prefix")).to_string(),
            ln_class: fcda.attribute("lnClass")?.to_string(),
            ln_inst: normalize(fcda.attribute("lnInst")).to_string(),
            do_name: fcda.attribute("doName")?.to_string(),
            da_name: fcda.attribute("daName").map(str::to_string),
            fc: fcda.attribute("fc")?.to_string(),
        })
    }

    /// Key for a path `LDevice > LN|LN0 > DO > SDO* [> DA > BDA*]`.
    ///
    /// With `fc` the path ends at the data object and the constraint is
    /// given, otherwise it is taken from the `DA`.
    fn from_path(path: &[Node<'_>], fc: Option<&str>) -> Option<Self> {
        let ld_inst = path
            .iter()
            .find(|section| section.has_tag("LDevice"))
            .and_then(|ld| ld.attribute("inst"))
            .filter(|inst| !inst.is_empty())?;
        let any_ln = path
            .iter()
            .find(|section| section.has_any_tag(&LOGICAL_NODE_TAGS))?;
        let ln_class = any_ln.attribute("lnClass").filter(|class| !class.is_empty())?;

        let mut do_name = String::new();
        let mut da_name = String::new();
        let mut da_fc = String::new();
        for section in path {
            let name = normalize(section.attribute("name"));
            match section.tag_name() {
                Some("DO") => do_name = name.to_string(),
                Some("SDO") => do_name = format!("{}.{}", do_name, name),
                Some("DA") if fc.is_none() => {
                    da_name = name.to_string();
                    da_fc = normalize(section.attribute("fc")).to_string();
                }
                Some("BDA") if fc.is_none() => da_name = format!("{}.{}", da_name, name),
                _ => {}
            }
        }

        let (da_name, fc) = match fc {
            Some(fc) => (None, fc.to_string()),
            None => (Some(da_name), da_fc),
        };
        if do_name.is_empty() || fc.is_empty() || da_name.as_deref() == Some("") {
            return None;
        }

        Some(FcdaKey {
            ld_inst: ld_inst.to_string(),
            prefix: normalize(any_ln.attribute("prefix")).to_string(),
            ln_class: ln_class.to_string(),
            ln_inst: normalize(any_ln.attribute("inst")).to_string(),
            do_name,
            da_name,
            fc,
        })
    }

    fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = vec![
            ("ldInst", self.ld_inst.as_str()),
            ("prefix", self.prefix.as_str()),
            ("lnClass", self.ln_class.as_str()),
            ("lnInst", self.ln_inst.as_str()),
            ("doName", self.do_name.as_str()),
        ];
        if let Some(da_name) = &self.da_name {
            attributes.push(("daName", da_name.as_str()));
        }
        attributes.push(("fc", self.fc.as_str()));
        attributes
    }
}

/// Inserts appending one FCDA per new key, skipping keys present in the data
/// set or earlier in the batch
fn insert_keys(data_set: Node<'_>, keys: impl Iterator<Item = Option<FcdaKey>>) -> Vec<EditAction> {
    let mut present: Vec<FcdaKey> = data_set
        .children_by_tag("FCDA")
        .filter_map(FcdaKey::of)
        .collect();

    let doc = data_set.document();
    let mut actions = Vec::new();
    for key in keys {
        let Some(key) = key else {
            debug!("skipping incomplete path");
            continue;
        };
        if present.contains(&key) {
            trace!(?key, "already in data set");
            continue;
        }
        let fcda = doc.create_element("FCDA", &key.attributes());
        actions.push(EditAction::insert(data_set.id(), fcda, None));
        present.push(key);
    }
    actions
}

/// Inserts adding data attributes, each given by its path from the
/// `LDevice` down to the (basic) data attribute
#[instrument(skip_all, fields(paths = paths.len()))]
pub fn add_fcdas(data_set: Node<'_>, paths: &[Vec<Node<'_>>]) -> Vec<EditAction> {
    insert_keys(
        data_set,
        paths.iter().map(|path| FcdaKey::from_path(path, None)),
    )
}

/// Inserts adding whole data objects under a functional constraint
#[instrument(skip_all, fields(paths = fc_paths.len()))]
pub fn add_fcdos(data_set: Node<'_>, fc_paths: &[FcPath<'_>]) -> Vec<EditAction> {
    insert_keys(
        data_set,
        fc_paths
            .iter()
            .map(|fc_path| FcdaKey::from_path(&fc_path.path, Some(fc_path.fc.as_str()))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Attributes;
    use crate::ext_ref::BINDING_ATTRIBUTES;
    use scl_parser::parse;

    const SUPERVISION: &str = include_str!("../tests/fixtures/subscription_supervision.scd");

    const SOURCE: &str = r#"<SCL version="2007">
        <IED name="IED1">
            <AccessPoint name="AP1"><Server><LDevice inst="ld1">
                <LN0 lnClass="LLN0" inst="">
                    <DataSet name="ds">
                        <FCDA ldInst="ld1" prefix="" lnClass="MMXU" lnInst="1" doName="A.phsA" daName="cVal.mag" fc="MX"/>
                    </DataSet>
                </LN0>
                <LN lnClass="MMXU" inst="1" lnType="MMXU"/>
            </LDevice></Server></AccessPoint>
        </IED>
        <DataTypeTemplates>
            <LNodeType id="MMXU" lnClass="MMXU"><DO name="A" type="WYE"/></LNodeType>
            <DOType id="WYE" cdc="WYE"><SDO name="phsA" type="CMV"/></DOType>
            <DOType id="CMV" cdc="CMV"><DA name="cVal" bType="Struct" type="Vector" fc="MX"/><DA name="q" bType="Quality" fc="MX"/></DOType>
            <DAType id="Vector"><BDA name="mag" bType="Struct"/><BDA name="ang" bType="Struct"/></DAType>
        </DataTypeTemplates>
    </SCL>"#;

    fn named<'a>(doc: &'a Document, tag: &'a str, name: &str) -> Node<'a> {
        doc.elements_by_tag(tag)
            .find(|node| node.attribute("name") == Some(name))
            .unwrap()
    }

    fn path<'a>(doc: &'a Document, leaf: &[(&'a str, &str)]) -> Vec<Node<'a>> {
        let mut path = vec![
            doc.elements_by_tag("LDevice").next().unwrap(),
            doc.elements_by_tag("LN").next().unwrap(),
        ];
        path.extend(leaf.iter().map(|(tag, name)| named(doc, tag, name)));
        path
    }

    fn inserted_attributes(action: &EditAction) -> Vec<(String, String)> {
        match action {
            EditAction::Insert { node, .. } => match &node.kind {
                scl_parser::NodeKind::Element { attributes, .. } => attributes
                    .iter()
                    .map(|attr| (attr.name.clone(), attr.value.clone()))
                    .collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_add_fcda_from_path() {
        let doc = parse(SOURCE).unwrap();
        let data_set = named(&doc, "DataSet", "ds");
        let ang = path(&doc, &[("DO", "A"), ("SDO", "phsA"), ("DA", "cVal"), ("BDA", "ang")]);

        let actions = add_fcdas(data_set, &[ang]);
        assert_eq!(actions.len(), 1);
        let attributes = inserted_attributes(&actions[0]);
        let expected: Vec<(String, String)> = [
            ("ldInst", "ld1"),
            ("prefix", ""),
            ("lnClass", "MMXU"),
            ("lnInst", "1"),
            ("doName", "A.phsA"),
            ("daName", "cVal.ang"),
            ("fc", "MX"),
        ]
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
        assert_eq!(attributes, expected);
    }

    #[test]
    fn test_add_fcda_skips_duplicates_and_incomplete_paths() {
        let doc = parse(SOURCE).unwrap();
        let data_set = named(&doc, "DataSet", "ds");
        let mag = path(&doc, &[("DO", "A"), ("SDO", "phsA"), ("DA", "cVal"), ("BDA", "mag")]);
        let q = path(&doc, &[("DO", "A"), ("SDO", "phsA"), ("DA", "q")]);
        let no_da = path(&doc, &[("DO", "A")]);

        assert!(add_fcdas(data_set, &[mag]).is_empty());
        assert!(add_fcdas(data_set, &[no_da]).is_empty());
        assert_eq!(add_fcdas(data_set, &[q.clone(), q]).len(), 1);
        assert!(add_fcdas(data_set, &[vec![named(&doc, "DO", "A")]]).is_empty());
    }

    #[test]
    fn test_add_fcdo() {
        let doc = parse(SOURCE).unwrap();
        let data_set = named(&doc, "DataSet", "ds");
        let fc_path = FcPath {
            path: path(&doc, &[("DO", "A"), ("SDO", "phsA")]),
            fc: "MX".to_string(),
        };

        let actions = add_fcdos(data_set, &[fc_path.clone()]);
        assert_eq!(actions.len(), 1);
        let attributes = inserted_attributes(&actions[0]);
        assert!(attributes.iter().all(|(name, _)| name != "daName"));
        assert!(attributes.contains(&("fc".to_string(), "MX".to_string())));

        let empty_fc = FcPath {
            fc: String::new(),
            ..fc_path
        };
        assert!(add_fcdos(data_set, &[empty_fc]).is_empty());
    }

    #[test]
    fn test_remove_fcdas_without_subscribers() {
        let doc = parse(SOURCE).unwrap();
        let fcda = doc.elements_by_tag("FCDA").next().unwrap();

        assert!(!is_subscribed(fcda));
        assert_eq!(remove_fcdas(&[fcda]), vec![EditAction::remove(fcda)]);
        assert_eq!(remove_fcda(fcda), remove_fcdas(&[fcda]));
    }

    fn without_version(source: &str) -> String {
        source.replace(r#"<SCL version="2007">"#, "<SCL>")
    }

    fn data<'a>(doc: &'a Document, do_name: &str, da_name: &str) -> Node<'a> {
        doc.elements_by_tag("FCDA")
            .find(|fcda| {
                fcda.attribute("doName") == Some(do_name) && fcda.attribute("daName") == Some(da_name)
            })
            .unwrap()
    }

    fn cleared(ext_ref: Node<'_>) -> EditAction {
        let attributes: Attributes = BINDING_ATTRIBUTES
            .iter()
            .map(|name| (*name, None::<String>))
            .collect();
        EditAction::update(ext_ref, attributes)
    }

    fn lgos<'a>(doc: &'a Document, inst: &str) -> Node<'a> {
        doc.elements_by_tag("LN")
            .find(|ln| ln.attribute("lnClass") == Some("LGOS") && ln.attribute("inst") == Some(inst))
            .unwrap()
    }

    #[test]
    fn test_remove_fcda_keeps_supervision_of_subscribed_block() {
        let doc = parse(SUPERVISION).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        let op_general = data(&doc, "Op", "general");

        assert_eq!(find_fcda_subscription(op_general), vec![ext_refs[0]]);
        assert_eq!(
            remove_fcda(op_general),
            vec![EditAction::remove(op_general), EditAction::remove(ext_refs[0])]
        );
    }

    #[test]
    fn test_remove_fcda_clears_later_binding_and_supervision() {
        let doc = parse(SUPERVISION).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        let beh_st_val = data(&doc, "Beh", "stVal");

        assert_eq!(find_fcda_subscription(beh_st_val), vec![ext_refs[2]]);
        assert_eq!(
            remove_fcda(beh_st_val),
            vec![
                EditAction::remove(beh_st_val),
                cleared(ext_refs[2]),
                EditAction::remove(lgos(&doc, "2")),
            ]
        );
    }

    #[test]
    fn test_remove_fcda_in_ed1_matches_data_only() {
        let doc = parse(&without_version(SUPERVISION)).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        let op_general = data(&doc, "Op", "general");
        let beh_st_val = data(&doc, "Beh", "stVal");

        assert_eq!(
            remove_fcda(op_general),
            vec![EditAction::remove(op_general), EditAction::remove(ext_refs[0])]
        );
        assert_eq!(
            remove_fcda(beh_st_val),
            vec![EditAction::remove(beh_st_val), cleared(ext_refs[2])]
        );
    }

    #[test]
    fn test_subscription_needs_matching_service_type() {
        let source = SUPERVISION.replacen(
            r#"<Inputs desc="GSE">"#,
            r#"<Inputs desc="GSE">
                <ExtRef iedName="srcIED" ldInst="someLDInst" lnClass="LLN0" doName="Op" daName="general" srcLDInst="someLDInst" srcLNClass="LLN0" srcCBName="someGse" serviceType="SMV"/>"#,
            1,
        );

        let doc = parse(&source).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        assert_eq!(ext_refs[0].attribute("serviceType"), Some("SMV"));
        assert_eq!(find_fcda_subscription(data(&doc, "Op", "general")), vec![ext_refs[1]]);

        let doc = parse(&without_version(&source)).unwrap();
        let ext_refs: Vec<_> = doc.elements_by_tag("ExtRef").collect();
        assert_eq!(
            find_fcda_subscription(data(&doc, "Op", "general")),
            vec![ext_refs[0], ext_refs[1]]
        );
    }
}
