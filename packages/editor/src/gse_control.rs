//! GOOSE control block mutators.

use scl_parser::ast::Node;
use tracing::{debug, instrument};

use crate::actions::{Attributes, EditAction};
use crate::connected_ap::connected_ap;
use crate::control_block::{control_block_object_reference, find_ctrl_block_subscription};
use crate::gse::{add_gse, referenced_gse, GseOptions};
use crate::identity::identity;
use crate::scl::unique_name;
use crate::schema::insertion_reference;

/// Actions updating `GSEControl` attributes.
///
/// A rename is followed through: subscribing `ExtRef`s get the new
/// `srcCBName`, supervision values holding the old object reference are
/// rewritten and the referenced `GSE` gets the new `cbName`.
#[instrument(skip_all, fields(name = gse_control.attribute("name")))]
pub fn update_gse_control(gse_control: Node<'_>, attributes: &Attributes) -> Vec<EditAction> {
    let mut actions = vec![EditAction::update(gse_control, attributes.clone())];
    let Some(name) = attributes.value("name").filter(|name| !name.is_empty()) else {
        return actions;
    };

    let subscribers = find_ctrl_block_subscription(gse_control);
    debug!(subscribers = subscribers.len(), "renaming source of subscribers");
    actions.extend(subscribers.into_iter().map(|ext_ref| {
        EditAction::update(ext_ref, Attributes::from([("srcCBName", Some(name))]))
    }));

    if let Some(reference) = control_block_object_reference(gse_control) {
        let path = reference
            .rsplit_once('.')
            .map_or(reference.as_str(), |(path, _)| path);
        let renamed = format!("{}.{}", path, name);
        let doc = gse_control.document();

        for val in doc
            .elements_by_tag("Val")
            .filter(|val| val.text_content() == reference)
        {
            if let Some(text) = val.first_child() {
                actions.push(EditAction::remove(text));
            }
            actions.push(EditAction::insert(
                val.id(),
                doc.create_text(renamed.as_str()),
                None,
            ));
        }
    }

    if let Some(gse) = referenced_gse(gse_control) {
        actions.push(EditAction::update(
            gse,
            Attributes::from([("cbName", Some(name))]),
        ));
    }
    actions
}

/// Inserts creating a `GSEControl` in the `LN0` of `parent`.
///
/// `parent` is the `LN0` itself or an element containing one (`IED`,
/// `LDevice`, ...). Missing attributes get defaults: a free
/// `newGSEControl_NNN` name, `confRev="1"`, `type="GOOSE"` and an `appId`
/// derived from the `LN0` identity. When the access point is connected, the
/// matching `GSE` is created as well. `None` for `LN` parents and when there
/// is no `LN0`.
#[instrument(skip_all, fields(parent = ?parent))]
pub fn add_gse_control(parent: Node<'_>, attributes: Option<&Attributes>) -> Option<Vec<EditAction>> {
    if parent.has_tag("LN") {
        return None;
    }
    let ln0 = if parent.has_tag("LN0") {
        parent
    } else {
        parent.descendants_by_tag("LN0").next()?
    };

    let given = |name: &str| attributes.and_then(|attributes| attributes.value(name));
    let name = given("name")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| unique_name(ln0, "GSEControl", "newGSEControl"));
    let app_id = given("appId")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}{}", identity(ln0).unwrap_or_default(), name));

    let mut values = Attributes::new()
        .with("name", Some(name.as_str()))
        .with("desc", given("desc"))
        .with("confRev", Some(given("confRev").unwrap_or("1")))
        .with("type", Some(given("type").unwrap_or("GOOSE")))
        .with("appId", Some(app_id));
    let extra: Vec<(&str, Option<&str>)> = attributes
        .into_iter()
        .flat_map(Attributes::iter)
        .filter(|(key, _)| !values.contains(key))
        .collect();
    for (key, value) in extra {
        values.set(key, value);
    }

    let doc = ln0.document();
    let gse_control = doc.create_element("GSEControl", &values.present());
    let mut actions = vec![EditAction::insert(
        ln0.id(),
        gse_control,
        insertion_reference(ln0, "GSEControl"),
    )];

    let ld_inst = ln0.closest(&["LDevice"]).and_then(|ld| ld.attribute("inst"));
    match (connected_ap(ln0), ld_inst) {
        (Some(connected_ap), Some(ld_inst)) => {
            actions.extend(add_gse(connected_ap, ld_inst, &name, &GseOptions::default()));
        }
        _ => debug!("access point not connected, no GSE created"),
    }
    Some(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::apply_transaction;
    use scl_parser::ast::{Document, Fragment};
    use scl_parser::parse;

    const SIMPLE: &str = r#"<SCL>
        <Communication>
            <ConnectedAP iedName="someOtherIED" apName="AP1">
                <GSE ldInst="" cbName="">
                    <Address/>
                    <MinTime multiplier="m" unit="s">9</MinTime>
                    <MaxTime multiplier="m" unit="s">987</MaxTime>
                </GSE>
            </ConnectedAP>
        </Communication>
        <IED name="someIED">
            <AccessPoint name="AP1">
                <LDevice inst="first">
                    <LN0 lnClass="LLN0" inst="1">
                        <GSEControl name="newGSEControl_001"/>
                        <GSEControl name="newGSEControl_002"/>
                        <GSEControl name="newGSEControl_004"/>
                    </LN0>
                    <LN lnClass="MMXU" inst="1">
                        <GSEControl name="newGSEControl_001"/>
                    </LN>
                    <LN lnClass="MMXU" inst="2"/>
                </LDevice>
                <LDevice inst="second"/>
                <LDevice inst="third">
                    <LN0 lnClass="LLN0" inst=""/>
                </LDevice>
            </AccessPoint>
        </IED>
        <IED name="someOtherIED">
            <AccessPoint name="AP1">
                <LDevice inst="first">
                    <LN0 lnClass="LLN0" inst="">
                        <GSEControl name="gseControl"/>
                    </LN0>
                </LDevice>
            </AccessPoint>
        </IED>
    </SCL>"#;

    fn ld<'a>(doc: &'a Document, ied: &str, inst: &str) -> Node<'a> {
        doc.elements_by_tag("LDevice")
            .find(|ld| {
                ld.attribute("inst") == Some(inst)
                    && ld.closest(&["IED"]).and_then(|ied| ied.attribute("name")) == Some(ied)
            })
            .unwrap()
    }

    fn first_insert(actions: &[EditAction]) -> &Fragment {
        match &actions[0] {
            EditAction::Insert { node, .. } => node,
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_add_with_defaults() {
        let doc = parse(SIMPLE).unwrap();
        let ied = doc.elements_by_tag("IED").next().unwrap();

        let actions = add_gse_control(ied, None).unwrap();
        assert_eq!(actions.len(), 1);
        let gse_control = first_insert(&actions);
        assert_eq!(gse_control.attribute("name"), Some("newGSEControl_003"));
        assert_eq!(gse_control.attribute("confRev"), Some("1"));
        assert_eq!(gse_control.attribute("type"), Some("GOOSE"));
        assert_eq!(gse_control.attribute("appId"), Some("someIED>>first>newGSEControl_003"));
        assert!(!gse_control.has_attribute("desc"));
    }

    #[test]
    fn test_add_to_empty_ln0() {
        let doc = parse(SIMPLE).unwrap();
        let ln0 = ld(&doc, "someIED", "third").element_children().next().unwrap();

        let actions = add_gse_control(ln0, None).unwrap();
        assert_eq!(first_insert(&actions).attribute("name"), Some("newGSEControl_001"));
        assert_eq!(
            first_insert(&actions).attribute("appId"),
            Some("someIED>>third>newGSEControl_001")
        );
    }

    #[test]
    fn test_add_to_invalid_parents() {
        let doc = parse(SIMPLE).unwrap();
        let ln = doc.elements_by_tag("LN").next().unwrap();

        assert_eq!(add_gse_control(ld(&doc, "someIED", "second"), None), None);
        assert_eq!(add_gse_control(ln, None), None);
    }

    #[test]
    fn test_add_with_given_attributes() {
        let doc = parse(SIMPLE).unwrap();
        let ln0 = doc.elements_by_tag("LN0").next().unwrap();
        let attributes = Attributes::from([
            ("name", Some("newGSEControl_001")),
            ("desc", Some("someDesc")),
            ("confRev", Some("2")),
            ("type", Some("GSSE")),
            ("appId", Some("someAppID")),
        ]);

        let actions = add_gse_control(ln0, Some(&attributes)).unwrap();
        assert_eq!(actions.len(), 1);
        let gse_control = first_insert(&actions);
        assert_eq!(gse_control.attribute("desc"), Some("someDesc"));
        assert_eq!(gse_control.attribute("confRev"), Some("2"));
        assert_eq!(gse_control.attribute("type"), Some("GSSE"));
        assert_eq!(gse_control.attribute("appId"), Some("someAppID"));
    }

    #[test]
    fn test_add_with_empty_name() {
        let doc = parse(SIMPLE).unwrap();
        let ln0 = doc.elements_by_tag("LN0").next().unwrap();
        let attributes = Attributes::from([("name", Some(""))]);

        let actions = add_gse_control(ln0, Some(&attributes)).unwrap();
        let gse_control = first_insert(&actions);
        assert_eq!(gse_control.attribute("name"), Some("newGSEControl_003"));
        assert_eq!(gse_control.attribute("appId"), Some("someIED>>first>newGSEControl_003"));
    }

    #[test]
    fn test_add_creates_gse_for_connected_access_point() {
        let mut doc = parse(SIMPLE).unwrap();
        let ld = ld(&doc, "someOtherIED", "first");

        let actions = add_gse_control(ld, None).unwrap();
        assert_eq!(actions.len(), 5);

        apply_transaction(&mut doc, &actions).unwrap();
        let gse = doc
            .elements_by_tag("GSE")
            .find(|gse| gse.attribute("cbName") == Some("newGSEControl_001"))
            .unwrap();
        assert_eq!(gse.attribute("ldInst"), Some("first"));
        assert_eq!(gse.element_children().count(), 3);
    }

    #[test]
    fn test_add_without_ld_inst_skips_gse() {
        let mut doc = parse(SIMPLE).unwrap();
        let ld = ld(&doc, "someOtherIED", "first").id();
        EditAction::Update {
            element: ld,
            attributes: Attributes::from([("inst", None)]),
        }
        .apply(&mut doc)
        .unwrap();
        let ied = doc.elements_by_tag("IED").nth(1).unwrap();

        assert_eq!(add_gse_control(ied, None).map(|actions| actions.len()), Some(1));
    }

    #[test]
    fn test_update_without_rename() {
        let doc = parse(SIMPLE).unwrap();
        let gse_control = doc.elements_by_tag("GSEControl").next().unwrap();
        let attributes = Attributes::from([("desc", Some("someDesc")), ("type", Some("GSSE"))]);

        assert_eq!(
            update_gse_control(gse_control, &attributes),
            vec![EditAction::update(gse_control, attributes)]
        );
    }
}
