//! Access point to subnetwork connections.

use scl_parser::ast::Node;

use crate::scl::ied_name;

/// The `ConnectedAP` of the access point `element` lives in
pub fn connected_ap<'a>(element: Node<'a>) -> Option<Node<'a>> {
    let ied_name = ied_name(element)?;
    let ap_name = element.closest(&["AccessPoint"])?.attribute("name")?;

    element
        .document()
        .elements_by_tag("ConnectedAP")
        .find(|ap| ap.attribute("iedName") == Some(ied_name) && ap.attribute("apName") == Some(ap_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl_parser::parse;

    #[test]
    fn test_connected_ap_of_nested_element() {
        let doc = parse(
            r#"<SCL>
                <Communication><SubNetwork name="Bus">
                    <ConnectedAP iedName="IED1" apName="AP2"/>
                    <ConnectedAP iedName="IED1" apName="AP1"/>
                </SubNetwork></Communication>
                <IED name="IED1">
                    <AccessPoint name="AP1"><Server><LDevice inst="ld1"/></Server></AccessPoint>
                    <AccessPoint name="AP3"><Server><LDevice inst="ld3"/></Server></AccessPoint>
                </IED>
            </SCL>"#,
        )
        .unwrap();
        let lds: Vec<_> = doc.elements_by_tag("LDevice").collect();

        assert_eq!(
            connected_ap(lds[0]).and_then(|ap| ap.attribute("apName")),
            Some("AP1")
        );
        assert_eq!(connected_ap(lds[1]), None);
        assert_eq!(connected_ap(doc.root().unwrap()), None);
    }
}
