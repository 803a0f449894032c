//! Child element order of the SCL schema, used to place new elements.

use scl_parser::ast::Node;

/// Child sequence of `parent_tag`, if it is one the mutators insert into
fn sequence(parent_tag: &str) -> Option<&'static [&'static str]> {
    let sequence: &'static [&'static str] = match parent_tag {
        "SCL" => &[
            "Private",
            "Text",
            "Header",
            "Substation",
            "Communication",
            "IED",
            "DataTypeTemplates",
            "Line",
            "Process",
        ],
        "Communication" => &["Private", "Text", "SubNetwork"],
        "SubNetwork" => &["Private", "Text", "BitRate", "ConnectedAP"],
        "ConnectedAP" => &["Private", "Text", "Address", "GSE", "SMV", "PhysConn"],
        "GSE" => &["Private", "Text", "Address", "MinTime", "MaxTime"],
        "SMV" => &["Private", "Text", "Address"],
        "IED" => &["Private", "Text", "Services", "AccessPoint", "KDC"],
        "AccessPoint" => &["Private", "Text", "Server", "LN", "ServerAt", "Services", "GOOSESecurity", "SMVSecurity"],
        "Server" => &["Private", "Text", "Authentication", "LDevice", "Association"],
        "LDevice" => &["Private", "Text", "LN0", "LN", "AccessControl"],
        "LN0" => &[
            "Private",
            "Text",
            "DataSet",
            "ReportControl",
            "LogControl",
            "DOI",
            "Inputs",
            "Log",
            "GSEControl",
            "SampledValueControl",
            "SettingControl",
        ],
        "LN" => &[
            "Private",
            "Text",
            "DataSet",
            "ReportControl",
            "LogControl",
            "DOI",
            "Inputs",
            "Log",
        ],
        "DataSet" => &["Private", "Text", "FCDA", "FCCB"],
        "DOI" => &["Private", "Text", "SDI", "DAI"],
        "SDI" => &["Private", "Text", "SDI", "DAI"],
        "DAI" => &["Private", "Text", "Val"],
        _ => return None,
    };
    Some(sequence)
}

/// The child of `parent` a new `tag` element goes before.
///
/// That is the first child whose tag comes after `tag` in the schema
/// sequence, so the new element ends the run of its own tag. `None` means
/// append, also for parents or tags outside the known sequences.
pub fn insertion_reference<'a>(parent: Node<'a>, tag: &str) -> Option<Node<'a>> {
    let sequence = sequence(parent.tag_name()?)?;
    let position = sequence.iter().position(|candidate| *candidate == tag)?;
    let later = &sequence[position + 1..];

    parent.element_children().find(|child| child.has_any_tag(later))
}
