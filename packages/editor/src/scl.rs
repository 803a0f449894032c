//! SCL vocabulary shared by the mutators: edition detection, control block
//! kinds, service types and the null/empty attribute rule.

use scl_parser::ast::{Document, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Tags of the three control block kinds
pub const CONTROL_BLOCK_TAGS: [&str; 3] = ["ReportControl", "GSEControl", "SampledValueControl"];

/// Logical node tags able to own data sets, control blocks and inputs
pub const LOGICAL_NODE_TAGS: [&str; 2] = ["LN0", "LN"];

/// Optional attributes where absent and `""` mean the same thing
pub fn normalize(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

/// Compare two optional attribute values under the null/empty rule
pub fn same_normalized(a: Option<&str>, b: Option<&str>) -> bool {
    normalize(a) == normalize(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    /// IEC 61850 Edition 1: no `version` on the root, no `src*` on ExtRef
    Ed1,
    /// Edition 2 and later
    Ed2,
}

impl Edition {
    pub fn of(doc: &Document) -> Self {
        match doc.root() {
            Some(root) if root.has_tag("SCL") && root.has_attribute("version") => Edition::Ed2,
            _ => Edition::Ed1,
        }
    }

    pub fn of_node(node: Node<'_>) -> Self {
        Self::of(node.document())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlBlockKind {
    Report,
    Goose,
    SampledValue,
}

impl ControlBlockKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ReportControl" => Some(Self::Report),
            "GSEControl" => Some(Self::Goose),
            "SampledValueControl" => Some(Self::SampledValue),
            _ => None,
        }
    }

    pub fn of(node: Node<'_>) -> Option<Self> {
        node.tag_name().and_then(Self::from_tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Report => "ReportControl",
            Self::Goose => "GSEControl",
            Self::SampledValue => "SampledValueControl",
        }
    }

    /// `ExtRef/@serviceType` of subscriptions to this kind
    pub fn service_type(&self) -> &'static str {
        match self {
            Self::Report => "Report",
            Self::Goose => "GOOSE",
            Self::SampledValue => "SMV",
        }
    }
}

/// Communication element carrying a MAC-Address/APPID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommunicationKind {
    Gse,
    Smv,
}

impl CommunicationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Gse => "GSE",
            Self::Smv => "SMV",
        }
    }
}

impl fmt::Display for CommunicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `Address/P@type` values the mutators read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PType {
    #[serde(rename = "MAC-Address")]
    MacAddress,
    #[serde(rename = "APPID")]
    AppId,
    #[serde(rename = "VLAN-ID")]
    VlanId,
    #[serde(rename = "VLAN-PRIORITY")]
    VlanPriority,
}

impl PType {
    pub const ALL: [PType; 4] = [
        PType::MacAddress,
        PType::AppId,
        PType::VlanId,
        PType::VlanPriority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacAddress => "MAC-Address",
            Self::AppId => "APPID",
            Self::VlanId => "VLAN-ID",
            Self::VlanPriority => "VLAN-PRIORITY",
        }
    }

    pub fn from_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p_type| p_type.as_str() == value)
    }
}

impl fmt::Display for PType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the closest enclosing IED
pub fn ied_name<'a>(node: Node<'a>) -> Option<&'a str> {
    node.closest(&["IED"]).and_then(|ied| ied.attribute("name"))
}

/// First `<core>_001`, `<core>_002`, ... not yet taken as `name` by a `tag`
/// element below `scope`
pub fn unique_name(scope: Node<'_>, tag: &str, core: &str) -> String {
    let taken: HashSet<&str> = scope
        .descendants()
        .filter(|node| node.has_tag(tag))
        .filter_map(|node| node.attribute("name"))
        .collect();

    let mut index = 1;
    loop {
        let name = format!("{}_{:03}", core, index);
        if !taken.contains(name.as_str()) {
            return name;
        }
        index += 1;
    }
}
