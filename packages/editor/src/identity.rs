//! # Element Identity
//!
//! A textual identity for every element, built from the identities of its
//! ancestors and a tag specific key:
//!
//! ```text
//! IED                 IED1
//! LDevice             IED1>>ld1
//! LN0                 IED1>>ld1>
//! LN                  IED1>>ld1>CB XCBR 1
//! GSEControl          IED1>>ld1>>gse
//! ConnectedAP         StationBus>IED1 AP1
//! GSE                 StationBus>IED1 AP1>ld1 gse
//! ```
//!
//! Siblings sharing tag and key get a positional suffix (`[1]`, `[2]`, ...),
//! which keeps identities unique per tag within a document.
//!
//! `LDevice` identities skip `AccessPoint` and `Server`, so they are only
//! unique while each `inst` occurs once per IED. Two access points holding
//! the same `inst` yield the same identity, and a [`Selector`] resolves it
//! to the first one.
//!
//! A [`Selector`] pairs a tag with an identity and finds the element again.

use scl_parser::ast::{Document, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tags whose identity does not include their parent
const TOP_LEVEL: [&str; 7] = [
    "IED",
    "SubNetwork",
    "Substation",
    "LNodeType",
    "DOType",
    "DAType",
    "EnumType",
];

/// Tags that occur at most once under their parent
const SINGLETONS: [&str; 11] = [
    "SCL",
    "Header",
    "Communication",
    "DataTypeTemplates",
    "Services",
    "Server",
    "Address",
    "Inputs",
    "LN0",
    "MinTime",
    "MaxTime",
];

/// Identity of an element, `None` for text and comment nodes.
/// Assumes `LDevice/@inst` is unique per IED.
pub fn identity(node: Node<'_>) -> Option<String> {
    let tag = node.tag_name()?;
    let key = positional(node, tag, own_key(node, tag));

    if TOP_LEVEL.contains(&tag) {
        return Some(key);
    }
    if tag == "LDevice" {
        if let Some(ied) = node.closest(&["IED"]) {
            return Some(format!("{}>>{}", identity(ied)?, key));
        }
    }
    match node.parent() {
        Some(parent) => Some(format!("{}>{}", identity(parent)?, key)),
        None => Some(key),
    }
}

fn own_key(node: Node<'_>, tag: &str) -> String {
    let attr = |name: &str| node.attribute(name).unwrap_or("");

    match tag {
        t if SINGLETONS.contains(&t) => String::new(),
        "ConnectedAP" => format!("{} {}", attr("iedName"), attr("apName")),
        "GSE" | "SMV" => format!("{} {}", attr("ldInst"), attr("cbName")),
        "P" | "Private" | "PhysConn" => attr("type").to_string(),
        "LDevice" => attr("inst").to_string(),
        "LN" => format!("{} {} {}", attr("prefix"), attr("lnClass"), attr("inst")),
        "FCDA" => format!(
            "{}/{} {} {}.{} {} ({})",
            attr("ldInst"),
            attr("prefix"),
            attr("lnClass"),
            attr("lnInst"),
            attr("doName"),
            attr("daName"),
            attr("fc")
        ),
        "ExtRef" => {
            let mut key = String::new();
            if node.has_attribute("iedName") {
                key = format!(
                    "{} {}/{} {} {} {} {}",
                    attr("iedName"),
                    attr("ldInst"),
                    attr("prefix"),
                    attr("lnClass"),
                    attr("lnInst"),
                    attr("doName"),
                    attr("daName")
                );
                if let Some(cb_name) = node.attribute("srcCBName") {
                    key.push_str(&format!(" {}", cb_name));
                }
            }
            if let Some(int_addr) = node.attribute("intAddr") {
                key.push_str(&format!("@{}", int_addr));
            }
            key
        }
        "Val" => attr("sGroup").to_string(),
        "EnumVal" => attr("ord").to_string(),
        "LNodeType" | "DOType" | "DAType" | "EnumType" => attr("id").to_string(),
        _ => attr("name").to_string(),
    }
}

/// Append `[n]` when `n` earlier siblings share tag and key
fn positional(node: Node<'_>, tag: &str, key: String) -> String {
    let Some(parent) = node.parent() else {
        return key;
    };
    let earlier = parent
        .children()
        .take_while(|sibling| *sibling != node)
        .filter(|sibling| sibling.has_tag(tag) && own_key(*sibling, tag) == key)
        .count();

    if earlier == 0 {
        key
    } else {
        format!("{}[{}]", key, earlier)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid selector {0:?}: expected \"<Tag>: <identity>\"")]
pub struct SelectorError(String);

/// Tag plus identity, written `Tag: identity`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    pub tag: String,
    pub identity: String,
}

/// Selector for the element of `tag` carrying `identity`
pub fn selector(tag: &str, identity: &str) -> Selector {
    Selector {
        tag: tag.to_string(),
        identity: identity.to_string(),
    }
}

impl Selector {
    pub fn of(node: Node<'_>) -> Option<Self> {
        Some(selector(node.tag_name()?, &identity(node)?))
    }

    /// The element this selector names
    pub fn find<'a>(&self, doc: &'a Document) -> Option<Node<'a>> {
        doc.elements_by_tag(&self.tag)
            .find(|node| identity(*node).as_deref() == Some(self.identity.as_str()))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.identity)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, identity) = s
            .split_once(": ")
            .or_else(|| s.strip_suffix(':').map(|tag| (tag, "")))
            .ok_or_else(|| SelectorError(s.to_string()))?;
        if tag.is_empty() || tag.contains(char::is_whitespace) {
            return Err(SelectorError(s.to_string()));
        }
        Ok(selector(tag, identity))
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}
