//! # GSE Communication
//!
//! The `GSE` element of a `ConnectedAP` carries the network side of a GOOSE
//! control block:
//!
//! ```text
//! <GSE ldInst=".." cbName="..">
//!     <Address>
//!         <P type="MAC-Address">01-0C-CD-01-00-03</P>
//!         <P type="APPID">0004</P>
//!         <P type="VLAN-ID">000</P>
//!         <P type="VLAN-PRIORITY">4</P>
//!     </Address>
//!     <MinTime unit="s" multiplier="m">8</MinTime>
//!     <MaxTime unit="s" multiplier="m">4096</MaxTime>
//! </GSE>
//! ```
//!
//! Changes replace whole elements: a changed address is written as a new
//! `Address` inserted before the old one is removed, times likewise.

use scl_parser::ast::{Document, Fragment, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::actions::EditAction;
use crate::generators::{AppIdGenerator, MacAddressGenerator};
use crate::scl::{ied_name, CommunicationKind, PType};
use crate::schema::insertion_reference;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

const DEFAULT_MIN_TIME: &str = "10";
const DEFAULT_MAX_TIME: &str = "10000";

/// A value of a `GSE`: one of the address parameters or a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GseField {
    Address(PType),
    MinTime,
    MaxTime,
}

/// New values by field, `None` clears a field. Fields left out are kept.
pub type GseValues = BTreeMap<GseField, Option<String>>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown GSE field {0:?}")]
pub struct UnknownGseField(String);

impl GseField {
    pub fn as_str(&self) -> &'static str {
        match self {
            GseField::Address(p_type) => p_type.as_str(),
            GseField::MinTime => "MinTime",
            GseField::MaxTime => "MaxTime",
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, GseField::MinTime | GseField::MaxTime)
    }

    /// The element holding this field's value in `gse`
    fn current<'a>(&self, gse: Node<'a>) -> Option<Node<'a>> {
        match self {
            GseField::Address(p_type) => address_parameter(gse, *p_type),
            GseField::MinTime => gse.children_by_tag("MinTime").next(),
            GseField::MaxTime => gse.children_by_tag("MaxTime").next(),
        }
    }
}

impl fmt::Display for GseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GseField {
    type Err = UnknownGseField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MinTime" => Ok(GseField::MinTime),
            "MaxTime" => Ok(GseField::MaxTime),
            other => PType::from_type(other)
                .map(GseField::Address)
                .ok_or_else(|| UnknownGseField(other.to_string())),
        }
    }
}

impl TryFrom<String> for GseField {
    type Error = UnknownGseField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GseField> for String {
    fn from(field: GseField) -> Self {
        field.as_str().to_string()
    }
}

fn address_parameter<'a>(gse: Node<'a>, p_type: PType) -> Option<Node<'a>> {
    gse.children_by_tag("Address")
        .flat_map(|address| address.children_by_tag("P"))
        .find(|p| p.attribute("type") == Some(p_type.as_str()))
}

/// The `GSE` of a `GSEControl`, found under the `ConnectedAP` of the control
/// block's IED and access point
pub fn referenced_gse<'a>(gse_control: Node<'a>) -> Option<Node<'a>> {
    let ied_name = ied_name(gse_control)?;
    let ap_name = gse_control.closest(&["AccessPoint"])?.attribute("name")?;
    let ld_inst = gse_control.closest(&["LDevice"])?.attribute("inst")?;
    let cb_name = gse_control.attribute("name")?;

    gse_control
        .document()
        .elements_by_tag("Communication")
        .flat_map(|communication| communication.children_by_tag("SubNetwork"))
        .flat_map(|sub_network| sub_network.children_by_tag("ConnectedAP"))
        .filter(|ap| ap.attribute("iedName") == Some(ied_name) && ap.attribute("apName") == Some(ap_name))
        .flat_map(|ap| ap.children_by_tag("GSE"))
        .find(|gse| gse.attribute("ldInst") == Some(ld_inst) && gse.attribute("cbName") == Some(cb_name))
}

/// Whether applying `values` (and `inst_type`, if given) would change `gse`.
///
/// Only fields present in `values` are compared. `inst_type` is compared
/// against the `xsi:type` of existing address parameters.
pub fn check_gse_diff(gse: Node<'_>, values: &GseValues, inst_type: Option<bool>) -> bool {
    values.iter().any(|(field, value)| {
        let current = field.current(gse);
        if current.map(|node| node.text_content()).as_deref() != value.as_deref() {
            return true;
        }
        match (inst_type, current) {
            (Some(inst_type), Some(p)) if !field.is_time() => {
                p.has_attribute("xsi:type") != inst_type
            }
            _ => false,
        }
    })
}

/// Actions bringing `gse` to `values`.
///
/// `inst_type` adds (`true`) or drops (`false`) `xsi:type` on every address
/// parameter. Unset, parameters keep their current typing.
#[instrument(skip_all, fields(ld_inst = gse.attribute("ldInst"), cb_name = gse.attribute("cbName")))]
pub fn update_gse(gse: Node<'_>, values: &GseValues, inst_type: Option<bool>) -> Vec<EditAction> {
    let (times, address): (GseValues, GseValues) = values
        .iter()
        .map(|(field, value)| (*field, value.clone()))
        .partition(|(field, _)| field.is_time());

    let mut actions = Vec::new();
    if check_gse_diff(gse, &address, inst_type) {
        debug!("address changed");
        actions.extend(replace_address(gse, &address, inst_type));
    }
    if check_gse_diff(gse, &times, None) {
        debug!("times changed");
        actions.extend(replace_times(gse, &times));
    }
    actions
}

fn xsi_declared(node: Node<'_>) -> bool {
    std::iter::once(node)
        .chain(node.ancestors())
        .any(|node| node.has_attribute("xmlns:xsi"))
}

fn address_element(
    doc: &Document,
    parameters: impl IntoIterator<Item = (PType, String, bool)>,
    declare_xsi: bool,
) -> Fragment {
    let mut address = doc.create_element("Address", &[]);
    for (p_type, value, typed) in parameters {
        let mut p = doc.create_element("P", &[("type", p_type.as_str())]);
        if typed {
            if declare_xsi {
                p.set_attribute("xmlns:xsi", XSI_NAMESPACE);
            }
            p.set_attribute("xsi:type", format!("tP_{}", p_type));
        }
        address.push(p.with_child(doc.create_text(value)));
    }
    address
}

fn time_element(doc: &Document, field: GseField, value: &str) -> Fragment {
    doc.create_element(field.as_str(), &[("unit", "s"), ("multiplier", "m")])
        .with_child(doc.create_text(value))
}

/// Insert a rebuilt `Address`, then remove the old one
fn replace_address(gse: Node<'_>, values: &GseValues, inst_type: Option<bool>) -> Vec<EditAction> {
    let doc = gse.document();
    let parameters = PType::ALL.into_iter().filter_map(|p_type| {
        let current = address_parameter(gse, p_type);
        let value = match values.get(&GseField::Address(p_type)) {
            Some(value) => value.clone(),
            None => current.map(|p| p.text_content()),
        }?;
        let typed = inst_type
            .unwrap_or_else(|| current.map_or(false, |p| p.has_attribute("xsi:type")));
        Some((p_type, value, typed))
    });
    let address = address_element(doc, parameters, !xsi_declared(gse));

    let mut actions = vec![EditAction::insert(
        gse.id(),
        address,
        insertion_reference(gse, "Address"),
    )];
    if let Some(old) = gse.children_by_tag("Address").next() {
        actions.push(EditAction::remove(old));
    }
    actions
}

/// Rewrite every time present in `values`, removing the old elements
fn replace_times(gse: Node<'_>, values: &GseValues) -> Vec<EditAction> {
    let doc = gse.document();
    let mut actions = Vec::new();

    for field in [GseField::MinTime, GseField::MaxTime] {
        let Some(value) = values.get(&field) else {
            continue;
        };
        if let Some(value) = value {
            actions.push(EditAction::insert(
                gse.id(),
                time_element(doc, field, value),
                insertion_reference(gse, field.as_str()),
            ));
        }
        if let Some(old) = field.current(gse) {
            actions.push(EditAction::remove(old));
        }
    }
    actions
}

/// Values for a new `GSE`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GseOptions {
    /// Address parameters, `MAC-Address` and `APPID` are generated if missing
    #[serde(default)]
    pub p_types: BTreeMap<PType, Option<String>>,
    pub min_time: Option<String>,
    pub max_time: Option<String>,
}

/// Inserts creating a `GSE` for the control block `cb_name` of `ld_inst`
/// inside `connected_ap`.
///
/// The `GSE` comes first, its `Address`, `MinTime` and `MaxTime` are
/// inserted into it by the following actions. Without free values left the
/// generated address parameters are omitted.
#[instrument(skip_all, fields(ld_inst = %ld_inst, cb_name = %cb_name))]
pub fn add_gse(
    connected_ap: Node<'_>,
    ld_inst: &str,
    cb_name: &str,
    options: &GseOptions,
) -> Vec<EditAction> {
    let doc = connected_ap.document();

    let given = |p_type: PType| {
        options
            .p_types
            .get(&p_type)
            .and_then(|value| value.clone())
            .filter(|value| !value.is_empty())
    };
    let mut parameters: BTreeMap<PType, String> = PType::ALL
        .into_iter()
        .filter_map(|p_type| given(p_type).map(|value| (p_type, value)))
        .collect();
    if !parameters.contains_key(&PType::MacAddress) {
        if let Some(mac) = MacAddressGenerator::new(doc, CommunicationKind::Gse).next() {
            parameters.insert(PType::MacAddress, mac);
        }
    }
    if !parameters.contains_key(&PType::AppId) {
        if let Some(app_id) = AppIdGenerator::new(doc, CommunicationKind::Gse, false).next() {
            parameters.insert(PType::AppId, app_id);
        }
    }
    debug!(parameters = parameters.len(), "address parameters");

    let gse = doc.create_element("GSE", &[("ldInst", ld_inst), ("cbName", cb_name)]);
    let gse_id = gse.id;
    let address = address_element(
        doc,
        parameters.into_iter().map(|(p_type, value)| (p_type, value, false)),
        false,
    );
    let min_time = options.min_time.as_deref().unwrap_or(DEFAULT_MIN_TIME);
    let max_time = options.max_time.as_deref().unwrap_or(DEFAULT_MAX_TIME);

    vec![
        EditAction::insert(
            connected_ap.id(),
            gse,
            insertion_reference(connected_ap, "GSE"),
        ),
        EditAction::insert(gse_id, address, None),
        EditAction::insert(gse_id, time_element(doc, GseField::MinTime, min_time), None),
        EditAction::insert(gse_id, time_element(doc, GseField::MaxTime, max_time), None),
    ]
}
