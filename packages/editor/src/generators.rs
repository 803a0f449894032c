//! Allocation of unused `MAC-Address` and `APPID` values.
//!
//! A generator takes the values in use from the document once and then hands
//! out the free values of its range in increasing order. Values it returned
//! are never returned again, even after [`refresh`](MacAddressGenerator::refresh)
//! picked up later changes of the document. Once the range is used up the
//! generator yields `None` for good.

use scl_parser::ast::Document;
use std::collections::BTreeSet;
use std::iter::FusedIterator;
use std::ops::Range;
use tracing::trace;

use crate::scl::{CommunicationKind, PType};

const GSE_MAC_RANGE: Range<u64> = 0x010c_cd01_0000..0x010c_cd01_01ff;
const SMV_MAC_RANGE: Range<u64> = 0x010c_cd04_0000..0x010c_cd04_01ff;

const GSE_APPID_RANGE: Range<u64> = 0x0000..0x3fff;
const GSE_TRIP_APPID_RANGE: Range<u64> = 0x8000..0xbfff;
const SMV_APPID_RANGE: Range<u64> = 0x4000..0x7fff;

/// Free values of a numeric range
#[derive(Debug, Clone)]
struct Pool {
    kind: CommunicationKind,
    p_type: PType,
    range: Range<u64>,
    cursor: u64,
    used: BTreeSet<u64>,
}

impl Pool {
    fn new(
        doc: &Document,
        kind: CommunicationKind,
        p_type: PType,
        range: Range<u64>,
    ) -> Self {
        let mut pool = Pool {
            kind,
            p_type,
            cursor: range.start,
            range,
            used: BTreeSet::new(),
        };
        pool.scan(doc);
        pool
    }

    /// Collect the values under `<GSE|SMV> > Address > P[type]`
    fn scan(&mut self, doc: &Document) {
        let values = doc
            .elements_by_tag(self.kind.tag())
            .flat_map(|element| element.children_by_tag("Address"))
            .flat_map(|address| address.children_by_tag("P"))
            .filter(|p| p.attribute("type") == Some(self.p_type.as_str()))
            .filter_map(|p| parse_value(self.p_type, p.text_content().trim()))
            .collect::<Vec<_>>();
        self.used.extend(values);
    }

    fn refresh(&mut self, doc: &Document) {
        self.scan(doc);
        self.cursor = self.range.start;
    }

    fn next(&mut self) -> Option<u64> {
        while self.cursor < self.range.end {
            let candidate = self.cursor;
            self.cursor += 1;
            if self.used.insert(candidate) {
                return Some(candidate);
            }
        }
        trace!(kind = %self.kind, p_type = %self.p_type, "range exhausted");
        None
    }
}

fn parse_value(p_type: PType, value: &str) -> Option<u64> {
    match p_type {
        PType::MacAddress => parse_mac(value),
        _ => u64::from_str_radix(value, 16).ok(),
    }
}

fn parse_mac(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(|c| *c != '-').collect();
    if digits.len() != 12 {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}

fn format_mac(value: u64) -> String {
    let digits = format!("{:012X}", value);
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Unused multicast MAC addresses, `01-0C-CD-01-..` for GOOSE and
/// `01-0C-CD-04-..` for sampled values
#[derive(Debug, Clone)]
pub struct MacAddressGenerator {
    pool: Pool,
}

impl MacAddressGenerator {
    pub fn new(doc: &Document, kind: CommunicationKind) -> Self {
        let range = match kind {
            CommunicationKind::Gse => GSE_MAC_RANGE,
            CommunicationKind::Smv => SMV_MAC_RANGE,
        };
        Self {
            pool: Pool::new(doc, kind, PType::MacAddress, range),
        }
    }

    /// Take in values added to the document since the generator was created
    pub fn refresh(&mut self, doc: &Document) {
        self.pool.refresh(doc);
    }
}

impl Iterator for MacAddressGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.pool.next().map(format_mac)
    }
}

impl FusedIterator for MacAddressGenerator {}

/// Unused 4 digit hex APPIDs
#[derive(Debug, Clone)]
pub struct AppIdGenerator {
    pool: Pool,
}

impl AppIdGenerator {
    /// `type1a` selects the trip GOOSE range, it has no effect for SMV
    pub fn new(doc: &Document, kind: CommunicationKind, type1a: bool) -> Self {
        let range = match (kind, type1a) {
            (CommunicationKind::Gse, false) => GSE_APPID_RANGE,
            (CommunicationKind::Gse, true) => GSE_TRIP_APPID_RANGE,
            (CommunicationKind::Smv, _) => SMV_APPID_RANGE,
        };
        Self {
            pool: Pool::new(doc, kind, PType::AppId, range),
        }
    }

    pub fn refresh(&mut self, doc: &Document) {
        self.pool.refresh(doc);
    }
}

impl Iterator for AppIdGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.pool.next().map(|value| format!("{:04X}", value))
    }
}

impl FusedIterator for AppIdGenerator {}
