//! Record-type table, record keys and record payloads.
//!
//! Record types are identified on the wire by the integer object code the
//! server's schema registry assigns to them. Every code the client knows
//! about is listed once in [`RecordType::ALL`]; nothing else in the
//! workspace spells out a raw code.

use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::value::Value;

/// Document subtypes sharing the document record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// A/R invoice.
    Invoice,
    /// Delivery note.
    DeliveryNote,
    /// Sales order.
    SalesOrder,
    /// Purchase order.
    PurchaseOrder,
    /// Sales quotation.
    Quotation,
    /// Purchase request.
    PurchaseRequest,
}

/// A record type known to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Business partner master data; child rows are contact employees.
    BusinessPartner,
    /// Application user.
    User,
    /// Marketing document; child rows are document lines.
    Document(DocumentKind),
    /// Business partner catalogue number mapping.
    CatalogMapping,
}

/// Shape of the key that identifies a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Server-generated integer entry.
    Entry,
    /// Caller-assigned code.
    Code,
    /// Item code, partner code and current substitute.
    Composite,
}

/// Static description of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTypeInfo {
    /// Object code used on the wire.
    pub code: u32,
    /// Name of the server table holding header rows.
    pub table: &'static str,
    /// Short name used on command lines.
    pub name: &'static str,
    /// Key shape.
    pub key_kind: KeyKind,
    /// Header fields that make up the key, in key order.
    pub key_fields: &'static [&'static str],
    /// Name of the child-row collection, if the type has one.
    pub lines: Option<&'static str>,
}

const DOCUMENT_KEY: &[&str] = &["DocEntry"];
const DOCUMENT_LINES: Option<&str> = Some("DocumentLines");

impl RecordType {
    /// Every record type, in object-code order.
    pub const ALL: [RecordType; 9] = [
        RecordType::BusinessPartner,
        RecordType::User,
        RecordType::Document(DocumentKind::Invoice),
        RecordType::Document(DocumentKind::DeliveryNote),
        RecordType::Document(DocumentKind::SalesOrder),
        RecordType::Document(DocumentKind::PurchaseOrder),
        RecordType::Document(DocumentKind::Quotation),
        RecordType::CatalogMapping,
        RecordType::Document(DocumentKind::PurchaseRequest),
    ];

    /// Static description of this record type.
    pub fn info(self) -> RecordTypeInfo {
        match self {
            RecordType::BusinessPartner => RecordTypeInfo {
                code: 2,
                table: "OCRD",
                name: "partner",
                key_kind: KeyKind::Code,
                key_fields: &["CardCode"],
                lines: Some("ContactEmployees"),
            },
            RecordType::User => RecordTypeInfo {
                code: 12,
                table: "OUSR",
                name: "user",
                key_kind: KeyKind::Entry,
                key_fields: &["InternalKey"],
                lines: None,
            },
            RecordType::CatalogMapping => RecordTypeInfo {
                code: 206,
                table: "OSCN",
                name: "catalog-mapping",
                key_kind: KeyKind::Composite,
                key_fields: &["ItemCode", "CardCode", "Substitute"],
                lines: None,
            },
            RecordType::Document(kind) => {
                let (code, table, name) = match kind {
                    DocumentKind::Invoice => (13, "OINV", "invoice"),
                    DocumentKind::DeliveryNote => (15, "ODLN", "delivery-note"),
                    DocumentKind::SalesOrder => (17, "ORDR", "sales-order"),
                    DocumentKind::PurchaseOrder => (22, "OPOR", "purchase-order"),
                    DocumentKind::Quotation => (23, "OQUT", "quotation"),
                    DocumentKind::PurchaseRequest => (1_470_000_113, "OPRQ", "purchase-request"),
                };
                RecordTypeInfo {
                    code,
                    table,
                    name,
                    key_kind: KeyKind::Entry,
                    key_fields: DOCUMENT_KEY,
                    lines: DOCUMENT_LINES,
                }
            }
        }
    }

    /// Object code used on the wire.
    pub fn code(self) -> u32 {
        self.info().code
    }

    /// Look up a record type by object code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Look up a record type by the table holding its header rows.
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.info().table.eq_ignore_ascii_case(table))
    }

    /// Key shape accepted by `load`.
    pub fn key_kind(self) -> KeyKind {
        self.info().key_kind
    }

    /// Whether records of this type carry child rows.
    pub fn supports_lines(self) -> bool {
        self.info().lines.is_some()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u32>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown object code {}", code));
        }
        Self::ALL
            .into_iter()
            .find(|t| t.info().name.eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.info().name).collect();
                format!("unknown record type '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Key identifying one stored record.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize,
    SerdeSerialize, SerdeDeserialize,
)]
pub enum RecordKey {
    /// Server-generated entry number.
    Entry(i64),
    /// Caller-assigned code.
    Code(String),
    /// Catalogue mapping key.
    Composite {
        /// Item code.
        item_code: String,
        /// Business partner code.
        partner_code: String,
        /// Current partner catalogue number.
        substitute: String,
    },
}

impl RecordKey {
    /// Create a catalogue mapping key.
    pub fn composite(
        item_code: impl Into<String>,
        partner_code: impl Into<String>,
        substitute: impl Into<String>,
    ) -> Self {
        RecordKey::Composite {
            item_code: item_code.into(),
            partner_code: partner_code.into(),
            substitute: substitute.into(),
        }
    }

    /// Shape of this key.
    pub fn kind(&self) -> KeyKind {
        match self {
            RecordKey::Entry(_) => KeyKind::Entry,
            RecordKey::Code(_) => KeyKind::Code,
            RecordKey::Composite { .. } => KeyKind::Composite,
        }
    }

    /// Entry number, for entry keys.
    pub fn as_entry(&self) -> Option<i64> {
        match self {
            RecordKey::Entry(entry) => Some(*entry),
            _ => None,
        }
    }

    /// Key components as field values, in the record type's key order.
    pub fn values(&self) -> Vec<Value> {
        match self {
            RecordKey::Entry(entry) => vec![Value::Int64(*entry)],
            RecordKey::Code(code) => vec![Value::String(code.clone())],
            RecordKey::Composite {
                item_code,
                partner_code,
                substitute,
            } => vec![
                Value::String(item_code.clone()),
                Value::String(partner_code.clone()),
                Value::String(substitute.clone()),
            ],
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Entry(entry) => write!(f, "{}", entry),
            RecordKey::Code(code) => f.write_str(code),
            RecordKey::Composite {
                item_code,
                partner_code,
                substitute,
            } => write!(f, "{}/{}/{}", item_code, partner_code, substitute),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(entry: i64) -> Self {
        RecordKey::Entry(entry)
    }
}

impl From<&str> for RecordKey {
    fn from(code: &str) -> Self {
        RecordKey::Code(code.to_string())
    }
}

/// A field name and value pair.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct FieldValue {
    /// Field name.
    pub field: String,
    /// Field value.
    pub value: Value,
}

impl FieldValue {
    /// Create a new field-value pair.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Find a field by name.
pub fn find_field<'a>(fields: &'a [FieldValue], name: &str) -> Option<&'a Value> {
    fields.iter().find(|f| f.field == name).map(|f| &f.value)
}

/// Assign a field, replacing an earlier assignment of the same name in place.
pub fn assign_field(fields: &mut Vec<FieldValue>, name: &str, value: Value) {
    match fields.iter_mut().find(|f| f.field == name) {
        Some(existing) => existing.value = value,
        None => fields.push(FieldValue::new(name, value)),
    }
}

/// One child row.
#[derive(
    Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize,
    SerdeDeserialize,
)]
pub struct LineData {
    /// Line fields in assignment order.
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl LineData {
    /// Get a line field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        find_field(&self.fields, name)
    }
}

/// Full state of a record: header fields plus child rows.
#[derive(
    Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize,
    SerdeDeserialize,
)]
pub struct RecordData {
    /// Header fields in assignment order.
    #[serde(default)]
    pub fields: Vec<FieldValue>,
    /// Child rows in position order.
    #[serde(default)]
    pub lines: Vec<LineData>,
}

impl RecordData {
    /// Get a header field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        find_field(&self.fields, name)
    }

    /// Assign a header field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        assign_field(&mut self.fields, name, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip_through_table() {
        for record_type in RecordType::ALL {
            assert_eq!(RecordType::from_code(record_type.code()), Some(record_type));
            assert_eq!(RecordType::from_table(record_type.info().table), Some(record_type));
            assert_eq!(record_type.to_string().parse::<RecordType>(), Ok(record_type));
        }
        assert_eq!(RecordType::from_code(1), None);
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(RecordType::Document(DocumentKind::SalesOrder).code(), 17);
        assert_eq!(RecordType::Document(DocumentKind::Invoice).code(), 13);
        assert_eq!(
            RecordType::Document(DocumentKind::PurchaseRequest).code(),
            1_470_000_113
        );
        assert_eq!(
            "1470000113".parse::<RecordType>(),
            Ok(RecordType::Document(DocumentKind::PurchaseRequest))
        );
        assert!("oinv".parse::<RecordType>().is_err());
        assert_eq!(RecordType::from_table("oinv"), Some(RecordType::Document(DocumentKind::Invoice)));
    }

    #[test]
    fn test_key_schema() {
        assert_eq!(RecordType::User.key_kind(), KeyKind::Entry);
        assert_eq!(RecordType::BusinessPartner.key_kind(), KeyKind::Code);
        assert_eq!(RecordType::CatalogMapping.key_kind(), KeyKind::Composite);
        assert!(RecordType::BusinessPartner.supports_lines());
        assert!(RecordType::Document(DocumentKind::Quotation).supports_lines());
        assert!(!RecordType::User.supports_lines());
        assert!(!RecordType::CatalogMapping.supports_lines());
    }

    #[test]
    fn test_key_values_follow_key_fields() {
        let key = RecordKey::composite("ITEM001", "AAAA", "23922221");
        assert_eq!(key.kind(), KeyKind::Composite);
        assert_eq!(key.values().len(), RecordType::CatalogMapping.info().key_fields.len());
        assert_eq!(key.to_string(), "ITEM001/AAAA/23922221");
        assert_eq!(RecordKey::from(40).as_entry(), Some(40));
        assert_eq!(RecordKey::from("ZZZ001").as_entry(), None);
    }

    #[test]
    fn test_assign_field_replaces_in_place() {
        let mut data = RecordData::default();
        data.set("CardCode", "ZZZ001");
        data.set("CardName", "Old");
        data.set("CardName", "ZZZ Test Business Partner");

        assert_eq!(data.fields.len(), 2);
        assert_eq!(data.fields[1].field, "CardName");
        assert_eq!(data.field("CardName"), Some(&Value::from("ZZZ Test Business Partner")));
        assert_eq!(data.field("cardname"), None);
    }
}
