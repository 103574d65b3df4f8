//! Initial records loaded at startup.
//!
//! Seed files are JSON:
//!
//! ```json
//! { "records": [
//!     { "type": "partner", "fields": { "CardCode": "C20000", "CardName": "Norm Thompson" } },
//!     { "type": "invoice", "fields": { "CardCode": "C20000" },
//!       "lines": [ { "ItemCode": "A00001", "Quantity": 2 } ] }
//! ] }
//! ```
//!
//! `type` is a record-type name or object code. Records are inserted in file
//! order, so partners must precede the documents that reference them.

use std::collections::BTreeMap;
use std::path::Path;

use recordlink_proto::{FieldValue, LineData, RecordData, RecordType, Value};
use serde::Deserialize;

use crate::config::SeedSource;
use crate::error::Error;
use crate::store::Store;

const DEMO: &str = include_str!("../data/demo.json");

/// One seeded record.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedRecord {
    /// Record-type name or object code.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Header fields.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Child rows.
    #[serde(default)]
    pub lines: Vec<BTreeMap<String, Value>>,
}

impl SeedRecord {
    fn to_record(&self) -> Result<(RecordType, RecordData), String> {
        let record_type = self.record_type.parse::<RecordType>()?;
        let data = RecordData {
            fields: to_fields(&self.fields),
            lines: self
                .lines
                .iter()
                .map(|line| LineData {
                    fields: to_fields(line),
                })
                .collect(),
        };
        Ok((record_type, data))
    }
}

fn to_fields(map: &BTreeMap<String, Value>) -> Vec<FieldValue> {
    map.iter()
        .map(|(name, value)| FieldValue::new(name.as_str(), value.clone()))
        .collect()
}

/// A set of seed records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    /// Records in insertion order.
    pub records: Vec<SeedRecord>,
}

impl SeedData {
    /// Parse seed JSON.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Seed(e.to_string()))
    }

    /// Read a seed file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| Error::Seed(format!("{}: {}", path.display(), e)))
    }

    /// The bundled demonstration company.
    pub fn demo() -> Result<Self, Error> {
        Self::from_json(DEMO)
    }

    /// Insert every record, keeping entry numbers the records carry.
    ///
    /// Returns the number of records inserted.
    pub fn apply(&self, store: &mut Store) -> Result<usize, Error> {
        for (index, record) in self.records.iter().enumerate() {
            let (record_type, data) = record
                .to_record()
                .map_err(|e| Error::Seed(format!("record {}: {}", index, e)))?;
            store
                .restore(record_type, data)
                .map_err(|e| Error::Seed(format!("record {} ({}): {}", index, record_type, e)))?;
        }
        Ok(self.records.len())
    }
}

/// Build the store a server starts with.
pub fn initial_store(source: &SeedSource) -> Result<Store, Error> {
    let mut store = Store::new();
    let seed = match source {
        SeedSource::Empty => return Ok(store),
        SeedSource::Demo => SeedData::demo()?,
        SeedSource::File(path) => SeedData::load(path)?,
    };
    let count = seed.apply(&mut store)?;
    tracing::info!(records = count, "seed data loaded");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlink_proto::{DocumentKind, RecordKey};
    use std::io::Write;

    #[test]
    fn test_demo_loads() {
        let store = initial_store(&SeedSource::Demo).unwrap();
        assert!(store.contains(RecordType::BusinessPartner, &RecordKey::from("C20000")));
        assert!(store.contains(RecordType::User, &RecordKey::Entry(40)));
        assert!(!store.is_empty(RecordType::CatalogMapping));
        assert!(!store.is_empty(RecordType::Document(DocumentKind::Invoice)));

        let locked = store.load(RecordType::User, &RecordKey::Entry(40)).unwrap();
        assert_eq!(locked.field("Locked"), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_entries_are_kept() {
        let seed = SeedData::from_json(
            r#"{ "records": [
                { "type": "user", "fields": { "InternalKey": 7, "UserCode": "jdoe" } },
                { "type": "12", "fields": { "UserCode": "asmith" } }
            ] }"#,
        )
        .unwrap();
        let mut store = Store::new();
        assert_eq!(seed.apply(&mut store).unwrap(), 2);
        assert!(store.contains(RecordType::User, &RecordKey::Entry(7)));
        assert!(store.contains(RecordType::User, &RecordKey::Entry(8)));
    }

    #[test]
    fn test_bad_records_are_reported() {
        let unknown = SeedData::from_json(r#"{ "records": [ { "type": "widget" } ] }"#).unwrap();
        let err = unknown.apply(&mut Store::new()).unwrap_err();
        assert!(err.to_string().contains("record 0"));

        let invalid = SeedData::from_json(
            r#"{ "records": [ { "type": "invoice", "fields": { "CardCode": "NOPE" } } ] }"#,
        )
        .unwrap();
        assert!(matches!(invalid.apply(&mut Store::new()), Err(Error::Seed(_))));

        assert!(SeedData::from_json(r#"{ "rows": [] }"#).is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "records": [ {{ "type": "partner", "fields": {{ "CardCode": "ZZZ001" }} }} ] }}"#
        )
        .unwrap();

        let store = initial_store(&SeedSource::File(file.path().to_path_buf())).unwrap();
        assert_eq!(store.len(RecordType::BusinessPartner), 1);

        let missing = initial_store(&SeedSource::File("/nonexistent/seed.json".into()));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
