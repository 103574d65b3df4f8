//! In-memory record tables.
//!
//! One table per record type, ordered by key. Nothing is persisted. Every
//! write validates the complete record before touching the table, so a
//! rejected insert or update leaves no trace.

use std::collections::{BTreeMap, HashMap};

use recordlink_proto::record::assign_field;
use recordlink_proto::{DocumentKind, KeyKind, LineData, RecordData, RecordKey, RecordType, Value};

use crate::error::StoreError;

/// Columns a table answers to even when none of its rows carry them.
pub fn known_columns(record_type: RecordType) -> &'static [&'static str] {
    match record_type {
        RecordType::BusinessPartner => &[
            "CardCode",
            "CardName",
            "CardType",
            "CompanyPrivate",
            "Phone1",
            "EmailAddress",
            "Currency",
            "Balance",
        ],
        RecordType::User => &["InternalKey", "UserCode", "UserName", "Locked", "Superuser", "Email"],
        RecordType::CatalogMapping => &["ItemCode", "CardCode", "Substitute", "Description"],
        RecordType::Document(_) => &[
            "DocEntry",
            "DocNum",
            "DocType",
            "DocDate",
            "DocDueDate",
            "RequriedDate",
            "CardCode",
            "CardName",
            "Requester",
            "ReqType",
            "Printed",
            "DocStatus",
            "DocTotal",
            "Comments",
        ],
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RecordKey, RecordData>,
}

impl Table {
    fn next_entry(&self) -> i64 {
        self.rows
            .keys()
            .filter_map(RecordKey::as_entry)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// The server's record tables.
#[derive(Debug, Default)]
pub struct Store {
    tables: HashMap<RecordType, Table>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an object code.
    pub fn record_type(code: u32) -> Result<RecordType, StoreError> {
        RecordType::from_code(code).ok_or(StoreError::UnknownRecordType(code))
    }

    /// Insert a new record with all of its child rows.
    ///
    /// Entry keys are generated; any value the caller put in the entry field
    /// is overwritten.
    pub fn insert(&mut self, record_type: RecordType, data: RecordData) -> Result<RecordKey, StoreError> {
        self.insert_with(record_type, data, false)
    }

    /// Insert a record keeping an entry number it already carries.
    ///
    /// Used for seed data, where stable entry numbers matter.
    pub fn restore(&mut self, record_type: RecordType, data: RecordData) -> Result<RecordKey, StoreError> {
        self.insert_with(record_type, data, true)
    }

    /// Fetch a record.
    pub fn load(&self, record_type: RecordType, key: &RecordKey) -> Result<RecordData, StoreError> {
        check_key_kind(record_type, key)?;
        self.tables
            .get(&record_type)
            .and_then(|table| table.rows.get(key))
            .cloned()
            .ok_or_else(|| not_found(record_type, key))
    }

    /// Replace a stored record with `data`.
    ///
    /// Returns the key the record is stored under afterwards. A catalogue
    /// mapping is re-keyed when its substitute changes; partner codes and
    /// entry numbers cannot change.
    pub fn update(
        &mut self,
        record_type: RecordType,
        key: &RecordKey,
        mut data: RecordData,
    ) -> Result<RecordKey, StoreError> {
        check_key_kind(record_type, key)?;
        let exists = self
            .tables
            .get(&record_type)
            .is_some_and(|table| table.rows.contains_key(key));
        if !exists {
            return Err(not_found(record_type, key));
        }

        normalize(&mut data);
        let new_key = match record_type.key_kind() {
            KeyKind::Entry => {
                assign_field(&mut data.fields, key_field(record_type), key.values()[0].clone());
                key.clone()
            }
            KeyKind::Code => {
                let new_key = key_from_fields(record_type, &data)?;
                if &new_key != key {
                    return Err(StoreError::Validation(format!(
                        "{} cannot be changed",
                        key_field(record_type)
                    )));
                }
                new_key
            }
            KeyKind::Composite => {
                let new_key = key_from_fields(record_type, &data)?;
                if &new_key != key && self.contains(record_type, &new_key) {
                    return Err(StoreError::DuplicateKey {
                        table: record_type.info().table,
                        key: new_key,
                    });
                }
                new_key
            }
        };
        self.validate(record_type, &data)?;
        number_lines(record_type, &mut data);

        let table = self.tables.entry(record_type).or_default();
        table.rows.remove(key);
        table.rows.insert(new_key.clone(), data);
        Ok(new_key)
    }

    /// Stored records of a type, in key order.
    pub fn rows(&self, record_type: RecordType) -> impl Iterator<Item = &RecordData> {
        self.tables
            .get(&record_type)
            .into_iter()
            .flat_map(|table| table.rows.values())
    }

    /// Number of stored records of a type.
    pub fn len(&self, record_type: RecordType) -> usize {
        self.tables.get(&record_type).map_or(0, |t| t.rows.len())
    }

    /// Whether no record of the type is stored.
    pub fn is_empty(&self, record_type: RecordType) -> bool {
        self.len(record_type) == 0
    }

    /// Whether a record is stored under `key`.
    pub fn contains(&self, record_type: RecordType, key: &RecordKey) -> bool {
        self.tables
            .get(&record_type)
            .is_some_and(|table| table.rows.contains_key(key))
    }

    fn insert_with(
        &mut self,
        record_type: RecordType,
        mut data: RecordData,
        keep_entry: bool,
    ) -> Result<RecordKey, StoreError> {
        normalize(&mut data);
        self.validate(record_type, &data)?;

        let key = match record_type.key_kind() {
            KeyKind::Entry => {
                let given = data
                    .field(key_field(record_type))
                    .and_then(Value::as_i64)
                    .filter(|entry| keep_entry && *entry > 0);
                let entry = match given {
                    Some(entry) => entry,
                    None => self
                        .tables
                        .get(&record_type)
                        .map_or(1, Table::next_entry),
                };
                data.set(key_field(record_type), Value::Int64(entry));
                RecordKey::Entry(entry)
            }
            KeyKind::Code | KeyKind::Composite => key_from_fields(record_type, &data)?,
        };
        if self.contains(record_type, &key) {
            return Err(StoreError::DuplicateKey {
                table: record_type.info().table,
                key,
            });
        }

        self.apply_defaults(record_type, &key, &mut data);
        number_lines(record_type, &mut data);
        self.tables
            .entry(record_type)
            .or_default()
            .rows
            .insert(key.clone(), data);
        Ok(key)
    }

    fn validate(&self, record_type: RecordType, data: &RecordData) -> Result<(), StoreError> {
        if !record_type.supports_lines() && !data.lines.is_empty() {
            return Err(StoreError::Validation(format!(
                "{} records have no child rows",
                record_type
            )));
        }

        match record_type {
            RecordType::BusinessPartner => {
                required_text(&data.fields, "CardCode", None)?;
                let mut names: Vec<&str> = Vec::new();
                for (row, line) in data.lines.iter().enumerate() {
                    let name = required_text(&line.fields, "Name", Some(row))?;
                    if names.contains(&name) {
                        return Err(StoreError::Validation(format!(
                            "Contact person name '{}' already exists (row {})",
                            name, row
                        )));
                    }
                    names.push(name);
                }
            }
            RecordType::User => {
                required_text(&data.fields, "UserCode", None)?;
            }
            RecordType::CatalogMapping => {
                required_text(&data.fields, "ItemCode", None)?;
                required_text(&data.fields, "Substitute", None)?;
                let partner = required_text(&data.fields, "CardCode", None)?;
                self.partner(partner)?;
            }
            RecordType::Document(kind) => {
                if kind == DocumentKind::PurchaseRequest {
                    required_text(&data.fields, "Requester", None)?;
                } else {
                    let partner = required_text(&data.fields, "CardCode", None)?;
                    self.partner(partner)?;
                }
                if data.lines.is_empty() {
                    return Err(StoreError::Validation(
                        "Document must contain at least one row".to_string(),
                    ));
                }
                let service = data.field("DocType").and_then(Value::as_i64) == Some(1);
                for (row, line) in data.lines.iter().enumerate() {
                    validate_document_line(line, row, service)?;
                }
            }
        }
        Ok(())
    }

    fn partner(&self, code: &str) -> Result<&RecordData, StoreError> {
        self.tables
            .get(&RecordType::BusinessPartner)
            .and_then(|table| table.rows.get(&RecordKey::Code(code.to_string())))
            .ok_or_else(|| StoreError::Validation(format!("Invalid BP code '{}'", code)))
    }

    fn apply_defaults(&self, record_type: RecordType, key: &RecordKey, data: &mut RecordData) {
        let mut default = |name: &str, value: Value| {
            if data.field(name).is_none() {
                data.set(name, value);
            }
        };
        match record_type {
            RecordType::BusinessPartner => {
                default("CardType", Value::Int32(0));
                default("CompanyPrivate", Value::Int32(0));
            }
            RecordType::User => default("Locked", Value::Int32(0)),
            RecordType::CatalogMapping => {}
            RecordType::Document(_) => {
                let today = Value::date(chrono::Local::now().date_naive());
                if let Some(entry) = key.as_entry() {
                    default("DocNum", Value::Int64(entry));
                }
                default("DocType", Value::Int32(0));
                default("DocDate", today);
                let doc_date = data.field("DocDate").cloned().unwrap_or(Value::Null);
                let card_name = data
                    .field("CardCode")
                    .and_then(Value::as_str)
                    .and_then(|code| self.partner(code).ok())
                    .and_then(|partner| partner.field("CardName").cloned());

                let mut default = |name: &str, value: Value| {
                    if data.field(name).is_none() {
                        data.set(name, value);
                    }
                };
                default("DocDueDate", doc_date);
                default("DocStatus", Value::from("O"));
                default("Printed", Value::from("N"));
                if let Some(card_name) = card_name {
                    default("CardName", card_name);
                }
            }
        }
    }
}

fn validate_document_line(line: &LineData, row: usize, service: bool) -> Result<(), StoreError> {
    if service {
        required_text(&line.fields, "Dscription", Some(row))?;
        return Ok(());
    }
    required_text(&line.fields, "ItemCode", Some(row))?;
    if let Some(quantity) = line.field("Quantity") {
        match quantity.as_f64() {
            Some(q) if q > 0.0 => {}
            _ => {
                return Err(StoreError::Validation(format!(
                    "Quantity must be a positive number (row {})",
                    row
                )))
            }
        }
    }
    Ok(())
}

fn required_text<'a>(
    fields: &'a [recordlink_proto::FieldValue],
    name: &str,
    row: Option<usize>,
) -> Result<&'a str, StoreError> {
    let value = recordlink_proto::record::find_field(fields, name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty());
    value.ok_or_else(|| {
        StoreError::Validation(match row {
            Some(row) => format!("Field '{}' is required (row {})", name, row),
            None => format!("Field '{}' is required", name),
        })
    })
}

fn key_field(record_type: RecordType) -> &'static str {
    record_type.info().key_fields[0]
}

fn key_from_fields(record_type: RecordType, data: &RecordData) -> Result<RecordKey, StoreError> {
    let info = record_type.info();
    let mut parts = Vec::with_capacity(info.key_fields.len());
    for field in info.key_fields {
        parts.push(required_text(&data.fields, field, None)?.to_string());
    }
    match (info.key_kind, parts.as_slice()) {
        (KeyKind::Code, [code]) => Ok(RecordKey::Code(code.clone())),
        (KeyKind::Composite, [item, partner, substitute]) => {
            Ok(RecordKey::composite(item.as_str(), partner.as_str(), substitute.as_str()))
        }
        _ => Err(StoreError::Validation(format!(
            "{} records have no text key",
            record_type
        ))),
    }
}

fn check_key_kind(record_type: RecordType, key: &RecordKey) -> Result<(), StoreError> {
    let expected = record_type.key_kind();
    if key.kind() == expected {
        Ok(())
    } else {
        Err(StoreError::KeyMismatch {
            record_type,
            expected,
            actual: key.kind(),
        })
    }
}

fn not_found(record_type: RecordType, key: &RecordKey) -> StoreError {
    StoreError::NotFound {
        record_type,
        key: key.clone(),
    }
}

/// Date-named fields given as `YYYY-MM-DD` text are stored as dates.
fn normalize(data: &mut RecordData) {
    let fields = data
        .fields
        .iter_mut()
        .chain(data.lines.iter_mut().flat_map(|line| line.fields.iter_mut()));
    for field in fields {
        if !field.field.ends_with("Date") {
            continue;
        }
        if let Some(date) = field.value.as_str().and_then(Value::parse_date) {
            field.value = date;
        }
    }
}

fn number_lines(record_type: RecordType, data: &mut RecordData) {
    if let RecordType::Document(_) = record_type {
        for (position, line) in data.lines.iter_mut().enumerate() {
            assign_field(&mut line.fields, "LineNum", Value::Int32(position as i32));
        }
    }
}
