//! Use cases run inside a connected session.
//!
//! Each function takes every literal it submits as a parameter and stops at
//! the first failure; `execute` wraps the chosen one in
//! [`orchestrate::run_with_report`] so the session is connected first and
//! disconnected afterwards.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use recordlink_client::proto::value::DATE_FORMAT;
use recordlink_client::{
    orchestrate, DocumentKind, Error, Outcome, RecordKey, RecordType, Session, Value,
};
use tracing::info;

use crate::options::{
    parse_contact, parse_date, parse_document_kind, parse_line, parse_mapping, ContactSpec,
    DocumentType, LineSpec, MappingSpec, PartnerKind,
};

/// Request type of a purchase request raised by a user.
pub const REQUESTER_IS_USER: i32 = 12;

/// Result of a use case, rendered by a [`crate::formatter::Formatter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A single line of text.
    Message(String),
    /// Query rows under their column names.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

/// Available use cases.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, print the company name and disconnect
    Connect,

    /// Create a business partner with optional contact employees
    AddPartner(PartnerArgs),

    /// Create a marketing document with lines
    AddDocument(DocumentArgs),

    /// Run a query and print every row
    Query {
        /// Query text
        text: String,
    },

    /// Replace business partner catalogue numbers
    UpdateCatalog(CatalogArgs),

    /// Clear the lock flag of a user
    UnlockUser {
        /// Internal key of the user
        key: i64,
    },

    /// Mark the unprinted invoices of a day as printed
    MarkPrinted {
        /// Document date (defaults to the server's current date)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PartnerArgs {
    /// Partner code
    pub code: String,

    /// Partner name
    pub name: String,

    /// Partner category
    #[arg(long = "type", value_enum, default_value = "customer")]
    pub kind: PartnerKind,

    /// Register the partner as a private person rather than a company
    #[arg(long)]
    pub private: bool,

    /// Contact employee as NAME[:FIRST[:LAST[:EMAIL[:MOBILE]]]] (repeatable)
    #[arg(long = "contact", value_parser = parse_contact)]
    pub contacts: Vec<ContactSpec>,
}

#[derive(Args, Debug, Clone)]
pub struct DocumentArgs {
    /// Document type name or object code (sales-order, purchase-request, ...)
    #[arg(value_parser = parse_document_kind)]
    pub kind: DocumentKind,

    /// Business partner code
    #[arg(long)]
    pub partner: Option<String>,

    /// Posting date
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Due date
    #[arg(long, value_parser = parse_date)]
    pub due_date: Option<NaiveDate>,

    /// Required date (purchase requests)
    #[arg(long, value_parser = parse_date)]
    pub required_date: Option<NaiveDate>,

    /// Whether lines carry items or services
    #[arg(long, value_enum, default_value = "items")]
    pub doc_type: DocumentType,

    /// Requester code (purchase requests)
    #[arg(long)]
    pub requester: Option<String>,

    /// Requester type (purchase requests)
    #[arg(long, default_value_t = REQUESTER_IS_USER)]
    pub req_type: i32,

    /// Document line as ITEM:QTY (repeatable)
    #[arg(long = "line", value_parser = parse_line, required = true)]
    pub lines: Vec<LineSpec>,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Business partner code (repeatable)
    #[arg(long = "partner", required = true)]
    pub partners: Vec<String>,

    /// Catalogue change as ITEM:CURRENT:NEW (repeatable)
    #[arg(long = "mapping", value_parser = parse_mapping, required = true)]
    pub mappings: Vec<MappingSpec>,
}

/// Connect, run `command`, disconnect. A failure goes to `report` while the
/// session is still connected.
pub fn execute(
    session: &mut Session,
    command: &Command,
    report: impl FnOnce(&Error),
) -> Outcome<Output> {
    orchestrate::run_with_report(session, report, |session| match command {
        Command::Connect => connect(session),
        Command::AddPartner(args) => add_partner(session, args),
        Command::AddDocument(args) => add_document(session, args),
        Command::Query { text } => query(session, text),
        Command::UpdateCatalog(args) => update_catalog(session, args),
        Command::UnlockUser { key } => unlock_user(session, *key),
        Command::MarkPrinted { date } => mark_printed(session, *date),
    })
}

pub fn connect(session: &Session) -> Outcome<Output> {
    let company = session.company_name().unwrap_or_default();
    Ok(Output::Message(format!("Successfully connected to {}", company)))
}

pub fn add_partner(session: &Session, args: &PartnerArgs) -> Outcome<Output> {
    let mut partner = session.create(RecordType::BusinessPartner)?;
    partner
        .set_field("CardCode", args.code.as_str())
        .set_field("CardName", args.name.as_str())
        .set_field("CardType", args.kind.card_type())
        .set_field("CompanyPrivate", i32::from(args.private));

    for contact in &args.contacts {
        let line = partner.append_line()?;
        partner.set_line_field(line, "Name", contact.name.as_str())?;
        let optional = [
            ("FirstName", &contact.first_name),
            ("LastName", &contact.last_name),
            ("E_MailL", &contact.email),
            ("MobilePhone", &contact.mobile),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                partner.set_line_field(line, field, value.as_str())?;
            }
        }
    }

    let key = partner.submit()?;
    info!(partner = %key, contacts = args.contacts.len(), "business partner added");
    Ok(Output::Message(format!("Successfully added business partner {}", key)))
}

pub fn add_document(session: &Session, args: &DocumentArgs) -> Outcome<Output> {
    let record_type = RecordType::Document(args.kind);
    let mut document = session.create(record_type)?;
    document.set_field("DocType", args.doc_type.doc_type());

    if args.kind == DocumentKind::PurchaseRequest {
        let requester = args.requester.as_deref().ok_or_else(|| {
            Error::Configuration("purchase requests need --requester".to_string())
        })?;
        document
            .set_field("ReqType", args.req_type)
            .set_field("Requester", requester);
    } else {
        let partner = args.partner.as_deref().ok_or_else(|| {
            Error::Configuration(format!("{} documents need --partner", record_type))
        })?;
        document.set_field("CardCode", partner);
    }

    let dates = [
        ("DocDate", args.date),
        ("DocDueDate", args.due_date),
        ("RequriedDate", args.required_date),
    ];
    for (field, date) in dates {
        if let Some(date) = date {
            document.set_field(field, date);
        }
    }

    for requested in &args.lines {
        let line = document.append_line()?;
        match args.doc_type {
            DocumentType::Items => {
                document.set_line_field(line, "ItemCode", requested.item.as_str())?;
                document.set_line_field(line, "Quantity", requested.quantity)?;
            }
            DocumentType::Service => {
                document.set_line_field(line, "Dscription", requested.item.as_str())?;
                document.set_line_field(line, "LineTotal", requested.quantity)?;
            }
        }
    }

    let key = document.submit()?;
    info!(record_type = %record_type, entry = %key, lines = args.lines.len(), "document added");
    Ok(Output::Message(format!("Successfully added {} {}", record_type, key)))
}

pub fn query(session: &Session, text: &str) -> Outcome<Output> {
    let mut cursor = session.query(text)?;
    let columns = (0..cursor.field_count())
        .map(|index| cursor.field_name(index).map(str::to_string))
        .collect::<Outcome<Vec<_>>>()?;

    let mut rows = Vec::new();
    for row in cursor.rows() {
        rows.push(row?);
    }
    cursor.release()?;
    Ok(Output::Rows { columns, rows })
}

pub fn update_catalog(session: &Session, args: &CatalogArgs) -> Outcome<Output> {
    let mut updated = Vec::new();
    for partner in &args.partners {
        for mapping in &args.mappings {
            let key = RecordKey::composite(&mapping.item, partner, &mapping.current);
            let mut record = session.load(RecordType::CatalogMapping, key)?;
            record.set_field("Substitute", mapping.new.as_str());
            let key = record.submit()?;
            info!(mapping = %key, "catalogue number updated");
            updated.push(format!(
                "{} {}: {} -> {}",
                partner, mapping.item, mapping.current, mapping.new
            ));
        }
    }
    Ok(Output::Message(format!(
        "Updated {} catalogue number(s)\n{}",
        updated.len(),
        updated.join("\n")
    )))
}

pub fn unlock_user(session: &Session, key: i64) -> Outcome<Output> {
    let mut user = session.load(RecordType::User, key)?;
    let user_code = user
        .field("UserCode")
        .map(Value::to_string)
        .unwrap_or_else(|| key.to_string());

    let locked = user.field("Locked").and_then(Value::as_i64).unwrap_or(0) != 0;
    if !locked {
        return Ok(Output::Message(format!("User {} is not locked", user_code)));
    }

    user.set_field("Locked", 0);
    user.submit()?;
    info!(user = %user_code, "user unlocked");
    Ok(Output::Message(format!("Successfully unlocked user: {}", user_code)))
}

pub fn mark_printed(session: &Session, date: Option<NaiveDate>) -> Outcome<Output> {
    let date_operand = match date {
        Some(date) => format!("'{}'", date.format(DATE_FORMAT)),
        None => "CAST(CURRENT_TIMESTAMP AS DATE)".to_string(),
    };
    let text = format!(
        "SELECT T0.[DocEntry] FROM OINV T0 WHERE T0.DocDate = {} AND T0.[Printed] = 'N'",
        date_operand
    );

    let mut entries = Vec::new();
    let mut cursor = session.query(&text)?;
    for row in cursor.rows() {
        let row = row?;
        if let Some(entry) = row.first().and_then(Value::as_i64) {
            entries.push(entry);
        }
    }
    cursor.release()?;

    let invoice = RecordType::Document(DocumentKind::Invoice);
    for &entry in &entries {
        let mut record = session.load(invoice, entry)?;
        record.set_field("Printed", "Y");
        record.submit()?;
    }

    info!(invoices = entries.len(), "invoices marked as printed");
    let listed: Vec<String> = entries.iter().map(i64::to_string).collect();
    Ok(Output::Message(format!(
        "Marked {} invoice(s) as printed{}{}",
        entries.len(),
        if listed.is_empty() { "" } else { ": " },
        listed.join(", ")
    )))
}
