//! Connection flags and the values accepted by subcommand arguments.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{ArgAction, Args, ValueEnum};
use recordlink_client::proto::value::DATE_FORMAT;
use recordlink_client::{
    ConnectRetry, ConnectionConfig, DocumentKind, Error, Language, RecordType, ServerKind,
};

/// Errors in argument values that clap cannot check on its own.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("expected {expected}, got '{value}'")]
    Shape { expected: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid quantity '{0}'")]
    Quantity(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    Date(String),

    #[error("'{0}' is not a document type")]
    NotADocument(String),
}

/// Connection flags shared by every subcommand.
///
/// Each flag overrides the matching entry of `--profile`, when given.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// TOML connection profile used as the base configuration
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    /// Server host, host:port, or a tcp:// / ipc:// endpoint
    #[arg(short = 'S', long, global = true)]
    pub server: Option<String>,

    /// Company database name
    #[arg(short = 'd', long, global = true)]
    pub company_db: Option<String>,

    /// Application user name
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// Application user password
    #[arg(long, global = true, env = "RECORDLINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database server product (mssql2008 .. mssql2019, hana)
    #[arg(long, global = true, value_parser = parse_server_kind)]
    pub server_kind: Option<ServerKind>,

    /// Authenticate to the database with the operating system account
    /// (`--trusted=false` turns off a profile's setting)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub trusted: Option<bool>,

    /// Session language (en, de, fr, es, it, pl)
    #[arg(long, global = true, value_parser = parse_language)]
    pub language: Option<Language>,

    /// Database user name
    #[arg(long, global = true, env = "RECORDLINK_DB_USER")]
    pub db_user: Option<String>,

    /// Database user password
    #[arg(long, global = true, env = "RECORDLINK_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// License server address (host:port)
    #[arg(long, global = true)]
    pub license_server: Option<String>,

    /// Round-trip timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Connect attempts before giving up on transport failures
    #[arg(long, global = true)]
    pub connect_attempts: Option<u32>,
}

impl ConnectionArgs {
    /// Build the session configuration: the profile (or defaults) with
    /// every given flag applied on top.
    pub fn into_config(self) -> Result<ConnectionConfig, Error> {
        let mut config = match &self.profile {
            Some(path) => ConnectionConfig::load(path)?,
            None => ConnectionConfig::default(),
        };

        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(company_db) = self.company_db {
            config.company_db = company_db;
        }
        if let Some(user) = self.user {
            config.user_name = user;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(kind) = self.server_kind {
            config.server_kind = kind;
        }
        if let Some(trusted) = self.trusted {
            config.use_trusted = trusted;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(db_user) = self.db_user {
            config.db_user_name = db_user;
        }
        if let Some(db_password) = self.db_password {
            config.db_password = db_password;
        }
        if let Some(license_server) = self.license_server {
            config.license_server = license_server;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = self.connect_attempts {
            config.connect_retry = ConnectRetry::attempts(attempts);
        }
        Ok(config)
    }
}

fn parse_server_kind(s: &str) -> Result<ServerKind, String> {
    s.parse()
}

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse()
}

/// Business partner category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PartnerKind {
    Customer,
    Supplier,
    Lead,
}

impl PartnerKind {
    /// Stored `CardType` value.
    pub fn card_type(self) -> i32 {
        match self {
            PartnerKind::Customer => 0,
            PartnerKind::Supplier => 1,
            PartnerKind::Lead => 2,
        }
    }
}

/// Whether document lines carry items or free-text services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentType {
    #[default]
    Items,
    Service,
}

impl DocumentType {
    /// Stored `DocType` value.
    pub fn doc_type(self) -> i32 {
        match self {
            DocumentType::Items => 0,
            DocumentType::Service => 1,
        }
    }
}

/// One contact employee given as `NAME[:FIRST[:LAST[:EMAIL[:MOBILE]]]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSpec {
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

pub fn parse_contact(s: &str) -> Result<ContactSpec, ArgError> {
    let mut parts = s.splitn(5, ':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(ArgError::Empty("contact name"));
    }
    let mut optional = || {
        parts
            .next()
            .filter(|part| !part.is_empty())
            .map(str::to_string)
    };
    Ok(ContactSpec {
        name: name.to_string(),
        first_name: optional(),
        last_name: optional(),
        email: optional(),
        mobile: optional(),
    })
}

/// One document line given as `ITEM:QTY`.
///
/// For service documents the first part is the line description.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpec {
    pub item: String,
    pub quantity: f64,
}

pub fn parse_line(s: &str) -> Result<LineSpec, ArgError> {
    let (item, quantity) = s.rsplit_once(':').ok_or_else(|| ArgError::Shape {
        expected: "ITEM:QTY",
        value: s.to_string(),
    })?;
    let item = item.trim();
    if item.is_empty() {
        return Err(ArgError::Empty("item"));
    }
    let quantity = quantity
        .trim()
        .parse::<f64>()
        .map_err(|_| ArgError::Quantity(quantity.to_string()))?;
    Ok(LineSpec {
        item: item.to_string(),
        quantity,
    })
}

/// A catalogue number change given as `ITEM:CURRENT:NEW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSpec {
    pub item: String,
    pub current: String,
    pub new: String,
}

pub fn parse_mapping(s: &str) -> Result<MappingSpec, ArgError> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    match parts.as_slice() {
        [item, current, new] if !item.is_empty() && !current.is_empty() && !new.is_empty() => {
            Ok(MappingSpec {
                item: item.to_string(),
                current: current.to_string(),
                new: new.to_string(),
            })
        }
        _ => Err(ArgError::Shape {
            expected: "ITEM:CURRENT:NEW",
            value: s.to_string(),
        }),
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ArgError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| ArgError::Date(s.to_string()))
}

/// Accepts any document record type name or object code.
pub fn parse_document_kind(s: &str) -> Result<DocumentKind, ArgError> {
    match s.parse::<RecordType>() {
        Ok(RecordType::Document(kind)) => Ok(kind),
        _ => Err(ArgError::NotADocument(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_contact() {
        let contact = parse_contact("Bob Smith:Bob:Smith:bob@example.com:07700900000").unwrap();
        assert_eq!(contact.name, "Bob Smith");
        assert_eq!(contact.last_name.as_deref(), Some("Smith"));
        assert_eq!(contact.mobile.as_deref(), Some("07700900000"));

        let contact = parse_contact("Jane::Doe").unwrap();
        assert_eq!(contact.first_name, None);
        assert_eq!(contact.last_name.as_deref(), Some("Doe"));
        assert_eq!(contact.email, None);

        assert_eq!(parse_contact(":Bob"), Err(ArgError::Empty("contact name")));
    }

    #[test]
    fn test_parse_line() {
        let line = parse_line("ITEM002:5").unwrap();
        assert_eq!(line.item, "ITEM002");
        assert_eq!(line.quantity, 5.0);

        assert!(matches!(parse_line("ITEM002"), Err(ArgError::Shape { .. })));
        assert_eq!(parse_line("ITEM002:lots"), Err(ArgError::Quantity("lots".into())));
        assert_eq!(parse_line(":2"), Err(ArgError::Empty("item")));
    }

    #[test]
    fn test_parse_mapping() {
        let mapping = parse_mapping("ITEM001:23922221:23922266").unwrap();
        assert_eq!(mapping.current, "23922221");
        assert_eq!(mapping.new, "23922266");

        assert!(parse_mapping("ITEM001:23922221").is_err());
        assert!(parse_mapping("ITEM001::23922266").is_err());
    }

    #[test]
    fn test_parse_document_kind() {
        assert_eq!(parse_document_kind("sales-order").unwrap(), DocumentKind::SalesOrder);
        assert_eq!(parse_document_kind("1470000113").unwrap(), DocumentKind::PurchaseRequest);
        assert!(matches!(parse_document_kind("partner"), Err(ArgError::NotADocument(_))));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2015-06-10").unwrap(),
            NaiveDate::from_ymd_opt(2015, 6, 10).unwrap()
        );
        assert!(parse_date("10/06/2015").is_err());
    }

    #[test]
    fn test_flags_override_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server = \"dbserver\"\ncompany_db = \"SBODemoGB\"\nuser_name = \"manager\"\npassword = \"Password\"\ndb_user_name = \"sa\"\n"
        )
        .unwrap();

        let args = ConnectionArgs {
            profile: Some(file.path().to_path_buf()),
            user: Some("jsmith".into()),
            timeout: Some(5),
            connect_attempts: Some(3),
            ..ConnectionArgs::default()
        };
        let config = args.into_config().unwrap();
        assert_eq!(config.server, "dbserver");
        assert_eq!(config.user_name, "jsmith");
        assert_eq!(config.password, "Password");
        assert_eq!(config.db_user_name, "sa");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_retry, ConnectRetry::attempts(3));
    }

    #[test]
    fn test_trusted_flag_overrides_profile_both_ways() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server = \"dbserver\"\ncompany_db = \"SBODemoGB\"\nuser_name = \"manager\"\npassword = \"Password\"\nuse_trusted = true\n"
        )
        .unwrap();
        let with = |trusted| ConnectionArgs {
            profile: Some(file.path().to_path_buf()),
            trusted,
            ..ConnectionArgs::default()
        };

        assert!(with(None).into_config().unwrap().use_trusted);
        assert!(!with(Some(false)).into_config().unwrap().use_trusted);
        assert!(ConnectionArgs {
            trusted: Some(true),
            ..ConnectionArgs::default()
        }
        .into_config()
        .unwrap()
        .use_trusted);
    }

    #[test]
    fn test_missing_profile_is_a_configuration_error() {
        let args = ConnectionArgs {
            profile: Some(PathBuf::from("/nonexistent/recordlink.toml")),
            ..ConnectionArgs::default()
        };
        assert!(matches!(args.into_config(), Err(Error::Configuration(_))));
    }
}
