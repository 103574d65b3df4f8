//! Login handshake types for connection negotiation.

use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Database server product backing the company database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Archive, Serialize, Deserialize, SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServerKind {
    /// Microsoft SQL Server 2008.
    MsSql2008,
    /// Microsoft SQL Server 2012.
    #[default]
    MsSql2012,
    /// Microsoft SQL Server 2014.
    MsSql2014,
    /// Microsoft SQL Server 2016.
    MsSql2016,
    /// Microsoft SQL Server 2017.
    MsSql2017,
    /// Microsoft SQL Server 2019.
    MsSql2019,
    /// SAP HANA.
    Hana,
}

impl ServerKind {
    const NAMES: [(ServerKind, &'static str); 7] = [
        (ServerKind::MsSql2008, "mssql2008"),
        (ServerKind::MsSql2012, "mssql2012"),
        (ServerKind::MsSql2014, "mssql2014"),
        (ServerKind::MsSql2016, "mssql2016"),
        (ServerKind::MsSql2017, "mssql2017"),
        (ServerKind::MsSql2019, "mssql2019"),
        (ServerKind::Hana, "hana"),
    ];

    /// Short name used in configuration files and on command lines.
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('-', "").to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| format!("unknown server kind '{}'", s))
    }
}

/// Session language for server messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Archive, Serialize, Deserialize, SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    English,
    /// German.
    German,
    /// French.
    French,
    /// Spanish.
    Spanish,
    /// Italian.
    Italian,
    /// Polish.
    Polish,
}

impl Language {
    /// ISO 639-1 code of the language.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
            Language::French => "fr",
            Language::Spanish => "es",
            Language::Italian => "it",
            Language::Polish => "pl",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "de" | "german" => Ok(Language::German),
            "fr" | "french" => Ok(Language::French),
            "es" | "spanish" => Ok(Language::Spanish),
            "it" | "italian" => Ok(Language::Italian),
            "pl" | "polish" => Ok(Language::Polish),
            _ => Err(format!("unknown language '{}'", s)),
        }
    }
}

/// Credentials presented when logging in to a company database.
#[derive(Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Credentials {
    /// Database server host as configured by the client.
    pub server: String,
    /// Company database name.
    pub company_db: String,
    /// Application user name.
    pub user_name: String,
    /// Application user password.
    pub password: String,
    /// Database server product.
    pub server_kind: ServerKind,
    /// Use the operating system account for database access.
    pub use_trusted: bool,
    /// Session language.
    pub language: Language,
    /// Database user name (ignored when trusted).
    pub db_user_name: String,
    /// Database user password (ignored when trusted).
    pub db_password: String,
    /// License server address (`host:port`).
    pub license_server: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("company_db", &self.company_db)
            .field("user_name", &self.user_name)
            .field("server_kind", &self.server_kind)
            .field("use_trusted", &self.use_trusted)
            .field("language", &self.language)
            .field("db_user_name", &self.db_user_name)
            .field("license_server", &self.license_server)
            .finish_non_exhaustive()
    }
}

/// Client login message sent when establishing a session.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version the client supports.
    pub protocol_version: u32,
    /// Client identifier (for logging and debugging).
    pub client_id: String,
    /// Login credentials.
    pub credentials: Credentials,
}

impl Handshake {
    /// Create a new handshake with the current protocol version.
    pub fn new(client_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            client_id: client_id.into(),
            credentials,
        }
    }
}

/// Server answer to an accepted login.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Protocol version the server will use for this session.
    pub protocol_version: u32,
    /// Session token to present on every later request.
    pub session: u64,
    /// Display name of the company database.
    pub company_name: String,
    /// Server identifier.
    pub server_id: String,
}

impl HandshakeResponse {
    /// Create a response for an accepted login.
    pub fn accept(session: u64, company_name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            session,
            company_name: company_name.into(),
            server_id: server_id.into(),
        }
    }
}

/// Check if a protocol version is compatible with the current version.
pub fn is_version_compatible(client_version: u32, server_version: u32) -> bool {
    client_version == server_version
}
