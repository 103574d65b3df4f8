//! Connection configuration.
//!
//! A [`ConnectionConfig`] is built in code with the `with_*` builders or
//! read from a TOML profile:
//!
//! ```toml
//! server = "dbserver"
//! company_db = "SBODemoGB"
//! user_name = "manager"
//! password = "Password"
//! server_kind = "mssql2012"
//! db_user_name = "sa"
//! db_password = "SQLPassword"
//! license_server = "licenserver:30000"
//! timeout = 30
//!
//! [connect_retry]
//! max_attempts = 3
//! backoff = 0.5
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use recordlink_proto::framing::MAX_MESSAGE_SIZE;
use recordlink_proto::{Credentials, Language, ServerKind};
use serde::Deserialize;

use crate::error::Error;
use crate::retry::ConnectRetry;

/// Port dialled when `server` names a bare host.
pub const DEFAULT_PORT: u16 = 30050;

/// Default round-trip timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum message size.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = MAX_MESSAGE_SIZE;

/// Session configuration: the full credential set plus transport tuning.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Server host, `host:port`, or a full `tcp://` / `ipc://` endpoint.
    pub server: String,
    /// Company database name.
    pub company_db: String,
    /// Application user name.
    pub user_name: String,
    /// Application user password.
    pub password: String,
    /// Database server product.
    #[serde(deserialize_with = "parse_str")]
    pub server_kind: ServerKind,
    /// Authenticate to the database with the operating system account.
    pub use_trusted: bool,
    /// Session language.
    #[serde(deserialize_with = "parse_str")]
    pub language: Language,
    /// Database user name (required unless trusted).
    pub db_user_name: String,
    /// Database user password.
    pub db_password: String,
    /// License server address (`host:port`).
    pub license_server: String,
    /// Round-trip timeout, in seconds in profiles.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    /// Client identifier sent in the login handshake.
    pub client_id: String,
    /// Retry policy for the connect step.
    pub connect_retry: ConnectRetry,
}

impl ConnectionConfig {
    /// Create a configuration for the given server, company and user.
    pub fn new(
        server: impl Into<String>,
        company_db: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            company_db: company_db.into(),
            user_name: user_name.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the database server product.
    pub fn with_server_kind(mut self, server_kind: ServerKind) -> Self {
        self.server_kind = server_kind;
        self
    }

    /// Use trusted (operating system) database authentication.
    pub fn with_trusted(mut self, use_trusted: bool) -> Self {
        self.use_trusted = use_trusted;
        self
    }

    /// Set the session language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the database credentials.
    pub fn with_db_credentials(
        mut self,
        db_user_name: impl Into<String>,
        db_password: impl Into<String>,
    ) -> Self {
        self.db_user_name = db_user_name.into();
        self.db_password = db_password.into();
        self
    }

    /// Set the license server address.
    pub fn with_license_server(mut self, license_server: impl Into<String>) -> Self {
        self.license_server = license_server.into();
        self
    }

    /// Set the round-trip timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the connect retry policy.
    pub fn with_connect_retry(mut self, connect_retry: ConnectRetry) -> Self {
        self.connect_retry = connect_retry;
        self
    }

    /// Parse a TOML profile.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Configuration(format!("invalid profile: {}", e)))
    }

    /// Read a TOML profile from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read profile {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// nng endpoint to dial.
    pub fn endpoint(&self) -> String {
        let server = self.server.trim();
        if server.contains("://") {
            server.to_string()
        } else if server.contains(':') {
            format!("tcp://{}", server)
        } else {
            format!("tcp://{}:{}", server, DEFAULT_PORT)
        }
    }

    /// Check that every required parameter is present.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("server", &self.server),
            ("company_db", &self.company_db),
            ("user_name", &self.user_name),
            ("password", &self.password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("{} must not be empty", name)));
            }
        }
        if !self.use_trusted && self.db_user_name.trim().is_empty() {
            return Err(Error::Configuration(
                "db_user_name is required unless use_trusted is set".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::Configuration("timeout must be greater than zero".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(Error::Configuration(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials presented in the login handshake.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            server: self.server.clone(),
            company_db: self.company_db.clone(),
            user_name: self.user_name.clone(),
            password: self.password.clone(),
            server_kind: self.server_kind,
            use_trusted: self.use_trusted,
            language: self.language,
            db_user_name: self.db_user_name.clone(),
            db_password: self.db_password.clone(),
            license_server: self.license_server.clone(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            company_db: String::new(),
            user_name: String::new(),
            password: String::new(),
            server_kind: ServerKind::default(),
            use_trusted: false,
            language: Language::default(),
            db_user_name: String::new(),
            db_password: String::new(),
            license_server: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            client_id: generate_client_id(),
            connect_retry: ConnectRetry::default(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("company_db", &self.company_db)
            .field("user_name", &self.user_name)
            .field("server_kind", &self.server_kind)
            .field("use_trusted", &self.use_trusted)
            .field("language", &self.language)
            .field("db_user_name", &self.db_user_name)
            .field("license_server", &self.license_server)
            .field("timeout", &self.timeout)
            .field("max_message_size", &self.max_message_size)
            .field("client_id", &self.client_id)
            .field("connect_retry", &self.connect_retry)
            .finish_non_exhaustive()
    }
}

/// Generate a unique client identifier.
fn generate_client_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    format!("client-{:x}", timestamp)
}

fn parse_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr<Err = String>,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

/// Durations written as (fractional) seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
