//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::Error;

/// Default TCP address for the server.
pub const DEFAULT_TCP_ADDRESS: &str = "tcp://0.0.0.0:30050";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default idle time after which a session is dropped, in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;

/// Default maximum message size (4 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = recordlink_proto::framing::MAX_MESSAGE_SIZE;

/// Company database served when none is configured.
pub const DEFAULT_COMPANY_DB: &str = "SBODemoGB";

fn default_transport_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
        .max(1)
}

/// An application user allowed to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// User name.
    pub name: String,
    /// Password.
    pub password: String,
}

impl UserAccount {
    /// Create an account.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

/// Parse a `name:password` pair.
pub fn parse_account(text: &str) -> Result<UserAccount, String> {
    match text.split_once(':') {
        Some((name, password)) if !name.is_empty() => Ok(UserAccount::new(name, password)),
        _ => Err(format!("expected NAME:PASSWORD, got '{}'", text)),
    }
}

/// Database credentials the server expects from non-trusted logins.
#[derive(Clone, PartialEq, Eq)]
pub struct DbCredentials {
    /// Database user name.
    pub user_name: String,
    /// Database password.
    pub password: String,
}

impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

/// Where the initial records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// Start with empty tables.
    Empty,
    /// The bundled demonstration company.
    Demo,
    /// A JSON seed file.
    File(PathBuf),
}

/// recordlink server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address to bind to (e.g., "tcp://0.0.0.0:30050").
    pub tcp_address: Option<String>,

    /// IPC address to bind to (e.g., "ipc:///tmp/recordlink.sock").
    pub ipc_address: Option<String>,

    /// Identifier reported to clients at login.
    pub server_id: String,

    /// Company database name clients must ask for.
    pub company_db: String,

    /// Display name of the company.
    pub company_name: String,

    /// Accounts allowed to log in.
    pub users: Vec<UserAccount>,

    /// Database credentials checked for non-trusted logins. `None` accepts any.
    pub db_credentials: Option<DbCredentials>,

    /// Request timeout duration.
    pub request_timeout: Duration,

    /// Idle time after which a session and its cursors are dropped.
    /// `None` keeps sessions until logout.
    pub session_timeout: Option<Duration>,

    /// Maximum message size in bytes.
    pub max_message_size: usize,

    /// Number of transport worker loops (AsyncContext instances).
    pub transport_workers: usize,

    /// Initial records.
    pub seed: SeedSource,
}

impl ServerConfig {
    /// Create a configuration serving `company_db` with the default account.
    pub fn new(company_db: impl Into<String>) -> Self {
        let company_db = company_db.into();
        Self {
            tcp_address: Some(DEFAULT_TCP_ADDRESS.to_string()),
            ipc_address: None,
            server_id: default_server_id(),
            company_name: company_db.clone(),
            company_db,
            users: vec![UserAccount::new("manager", "manager")],
            db_credentials: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_timeout: Some(Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            transport_workers: default_transport_workers(),
            seed: SeedSource::Empty,
        }
    }

    /// Set the TCP address.
    pub fn with_tcp_address(mut self, address: impl Into<String>) -> Self {
        self.tcp_address = Some(address.into());
        self
    }

    /// Disable TCP transport.
    pub fn without_tcp(mut self) -> Self {
        self.tcp_address = None;
        self
    }

    /// Set the IPC address.
    pub fn with_ipc_address(mut self, address: impl Into<String>) -> Self {
        self.ipc_address = Some(address.into());
        self
    }

    /// Set the company display name.
    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = name.into();
        self
    }

    /// Set the server identifier.
    pub fn with_server_id(mut self, id: impl Into<String>) -> Self {
        self.server_id = id.into();
        self
    }

    /// Replace the accounts allowed to log in.
    pub fn with_users(mut self, users: Vec<UserAccount>) -> Self {
        self.users = users;
        self
    }

    /// Require these database credentials from non-trusted logins.
    pub fn with_db_credentials(
        mut self,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.db_credentials = Some(DbCredentials {
            user_name: user_name.into(),
            password: password.into(),
        });
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Drop sessions idle for longer than `timeout`.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Keep sessions until they log out.
    pub fn without_session_timeout(mut self) -> Self {
        self.session_timeout = None;
        self
    }

    /// Set the maximum message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the number of transport worker loops.
    pub fn with_transport_workers(mut self, workers: usize) -> Self {
        self.transport_workers = workers.max(1);
        self
    }

    /// Set where the initial records come from.
    pub fn with_seed(mut self, seed: SeedSource) -> Self {
        self.seed = seed;
        self
    }

    /// Check if at least one transport is configured.
    pub fn has_transport(&self) -> bool {
        self.tcp_address.is_some() || self.ipc_address.is_some()
    }

    /// Look up an account by user name.
    pub fn account(&self, name: &str) -> Option<&UserAccount> {
        self.users.iter().find(|account| account.name == name)
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<(), Error> {
        if self.company_db.is_empty() {
            return Err(Error::Config("company database name is empty".to_string()));
        }
        if self.users.is_empty() {
            return Err(Error::Config("no user accounts configured".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(Error::Config("maximum message size must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COMPANY_DB)
    }
}

fn default_server_id() -> String {
    format!("recordlink-{}", std::process::id())
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "recordlink-server")]
#[command(version, about = "In-memory recordlink reference server", long_about = None)]
pub struct Args {
    /// TCP address to bind to.
    #[arg(long, default_value = DEFAULT_TCP_ADDRESS)]
    pub tcp: String,

    /// IPC address to bind to (optional).
    #[arg(long)]
    pub ipc: Option<String>,

    /// Disable TCP transport (requires --ipc to be set).
    #[arg(long)]
    pub no_tcp: bool,

    /// Identifier reported to clients.
    #[arg(long)]
    pub server_id: Option<String>,

    /// Company database served.
    #[arg(long, default_value = DEFAULT_COMPANY_DB)]
    pub company_db: String,

    /// Company display name (defaults to the database name).
    #[arg(long)]
    pub company_name: Option<String>,

    /// Account allowed to log in, as NAME:PASSWORD. Repeatable.
    #[arg(long = "user", value_parser = parse_account, default_value = "manager:manager")]
    pub users: Vec<UserAccount>,

    /// Database user required from non-trusted logins.
    #[arg(long, env = "RECORDLINK_DB_USER", requires = "db_password")]
    pub db_user: Option<String>,

    /// Database password required from non-trusted logins.
    #[arg(long, env = "RECORDLINK_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Seconds a session may stay idle before it is dropped (0 = never).
    #[arg(long, default_value_t = DEFAULT_SESSION_TIMEOUT_SECS)]
    pub session_timeout: u64,

    /// Maximum message size in megabytes.
    #[arg(long, default_value_t = 4)]
    pub max_message_mb: usize,

    /// Transport worker loops (0 = auto).
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Load initial records from a JSON seed file.
    #[arg(long, conflicts_with = "demo")]
    pub seed: Option<PathBuf>,

    /// Load the bundled demonstration company.
    #[arg(long)]
    pub demo: bool,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> ServerConfig {
        let tcp_address = if self.no_tcp { None } else { Some(self.tcp) };
        let transport_workers = if self.workers == 0 {
            default_transport_workers()
        } else {
            self.workers.max(1)
        };
        let seed = match (self.seed, self.demo) {
            (Some(path), _) => SeedSource::File(path),
            (None, true) => SeedSource::Demo,
            (None, false) => SeedSource::Empty,
        };
        let db_credentials = match (self.db_user, self.db_password) {
            (Some(user_name), Some(password)) => Some(DbCredentials {
                user_name,
                password,
            }),
            _ => None,
        };

        ServerConfig {
            tcp_address,
            ipc_address: self.ipc,
            server_id: self.server_id.unwrap_or_else(default_server_id),
            company_name: self.company_name.unwrap_or_else(|| self.company_db.clone()),
            company_db: self.company_db,
            users: self.users,
            db_credentials,
            request_timeout: Duration::from_secs(self.timeout),
            session_timeout: (self.session_timeout > 0)
                .then(|| Duration::from_secs(self.session_timeout)),
            max_message_size: self.max_message_mb * 1024 * 1024,
            transport_workers,
            seed,
        }
    }
}
