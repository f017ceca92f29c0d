//! Layered process configuration.
//!
//! Precedence, lowest first: built-in defaults, the YAML file passed with
//! `--config`, `CRM__*` environment variables (`__` separates sections, e.g.
//! `CRM__DATABASE__HOST`), then command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const ENV_PREFIX: &str = "CRM__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot build database DSN: {0}")]
    Dsn(String),
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(raw.trim()).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub environment: String,
    /// Upper bound for draining in-flight calls after a shutdown signal.
    #[serde(with = "duration_str")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_owned(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    #[serde(with = "duration_str")]
    pub conn_max_lifetime: Duration,
    #[serde(with = "duration_str")]
    pub acquire_timeout: Duration,
    /// Full connection string; when set, the individual parts above are ignored.
    pub dsn: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "crm".to_owned(),
            password: String::new(),
            name: "crm".to_owned(),
            sslmode: "disable".to_owned(),
            max_open_conns: 25,
            max_idle_conns: 5,
            conn_max_lifetime: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(30),
            dsn: None,
        }
    }
}

impl DatabaseConfig {
    /// Connection string for the pool: the explicit `dsn`, or one assembled from the parts.
    ///
    /// # Errors
    /// Returns [`ConfigError::Dsn`] if the host or credentials cannot be encoded into a URL.
    pub fn dsn(&self) -> Result<String, ConfigError> {
        if let Some(dsn) = self.dsn.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(dsn.to_owned());
        }

        let mut url =
            Url::parse("postgres://localhost").map_err(|e| ConfigError::Dsn(e.to_string()))?;
        url.set_host(Some(&self.host))
            .map_err(|e| ConfigError::Dsn(format!("host '{}': {e}", self.host)))?;
        url.set_port(Some(self.port))
            .map_err(|()| ConfigError::Dsn("port".to_owned()))?;
        url.set_username(&self.user)
            .map_err(|()| ConfigError::Dsn("user".to_owned()))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|()| ConfigError::Dsn("password".to_owned()))?;
        }
        url.set_path(&format!("/{}", self.name));
        url.query_pairs_mut().append_pair("sslmode", &self.sslmode);
        Ok(url.into())
    }

    fn redacted(&self) -> Self {
        let mut out = self.clone();
        if !out.password.is_empty() {
            "***".clone_into(&mut out.password);
        }
        out.dsn = out.dsn.map(|dsn| match Url::parse(&dsn) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                url.into()
            }
            Ok(_) => dsn,
            Err(_) => "<unparseable dsn>".to_owned(),
        });
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GrpcConfig {
    pub port: u16,
    /// Page size used when a list or search call asks for none.
    pub default_limit: u32,
    pub max_list_limit: u32,
    pub max_search_limit: u32,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            port: 50055,
            default_limit: 20,
            max_list_limit: 100,
            max_search_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 9055 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub grpc: GrpcConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Values given on the command line; `None` / `0` leave the loaded value alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliOverrides {
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
    /// `-v` count: 1 info, 2 debug, 3+ trace.
    pub verbose: u8,
}

impl AppConfig {
    /// Merge defaults, the optional YAML file and the environment, then validate.
    ///
    /// # Errors
    /// Returns an error if the file is missing, a layer cannot be parsed, or
    /// the merged values fail [`AppConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-validate.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if an override breaks a rule, e.g. both ports equal.
    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) -> Result<(), ConfigError> {
        if let Some(port) = cli.grpc_port {
            self.grpc.port = port;
        }
        if let Some(port) = cli.http_port {
            self.http.port = port;
        }
        match cli.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
        self.validate()
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first rule that does not hold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));

        if self.grpc.port == 0 {
            return invalid("grpc.port must be in 1..=65535");
        }
        if self.http.port == 0 {
            return invalid("http.port must be in 1..=65535");
        }
        if self.grpc.port == self.http.port {
            return invalid("grpc.port and http.port must differ");
        }

        let has_dsn = self
            .database
            .dsn
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty());
        if !has_dsn {
            if self.database.host.trim().is_empty() {
                return invalid("database.host is required");
            }
            if self.database.name.trim().is_empty() {
                return invalid("database.name is required");
            }
        }
        if self.database.max_open_conns == 0 {
            return invalid("database.max_open_conns must be positive");
        }
        if self.database.max_idle_conns > self.database.max_open_conns {
            return invalid("database.max_idle_conns cannot exceed database.max_open_conns");
        }

        if self.grpc.default_limit == 0
            || self.grpc.max_list_limit == 0
            || self.grpc.max_search_limit == 0
        {
            return invalid("grpc page limits must be positive");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }

    /// Pretty JSON with secrets masked, for `check` and `--print-config`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut shown = self.clone();
        shown.database = self.database.redacted();
        serde_json::to_string_pretty(&shown)
    }
}
