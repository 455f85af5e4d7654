//! Application configuration assembled from an explicit environment snapshot.
//!
//! The process environment is captured once at startup into an [`EnvSnapshot`],
//! sanitised into a [`SanitizedEnv`], and only then turned into an [`AppConfig`].
//! Assembly is a pure function of the sanitised map, so tests never touch the
//! real process environment. `.env` files are honoured in development.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// libpq-style variable that can silently downgrade transport encryption.
pub const SSL_MODE_OVERRIDE: &str = "PGSSLMODE";

/// Variables consumed by [`AppConfig::from_env`]. Everything else in the
/// snapshot is ignored.
const RECOGNISED: &[&str] = &[
    "DBUSER",
    "DB",
    "DBPASS",
    "DBHOST",
    "DBPORT",
    "LISTEN_HOST",
    "PORT",
    "APP_ENV",
    "POOL_MAX_CONNECTIONS",
    "POOL_MIN_CONNECTIONS",
    "POOL_ACQUIRE_TIMEOUT_SECS",
    "POOL_IDLE_TIMEOUT_SECS",
    "LOG_FORMAT",
];

/// Load `.env` (if present) and capture the process environment.
///
/// Called once at startup. The snapshot must be [sanitised](EnvSnapshot::sanitized)
/// before it can be turned into an [`AppConfig`].
pub fn load_env() -> EnvSnapshot {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    EnvSnapshot::capture()
}

/// A point-in-time copy of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Copy the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Strip variables that could override the fixed transport-encryption
    /// settings. Must run before configuration assembly.
    #[must_use]
    pub fn sanitized(mut self) -> SanitizedEnv {
        if let Some(mode) = self.vars.remove(SSL_MODE_OVERRIDE) {
            tracing::warn!(
                ignored = %mode,
                "Ignoring {SSL_MODE_OVERRIDE}: database encryption is fixed by configuration"
            );
        }
        SanitizedEnv(self)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An [`EnvSnapshot`] with the encryption override removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedEnv(EnvSnapshot);

impl SanitizedEnv {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    /// Recognised variables only, keyed the way the `config` crate expects.
    fn recognised(&self) -> config::Map<String, String> {
        RECOGNISED
            .iter()
            .filter_map(|key| Some((key.to_lowercase(), self.get(key)?.to_owned())))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("POOL_MAX_CONNECTIONS must be at least 1")]
    EmptyPool,

    #[error("POOL_MIN_CONNECTIONS ({min}) exceeds POOL_MAX_CONNECTIONS ({max})")]
    MinAboveMax { min: u32, max: u32 },

    #[error("POOL_ACQUIRE_TIMEOUT_SECS must be at least 1")]
    UnboundedAcquire,

    #[error("Unsupported LOG_FORMAT `{0}` (expected `text` or `json`)")]
    LogFormat(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: DeploymentMode,
}

/// Connection settings for the status database.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    /// Database name.
    pub name: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Always [`TlsPolicy::MANAGED_REQUIRED`]; never read from the environment.
    pub tls: TlsPolicy,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Transport encryption requirements for database sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPolicy {
    pub required: bool,
    pub verify_server_cert: bool,
}

impl TlsPolicy {
    /// Managed PostgreSQL posture: TLS mandatory, server certificate accepted
    /// without verification.
    pub const MANAGED_REQUIRED: Self = Self {
        required: true,
        verify_server_cert: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Upper bound on how long a request waits for a lease.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Controls how much error detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl DeploymentMode {
    /// `development` (any case) selects development; anything else is production.
    pub fn from_setting(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn exposes_error_detail(self) -> bool {
        matches!(self, Self::Development)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_setting(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::LogFormat(value.to_owned())),
        }
    }

    /// Read `LOG_FORMAT` straight from a snapshot, before configuration is
    /// assembled. Unset or empty means text.
    pub fn from_snapshot(env: &EnvSnapshot) -> Result<Self, ConfigError> {
        match env.get("LOG_FORMAT").filter(|v| !v.trim().is_empty()) {
            Some(value) => Self::from_setting(value),
            None => Ok(Self::Text),
        }
    }
}

/// Flat view of the recognised variables, after defaults.
#[derive(Debug, Deserialize)]
struct RawEnv {
    dbuser: String,
    db: String,
    dbpass: String,
    dbhost: String,
    dbport: u16,
    listen_host: String,
    port: u16,
    app_env: String,
    pool_max_connections: u32,
    pool_min_connections: u32,
    pool_acquire_timeout_secs: u64,
    pool_idle_timeout_secs: u64,
    log_format: String,
}

impl AppConfig {
    /// Assemble configuration from a sanitised snapshot.
    pub fn from_env(env: &SanitizedEnv) -> Result<Self, ConfigError> {
        let raw: RawEnv = config::Config::builder()
            // Defaults
            .set_default("dbhost", "localhost")?
            .set_default("dbport", 5432)?
            .set_default("listen_host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("app_env", "development")?
            .set_default("pool_max_connections", 10)?
            .set_default("pool_min_connections", 0)?
            .set_default("pool_acquire_timeout_secs", 10)?
            .set_default("pool_idle_timeout_secs", 10)?
            .set_default("log_format", "text")?
            .add_source(
                config::Environment::default()
                    .source(Some(env.recognised()))
                    .ignore_empty(true),
            )
            .build()?
            .try_deserialize()?;

        if raw.pool_max_connections == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if raw.pool_min_connections > raw.pool_max_connections {
            return Err(ConfigError::MinAboveMax {
                min: raw.pool_min_connections,
                max: raw.pool_max_connections,
            });
        }
        if raw.pool_acquire_timeout_secs == 0 {
            return Err(ConfigError::UnboundedAcquire);
        }

        let log_format = LogFormat::from_setting(&raw.log_format)?;

        Ok(Self {
            server: ServerConfig {
                host: raw.listen_host,
                port: raw.port,
                mode: DeploymentMode::from_setting(&raw.app_env),
            },
            database: DatabaseConfig {
                user: raw.dbuser,
                name: raw.db,
                password: raw.dbpass,
                host: raw.dbhost,
                port: raw.dbport,
                tls: TlsPolicy::MANAGED_REQUIRED,
            },
            pool: PoolConfig {
                max_connections: raw.pool_max_connections,
                min_connections: raw.pool_min_connections,
                acquire_timeout: Duration::from_secs(raw.pool_acquire_timeout_secs),
                idle_timeout: Duration::from_secs(raw.pool_idle_timeout_secs),
            },
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> EnvSnapshot {
        pairs.iter().copied().collect()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![("DBUSER", "status"), ("DB", "appdb"), ("DBPASS", "secret")]
    }

    #[test]
    fn defaults_fill_unset_values() {
        let cfg = AppConfig::from_env(&snapshot(&minimal()).sanitized()).unwrap();

        assert_eq!(cfg.database.user, "status");
        assert_eq!(cfg.database.name, "appdb");
        assert_eq!(cfg.database.password, "secret");
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.mode, DeploymentMode::Development);
        assert_eq!(cfg.pool.max_connections, 10);
        assert_eq!(cfg.pool.min_connections, 0);
        assert_eq!(cfg.pool.acquire_timeout, Duration::from_secs(10));
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn explicit_values_are_used() {
        let env = snapshot(&[
            ("DBUSER", "svc"),
            ("DB", "orders"),
            ("DBPASS", "12345"),
            ("DBHOST", "db.internal"),
            ("DBPORT", "6432"),
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("POOL_MAX_CONNECTIONS", "4"),
            ("POOL_MIN_CONNECTIONS", "1"),
            ("POOL_ACQUIRE_TIMEOUT_SECS", "3"),
            ("LOG_FORMAT", "JSON"),
        ]);
        let cfg = AppConfig::from_env(&env.sanitized()).unwrap();

        assert_eq!(cfg.database.password, "12345");
        assert_eq!(cfg.database.host, "db.internal");
        assert_eq!(cfg.database.port, 6432);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.mode, DeploymentMode::Production);
        assert_eq!(cfg.pool.max_connections, 4);
        assert_eq!(cfg.pool.min_connections, 1);
        assert_eq!(cfg.pool.acquire_timeout, Duration::from_secs(3));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_user_is_rejected() {
        let env = snapshot(&[("DB", "appdb"), ("DBPASS", "secret")]);
        assert!(matches!(
            AppConfig::from_env(&env.sanitized()),
            Err(ConfigError::Source(_))
        ));
    }

    #[test]
    fn ssl_mode_override_is_neutralised() {
        let mut pairs = minimal();
        pairs.push((SSL_MODE_OVERRIDE, "disable"));
        let env = snapshot(&pairs).sanitized();

        assert_eq!(env.get(SSL_MODE_OVERRIDE), None);
        let cfg = AppConfig::from_env(&env).unwrap();
        assert!(cfg.database.tls.required);
        assert!(!cfg.database.tls.verify_server_cert);
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let mut pairs = minimal();
        pairs.push(("PATH", "/usr/bin"));
        pairs.push(("WEIRD.KEY(X86)", "1"));
        assert!(AppConfig::from_env(&snapshot(&pairs).sanitized()).is_ok());
    }

    #[test]
    fn pool_limits_are_validated() {
        let mut zero = minimal();
        zero.push(("POOL_MAX_CONNECTIONS", "0"));
        assert!(matches!(
            AppConfig::from_env(&snapshot(&zero).sanitized()),
            Err(ConfigError::EmptyPool)
        ));

        let mut inverted = minimal();
        inverted.push(("POOL_MAX_CONNECTIONS", "2"));
        inverted.push(("POOL_MIN_CONNECTIONS", "5"));
        assert!(matches!(
            AppConfig::from_env(&snapshot(&inverted).sanitized()),
            Err(ConfigError::MinAboveMax { min: 5, max: 2 })
        ));

        let mut unbounded = minimal();
        unbounded.push(("POOL_ACQUIRE_TIMEOUT_SECS", "0"));
        assert!(matches!(
            AppConfig::from_env(&snapshot(&unbounded).sanitized()),
            Err(ConfigError::UnboundedAcquire)
        ));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("LOG_FORMAT", "xml"));
        assert!(matches!(
            AppConfig::from_env(&snapshot(&pairs).sanitized()),
            Err(ConfigError::LogFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn deployment_mode_parsing() {
        assert_eq!(DeploymentMode::from_setting("Development"), DeploymentMode::Development);
        assert_eq!(DeploymentMode::from_setting("staging"), DeploymentMode::Production);
        assert!(!DeploymentMode::Production.exposes_error_detail());
    }

    #[test]
    fn missing_password_is_rejected() {
        for pairs in [
            vec![("DBUSER", "status"), ("DB", "appdb")],
            vec![("DBUSER", "status"), ("DB", "appdb"), ("DBPASS", "")],
        ] {
            assert!(matches!(
                AppConfig::from_env(&snapshot(&pairs).sanitized()),
                Err(ConfigError::Source(_))
            ));
        }
    }

    #[test]
    fn log_format_read_before_assembly_treats_empty_as_text() {
        assert_eq!(LogFormat::from_snapshot(&snapshot(&[])).unwrap(), LogFormat::Text);
        assert_eq!(
            LogFormat::from_snapshot(&snapshot(&[("LOG_FORMAT", "")])).unwrap(),
            LogFormat::Text
        );
        assert_eq!(
            LogFormat::from_snapshot(&snapshot(&[("LOG_FORMAT", "json")])).unwrap(),
            LogFormat::Json
        );
        assert!(LogFormat::from_snapshot(&snapshot(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let pairs = [("DBUSER", "status"), ("DB", "appdb"), ("DBPASS", "hunter2")];
        let cfg = AppConfig::from_env(&snapshot(&pairs).sanitized()).unwrap();
        let rendered = format!("{:?}", cfg.database);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
