//! Configuration for the ledger
//!
//! Every setting is looked up by a dotted key (`db.mysql.port`). A value is
//! resolved in three layers, highest first: an environment variable named
//! `GAME_LEDGER_` + the key uppercased with dots replaced by underscores
//! (`GAME_LEDGER_DB_MYSQL_PORT`), then the host's configuration, then the
//! built-in default. Blank values are treated as unset at every layer.
//!
//! The layers are stacked as `config` sources and the result is
//! deserialized into [`LedgerConfig`].

use crate::types::LedgerError;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "GAME_LEDGER_";

pub const KEY_DB_TYPE: &str = "db.type";
pub const KEY_SQLITE_PATH: &str = "db.sqlite.path";
pub const KEY_MYSQL_HOST: &str = "db.mysql.host";
pub const KEY_MYSQL_PORT: &str = "db.mysql.port";
pub const KEY_MYSQL_DATABASE: &str = "db.mysql.database";
pub const KEY_MYSQL_USER: &str = "db.mysql.user";
pub const KEY_MYSQL_PASSWORD: &str = "db.mysql.password";
pub const KEY_MYSQL_SSL: &str = "db.mysql.ssl";
pub const KEY_POOL_MAX_SIZE: &str = "db.mysql.pool.max_size";
pub const KEY_POOL_MIN_IDLE: &str = "db.mysql.pool.min_idle";
pub const KEY_POOL_CONNECTION_TIMEOUT: &str = "db.mysql.pool.connection_timeout_ms";
pub const KEY_POOL_LEAK_THRESHOLD: &str = "db.mysql.pool.leak_detection_threshold_ms";
pub const KEY_STMT_CACHE_SIZE: &str = "db.mysql.stmt_cache_size";

/// Every key that can be overridden from the environment
pub const KEYS: [&str; 13] = [
    KEY_DB_TYPE,
    KEY_SQLITE_PATH,
    KEY_MYSQL_HOST,
    KEY_MYSQL_PORT,
    KEY_MYSQL_DATABASE,
    KEY_MYSQL_USER,
    KEY_MYSQL_PASSWORD,
    KEY_MYSQL_SSL,
    KEY_POOL_MAX_SIZE,
    KEY_POOL_MIN_IDLE,
    KEY_POOL_CONNECTION_TIMEOUT,
    KEY_POOL_LEAK_THRESHOLD,
    KEY_STMT_CACHE_SIZE,
];

/// Environment variable name overriding `key`
pub fn env_key(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase().replace('.', "_"))
}

/// Overrides currently set in the process environment, keyed by dotted key
///
/// Key names contain underscores themselves, so variables are looked up per
/// known key rather than split on a separator.
pub fn env_overrides() -> HashMap<String, String> {
    KEYS.iter()
        .filter_map(|key| {
            std::env::var(env_key(key))
                .ok()
                .map(|value| (key.to_string(), value))
        })
        .collect()
}

/// Storage backend selected by `db.type`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BackendKind {
    #[default]
    Sqlite,
    MySql,
    Memory,
}

impl BackendKind {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" => Some(BackendKind::Sqlite),
            "mysql" => Some(BackendKind::MySql),
            "memory" => Some(BackendKind::Memory),
            _ => None,
        }
    }

    fn unknown(name: &str) -> String {
        format!("unknown backend '{}' (expected sqlite, mysql or memory)", name)
    }
}

impl FromStr for BackendKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| LedgerError::config(KEY_DB_TYPE, Self::unknown(s)))
    }
}

impl TryFrom<String> for BackendKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value).ok_or_else(|| Self::unknown(&value))
    }
}

/// Embedded store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file; parent directories are created on open
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ledger.db"),
        }
    }
}

/// Connection pool sizing and timing (`db.mysql.pool.*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound of open connections
    pub max_size: u32,
    /// Connections kept open while idle
    pub min_idle: u32,
    /// How long an operation waits for a free connection
    #[serde(rename = "connection_timeout_ms", with = "millis")]
    pub connection_timeout: Duration,
    /// Lease duration after which a returned connection is reported
    #[serde(rename = "leak_detection_threshold_ms", with = "millis")]
    pub leak_detection_threshold: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 2,
            connection_timeout: Duration::from_secs(30),
            leak_detection_threshold: Duration::from_secs(10),
        }
    }
}

/// Pooled store settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Require TLS to the server
    pub ssl: bool,
    pub pool: PoolConfig,
    /// Prepared statements cached per connection
    pub stmt_cache_size: usize,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "game_ledger".to_string(),
            user: "root".to_string(),
            password: String::new(),
            ssl: false,
            pool: PoolConfig::default(),
            stmt_cache_size: 250,
        }
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl", &self.ssl)
            .field("pool", &self.pool)
            .field("stmt_cache_size", &self.stmt_cache_size)
            .finish()
    }
}

impl MySqlConfig {
    /// Reject pool settings the pool builder would refuse
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.pool.max_size == 0 {
            return Err(LedgerError::config(KEY_POOL_MAX_SIZE, "must be positive"));
        }
        if self.pool.min_idle > self.pool.max_size {
            return Err(LedgerError::config(
                KEY_POOL_MIN_IDLE,
                format!(
                    "{} exceeds pool size {}",
                    self.pool.min_idle, self.pool.max_size
                ),
            ));
        }
        if self.pool.connection_timeout.is_zero() {
            return Err(LedgerError::config(
                KEY_POOL_CONNECTION_TIMEOUT,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Complete ledger configuration (the `db` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    pub sqlite: SqliteConfig,
    pub mysql: MySqlConfig,
}

/// Root of the key space; every key lives under `db.`
#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    db: LedgerConfig,
}

impl LedgerConfig {
    /// Resolve `host` values under the process environment
    pub fn resolve(host: &HashMap<String, String>) -> Result<Self, LedgerError> {
        Self::resolve_with(&env_overrides(), host)
    }

    /// Resolve with an explicit override layer instead of the environment
    pub fn resolve_with(
        overrides: &HashMap<String, String>,
        host: &HashMap<String, String>,
    ) -> Result<Self, LedgerError> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(layer(host)?)
            .add_source(layer(overrides)?)
            .build()?
            .try_deserialize()?;

        settings.db.mysql.validate()?;
        Ok(settings.db)
    }
}

/// One layer of dotted keys, skipping blank values so lower layers show through
fn layer(values: &HashMap<String, String>) -> Result<Config, ConfigError> {
    let mut builder = Config::builder();
    for (key, value) in values {
        let value = value.trim();
        if !value.is_empty() {
            builder = builder.set_override(key.as_str(), value)?;
        }
    }
    builder.build()
}

/// `Duration` as a whole number of milliseconds
mod millis {
    use serde::{ser, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis()).map_err(<S::Error as ser::Error>::custom)?;
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = LedgerConfig::resolve_with(&source(&[]), &source(&[])).unwrap();

        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.mysql.port, 3306);
        assert_eq!(config.mysql.pool.max_size, 10);
        assert_eq!(config.mysql.pool.min_idle, 2);
        assert_eq!(config.mysql.pool.connection_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_override_beats_config_beats_default() {
        let overrides = source(&[(KEY_MYSQL_HOST, "db.internal")]);
        let config = source(&[
            (KEY_MYSQL_HOST, "db.example"),
            (KEY_MYSQL_PORT, "3307"),
            (KEY_DB_TYPE, "MySQL"),
        ]);

        let resolved = LedgerConfig::resolve_with(&overrides, &config).unwrap();

        assert_eq!(resolved.mysql.host, "db.internal");
        assert_eq!(resolved.mysql.port, 3307);
        assert_eq!(resolved.mysql.database, "game_ledger");
        assert_eq!(resolved.backend, BackendKind::MySql);
    }

    #[test]
    fn test_blank_override_falls_through_to_config() {
        let overrides = source(&[(KEY_SQLITE_PATH, "  ")]);
        let config = source(&[(KEY_SQLITE_PATH, "/srv/game/ledger.db")]);

        let resolved = LedgerConfig::resolve_with(&overrides, &config).unwrap();

        assert_eq!(resolved.sqlite.path, PathBuf::from("/srv/game/ledger.db"));
    }

    #[test]
    fn test_blank_config_falls_through_to_default() {
        let config = source(&[(KEY_MYSQL_USER, ""), (KEY_POOL_MAX_SIZE, " ")]);

        let resolved = LedgerConfig::resolve_with(&source(&[]), &config).unwrap();

        assert_eq!(resolved.mysql.user, "root");
        assert_eq!(resolved.mysql.pool.max_size, 10);
    }

    #[test]
    fn test_durations_are_milliseconds() {
        let config = source(&[
            (KEY_POOL_CONNECTION_TIMEOUT, "1500"),
            (KEY_POOL_LEAK_THRESHOLD, "250"),
        ]);

        let resolved = LedgerConfig::resolve_with(&source(&[]), &config).unwrap();

        assert_eq!(
            resolved.mysql.pool.connection_timeout,
            Duration::from_millis(1500)
        );
        assert_eq!(
            resolved.mysql.pool.leak_detection_threshold,
            Duration::from_millis(250)
        );
    }

    #[rstest]
    #[case::port(KEY_MYSQL_PORT, "three")]
    #[case::ssl(KEY_MYSQL_SSL, "maybe")]
    #[case::timeout(KEY_POOL_CONNECTION_TIMEOUT, "-1")]
    #[case::backend(KEY_DB_TYPE, "postgres")]
    fn test_malformed_values_are_config_errors(#[case] key: &str, #[case] value: &str) {
        let err = LedgerConfig::resolve_with(&source(&[]), &source(&[(key, value)])).unwrap_err();

        assert!(matches!(err, LedgerError::Config { .. }), "{:?}", err);
        assert!(err.is_validation());
    }

    #[rstest]
    #[case::zero_pool(KEY_POOL_MAX_SIZE, "0")]
    #[case::idle_above_max(KEY_POOL_MIN_IDLE, "11")]
    #[case::zero_timeout(KEY_POOL_CONNECTION_TIMEOUT, "0")]
    fn test_invalid_pool_settings_name_their_key(#[case] key: &str, #[case] value: &str) {
        let err = LedgerConfig::resolve_with(&source(&[]), &source(&[(key, value)])).unwrap_err();

        assert!(matches!(err, LedgerError::Config { key: ref k, .. } if k == key));
    }

    #[rstest]
    #[case::yes("yes", true)]
    #[case::one("1", true)]
    #[case::upper_true("TRUE", true)]
    #[case::off("off", false)]
    fn test_ssl_flag_parsing(#[case] value: &str, #[case] expected: bool) {
        let resolved =
            LedgerConfig::resolve_with(&source(&[]), &source(&[(KEY_MYSQL_SSL, value)])).unwrap();
        assert_eq!(resolved.mysql.ssl, expected);
    }

    #[rstest]
    #[case::lower("memory", BackendKind::Memory)]
    #[case::mixed("SQLite", BackendKind::Sqlite)]
    fn test_backend_names_are_case_insensitive(#[case] name: &str, #[case] expected: BackendKind) {
        assert_eq!(name.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn test_env_key_translation() {
        assert_eq!(env_key(KEY_DB_TYPE), "GAME_LEDGER_DB_TYPE");
        assert_eq!(
            env_key(KEY_POOL_LEAK_THRESHOLD),
            "GAME_LEDGER_DB_MYSQL_POOL_LEAK_DETECTION_THRESHOLD_MS"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = MySqlConfig {
            password: "hunter2".to_string(),
            ..MySqlConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
