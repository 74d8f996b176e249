//! Configuration types
//!
//! Every section loads from `TABULA_*` environment variables with defaults
//! suitable for local development, and validates itself explicitly.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::serializer::SerializerKind;
use crate::{ConfigError, TabulaResult};

static SQL_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex is valid")
});

/// Check that `value` can be interpolated into SQL as a bare identifier.
pub fn is_sql_identifier(value: &str) -> bool {
    SQL_IDENTIFIER.is_match(value)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// STORE BACKEND SELECTION
// ============================================================================

/// Which store engine backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Process-local map.
    #[default]
    Memory,
    /// Remote redis-compatible cache.
    Redis,
    /// Rows in a Postgres table.
    Postgres,
    /// Embedded LMDB environment.
    Lmdb,
}

impl StoreBackendKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "postgres" | "db" => Ok(Self::Postgres),
            "lmdb" => Ok(Self::Lmdb),
            other => Err(ConfigError::BackendNotSupported {
                backend: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Postgres => "postgres",
            Self::Lmdb => "lmdb",
        }
    }
}

// ============================================================================
// BACKEND SECTIONS
// ============================================================================

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Prefix prepended to every key.
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "store:".to_string(),
        }
    }
}

impl RedisConfig {
    /// Environment variables:
    /// - `TABULA_REDIS_URL` (default: redis://127.0.0.1:6379)
    /// - `TABULA_REDIS_PREFIX` (default: store:)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env_string("TABULA_REDIS_URL", &defaults.url),
            prefix: env_string("TABULA_REDIS_PREFIX", &defaults.prefix),
        }
    }
}

/// Postgres connection pool and table settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Table holding store entries.
    pub table: String,
    /// Schema searched by live schema introspection.
    pub schema: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tabula".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            table: "tabula_store".to_string(),
            schema: "public".to_string(),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("TABULA_DB_HOST", &defaults.host),
            port: env_parse("TABULA_DB_PORT", defaults.port),
            dbname: env_string("TABULA_DB_NAME", &defaults.dbname),
            user: env_string("TABULA_DB_USER", &defaults.user),
            password: env_string("TABULA_DB_PASSWORD", &defaults.password),
            max_size: env_parse("TABULA_DB_POOL_SIZE", defaults.max_size),
            timeout: Duration::from_secs(env_parse("TABULA_DB_TIMEOUT", 30)),
            table: env_string("TABULA_STORE_TABLE", &defaults.table),
            schema: env_string("TABULA_DB_SCHEMA", &defaults.schema),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "db.host".to_string(),
            });
        }
        if self.max_size == 0 {
            return Err(invalid("db.max_size", self.max_size, "pool size must be positive"));
        }
        if !is_sql_identifier(&self.table) {
            return Err(invalid("db.table", &self.table, "must be a plain SQL identifier"));
        }
        if !is_sql_identifier(&self.schema) {
            return Err(invalid("db.schema", &self.schema, "must be a plain SQL identifier"));
        }
        Ok(())
    }
}

/// Embedded LMDB settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmdbConfig {
    /// Directory holding the LMDB files.
    pub path: PathBuf,
    /// Map size in megabytes.
    pub max_size_mb: usize,
}

impl Default for LmdbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tabula-store"),
            max_size_mb: 64,
        }
    }
}

impl LmdbConfig {
    /// Environment variables:
    /// - `TABULA_LMDB_PATH` (default: ./data/tabula-store)
    /// - `TABULA_LMDB_MAX_SIZE_MB` (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("TABULA_LMDB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: env_parse("TABULA_LMDB_MAX_SIZE_MB", defaults.max_size_mb),
        }
    }

    /// Map size in bytes, or `None` if it does not fit in `usize`.
    pub fn map_size_bytes(&self) -> Option<usize> {
        self.max_size_mb.checked_mul(1024 * 1024)
    }
}

// ============================================================================
// STORE CONFIGURATION
// ============================================================================

/// Store engine configuration: the selected backend plus every backend's
/// settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    pub redis: RedisConfig,
    pub db: DbConfig,
    pub lmdb: LmdbConfig,
}

impl StoreConfig {
    /// An in-memory store configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Load from environment; `TABULA_STORE_BACKEND` selects the backend.
    pub fn from_env() -> TabulaResult<Self> {
        let backend = match std::env::var("TABULA_STORE_BACKEND") {
            Ok(value) => StoreBackendKind::parse(&value)?,
            Err(_) => StoreBackendKind::default(),
        };
        Ok(Self {
            backend,
            redis: RedisConfig::from_env(),
            db: DbConfig::from_env(),
            lmdb: LmdbConfig::from_env(),
        })
    }

    /// Validate the settings of the selected backend only.
    pub fn validate(&self) -> TabulaResult<()> {
        match self.backend {
            StoreBackendKind::Memory => {}
            StoreBackendKind::Redis => {
                if !self.redis.url.starts_with("redis://") && !self.redis.url.starts_with("rediss://")
                {
                    return Err(invalid("redis.url", &self.redis.url, "must be a redis:// URL").into());
                }
            }
            StoreBackendKind::Postgres => self.db.validate()?,
            StoreBackendKind::Lmdb => {
                if self.lmdb.max_size_mb == 0 {
                    return Err(invalid(
                        "lmdb.max_size_mb",
                        self.lmdb.max_size_mb,
                        "map size must be positive",
                    )
                    .into());
                }
                if self.lmdb.map_size_bytes().is_none() {
                    return Err(invalid(
                        "lmdb.max_size_mb",
                        self.lmdb.max_size_mb,
                        "map size overflows the address space",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Metadata cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataConfig {
    /// Prefix for descriptor keys in the store. Empty by default, so a
    /// descriptor is stored under its plain type name.
    pub key_prefix: String,
}

impl MetadataConfig {
    /// Environment variables:
    /// - `TABULA_METADATA_PREFIX` (default: empty)
    pub fn from_env() -> Self {
        Self {
            key_prefix: env_string("TABULA_METADATA_PREFIX", ""),
        }
    }
}

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabulaConfig {
    pub store: StoreConfig,
    pub metadata: MetadataConfig,
    pub serializer: SerializerKind,
}

impl TabulaConfig {
    /// Environment variables: see [`StoreConfig::from_env`],
    /// [`MetadataConfig::from_env`] and `TABULA_SERIALIZER` (`string` or
    /// `json`, default: string).
    pub fn from_env() -> TabulaResult<Self> {
        let serializer = match std::env::var("TABULA_SERIALIZER") {
            Ok(value) => SerializerKind::parse(&value)
                .ok_or_else(|| invalid("serializer", &value, "expected `string` or `json`"))?,
            Err(_) => SerializerKind::default(),
        };
        Ok(Self {
            store: StoreConfig::from_env()?,
            metadata: MetadataConfig::from_env(),
            serializer,
        })
    }

    pub fn validate(&self) -> TabulaResult<()> {
        self.store.validate()
    }
}
