use std::path::Path;
use std::time::Duration;

use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{AnyPool, ConnectOptions};
use tracing::{info, warn};

use crate::PersistenceError;

const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SQLITE_URL: &str = "sqlite://database/incidents.db?mode=rwc";

/// How incident statements are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `CALL Sp_InsertaIncidencia(...)` and friends, schema owned by the DBA.
    Procedures,
    /// Plain statements against tables bootstrapped at start-up.
    Plain,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub db_type: String,
    pub url: String,
    pub dialect: Dialect,
    /// Bound on connection acquisition and on every statement.
    pub timeout: Duration,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolution order: `DATABASE_URL`, then `DB_HOST`/`DB_USER`/... for
    /// MySQL, then a local SQLite file.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PersistenceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = get("DB_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let url = match get("DATABASE_URL") {
            Some(url) => url,
            None => match get("DB_HOST") {
                Some(host) => {
                    let port = match get("DB_PORT") {
                        Some(p) => p.trim().parse::<u16>().map_err(|_| {
                            PersistenceError::Config(format!("DB_PORT is not a port number: {p}"))
                        })?,
                        None => DEFAULT_MYSQL_PORT,
                    };
                    let mut options = MySqlConnectOptions::new().host(&host).port(port);
                    if let Some(user) = get("DB_USER") {
                        options = options.username(&user);
                    }
                    if let Some(password) = get("DB_PASSWORD") {
                        options = options.password(&password);
                    }
                    if let Some(name) = get("DB_NAME") {
                        options = options.database(&name);
                    }
                    options.to_url_lossy().to_string()
                }
                None => DEFAULT_SQLITE_URL.to_string(),
            },
        };

        let db_type = get("DB_TYPE").unwrap_or_else(|| {
            url.split(':')
                .next()
                .unwrap_or("sqlite")
                .to_ascii_lowercase()
        });

        let dialect = match get("DB_USE_PROCEDURES").map(|v| v.to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Dialect::Procedures,
            Some(_) => Dialect::Plain,
            None if db_type == "mysql" => Dialect::Procedures,
            None => Dialect::Plain,
        };

        Ok(DbConfig {
            db_type,
            url,
            dialect,
            timeout,
        })
    }

    /// Local SQLite file with plain statements, created on first use.
    pub fn sqlite(path: &Path) -> Self {
        DbConfig {
            db_type: "sqlite".to_string(),
            url: format!("sqlite://{}?mode=rwc", path.display()),
            dialect: Dialect::Plain,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Builds the pool without connecting; the first statement opens the first
/// connection, so an unreachable server shows up as a failed save.
///
/// SQLite creates the file but not its directory, so a missing parent
/// directory is created here.
pub fn create_pool(config: &DbConfig) -> Result<AnyPool, PersistenceError> {
    install_default_drivers();
    if let Some(parent) = sqlite_file(&config.url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            match std::fs::create_dir_all(parent) {
                Ok(()) => info!("created database directory {}", parent.display()),
                Err(e) => warn!("cannot create database directory {}: {e}", parent.display()),
            }
        }
    }
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.timeout)
        .connect_lazy(&config.url)?;
    Ok(pool)
}

/// File path behind a `sqlite:` URL, `None` for other schemes and for
/// in-memory databases.
pub fn sqlite_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}
