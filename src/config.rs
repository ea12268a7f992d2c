//! Job configuration.
//!
//! The configuration is a plain value read from a TOML file and handed to
//! [`Pipeline::new`](crate::pipeline::Pipeline::new). Nothing is stored
//! globally.
//!
//! ```toml
//! [database]
//! host = "localhost"
//! user = "root"
//! password = "secret"
//! database = "deportes_online"
//!
//! [load]
//! legacy_trailing_comma = false
//! ```

use crate::error::{EtlError, EtlResult};

use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use std::path::{Path, PathBuf};

/// Default file name looked up in the working directory.
pub const CONFIG_FILE: &str = "etl.toml";

const APP_DIR: &str = "daily-sales-etl";

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtlConfig {
    pub database: DbConfig,
    #[serde(default)]
    pub load: LoadConfig,
}

/// Connection parameters for the source/destination database.
#[derive(Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Full connection URL; takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<String>,
}

/// Options for the load stage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadConfig {
    /// Emit the historical trailing comma after the last column of the
    /// destination DDL. Strict engines reject it, so the load always stops
    /// at table creation.
    #[serde(default)]
    pub legacy_trailing_comma: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            url: None,
        }
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .finish()
    }
}

impl DbConfig {
    /// MySQL connect options built from the individual fields.
    pub fn mysql_options(&self) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(&self.host)
            .username(&self.user)
            .database(&self.database);
        if !self.password.is_empty() {
            opts = opts.password(&self.password);
        }
        if let Some(port) = self.port {
            opts = opts.port(port);
        }
        opts
    }

    /// Human readable target, without credentials.
    pub fn target(&self) -> String {
        match &self.url {
            Some(url) if url.starts_with("sqlite:") => url.clone(),
            Some(_) => "<url>".to_string(),
            None => format!(
                "{}:{}/{}",
                self.host,
                self.port.unwrap_or(3306),
                self.database
            ),
        }
    }
}

impl EtlConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> EtlResult<Self> {
        toml::from_str(content).map_err(|e| EtlError::Config(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> EtlResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve the configuration file to use.
    ///
    /// An explicit path wins; otherwise `./etl.toml`, then the per-user
    /// config directory. Returns `None` when no file exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = EtlConfig::from_toml(
            r#"
            [database]
            host = "db.internal"
            port = 3307
            user = "etl"
            password = "hunter2"
            database = "deportes_online"

            [load]
            legacy_trailing_comma = true
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, Some(3307));
        assert_eq!(config.database.database, "deportes_online");
        assert!(config.load.legacy_trailing_comma);
        assert_eq!(config.database.target(), "db.internal:3307/deportes_online");
    }

    #[test]
    fn test_defaults() {
        let config = EtlConfig::from_toml("[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        assert_eq!(config.database.host, "localhost");
        assert!(!config.load.legacy_trailing_comma);
        assert_eq!(config.database.target(), "sqlite::memory:");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = DbConfig {
            password: "hunter2".into(),
            ..DbConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = EtlConfig::from_toml("[database\nhost=").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_from_file_and_locate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\nuser = \"root\"").unwrap();

        let path = EtlConfig::locate(Some(file.path())).unwrap();
        let config = EtlConfig::from_file(&path).unwrap();
        assert_eq!(config.database.user, "root");
    }
}
