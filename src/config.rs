//! `config.toml` loading.
//!
//! Every section and key is optional. Missing values fall back to the
//! defaults below, and a handful of `FILEVAULT_*` environment variables
//! override whatever the file says.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::{Result, VaultError};

const MIB: u64 = 1024 * 1024;

/// `[server]`: listener, CORS and token settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// HMAC key for access tokens. Required.
    pub jwt_secret: String,
    pub jwt_access_token_expiry_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: Vec::new(),
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: 24 * 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Socket address built from `host` and `port`.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| VaultError::Config(format!("invalid server address: {e}")))
    }
}

/// Which entity store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    /// Process memory; everything is lost on restart.
    Memory,
}

/// `[database]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// SQLite file, ignored by the memory backend.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            path: "data/filevault.db".into(),
        }
    }
}

/// `[files]`: blob directory and size limits, in MiB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub storage_path: String,
    pub max_upload_size_mb: u64,
    /// Quota handed to each new account.
    pub default_storage_limit_mb: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: "data/files".into(),
            max_upload_size_mb: 2 * 1024,
            default_storage_limit_mb: 10 * 1024,
        }
    }
}

impl FilesConfig {
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(MIB)
    }

    pub fn default_storage_limit_bytes(&self) -> i64 {
        i64::try_from(self.default_storage_limit_mb.saturating_mul(MIB)).unwrap_or(i64::MAX)
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Append-mode log file. Unset logs to the console only.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: Some("logs/filevault.log".into()),
        }
    }
}

/// The whole `config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
}

/// Environment variables consulted by [`Config::apply_env_overrides`].
const ENV_OVERRIDES: &[(&str, fn(&mut Config, String))] = &[
    ("FILEVAULT_JWT_SECRET", |c, v| c.server.jwt_secret = v),
    ("FILEVAULT_HOST", |c, v| c.server.host = v),
    ("FILEVAULT_DATABASE_PATH", |c, v| c.database.path = v),
    ("FILEVAULT_STORAGE_PATH", |c, v| c.files.storage_path = v),
    ("FILEVAULT_LOG_LEVEL", |c, v| c.logging.level = v),
];

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// [`Config::load`] followed by [`Config::apply_env_overrides`].
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Overwrite settings from `FILEVAULT_*` variables. Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        for (name, apply) in ENV_OVERRIDES {
            match std::env::var(name) {
                Ok(value) if !value.is_empty() => apply(self, value),
                _ => {}
            }
        }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.server.jwt_secret.is_empty() {
            "jwt_secret is not set; set it in config.toml or FILEVAULT_JWT_SECRET"
        } else if self.files.max_upload_size_mb == 0 {
            "files.max_upload_size_mb must be greater than zero"
        } else if self.server.jwt_access_token_expiry_secs == 0 {
            "server.jwt_access_token_expiry_secs must be greater than zero"
        } else {
            return Ok(());
        };
        Err(VaultError::Config(problem.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> Config {
        let mut config = Config::default();
        config.server.jwt_secret = "secret".into();
        config
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.jwt_access_token_expiry_secs, 86400);
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.path, "data/filevault.db");
        assert_eq!(config.files.max_upload_size_bytes(), 2 * 1024 * MIB);
        assert_eq!(
            config.files.default_storage_limit_bytes(),
            10 * 1024 * 1024 * 1024
        );
        assert_eq!(config.logging.file.as_deref(), Some("logs/filevault.log"));
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::parse(
            r#"
[server]
host = "127.0.0.1"
port = 3000
cors_origins = ["http://localhost:5173"]
jwt_secret = "change-me"

[database]
backend = "memory"

[files]
storage_path = "/srv/blobs"
default_storage_limit_mb = 500

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.server.jwt_secret, "change-me");
        assert_eq!(
            config.server.bind_addr().unwrap(),
            "127.0.0.1:3000".parse().unwrap()
        );
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert_eq!(config.database.path, "data/filevault.db");
        assert_eq!(config.files.storage_path, "/srv/blobs");
        assert_eq!(config.files.max_upload_size_mb, 2048);
        assert_eq!(config.files.default_storage_limit_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_some());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["this is not valid toml [[[", "[database]\nbackend = \"postgres\"\n"] {
            match Config::parse(bad) {
                Err(VaultError::Config(msg)) => assert!(msg.contains("config parse error")),
                other => panic!("expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("does-not-exist.toml"),
            Err(VaultError::Io(_))
        ));
    }

    #[test]
    fn test_bad_bind_addr() {
        let mut config = Config::default();
        config.server.host = "not a host".into();
        assert!(matches!(
            config.server.bind_addr(),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_apply_env_overrides() {
        let saved: Vec<_> = ["FILEVAULT_JWT_SECRET", "FILEVAULT_STORAGE_PATH"]
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        std::env::set_var("FILEVAULT_JWT_SECRET", "env-secret-key");
        std::env::set_var("FILEVAULT_STORAGE_PATH", "");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.server.jwt_secret, "env-secret-key");
        assert_eq!(config.files.storage_path, "data/files");

        for (name, value) in saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_err());
        assert!(with_secret().validate().is_ok());

        let mut config = with_secret();
        config.files.max_upload_size_mb = 0;
        assert!(config.validate().is_err());

        let mut config = with_secret();
        config.server.jwt_access_token_expiry_secs = 0;
        assert!(config.validate().is_err());
    }
}
