//! Configuration manager for ponto.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening port.
    pub port: u16,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Where clock photos are written.
    pub uploads: Uploads,
    /// Allowed browser origins.
    pub cors: Cors,
    /// OpenTelemetry exporter.
    #[serde(skip_serializing)]
    pub telemetry: Telemetry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            token: None,
            argon2: None,
            uploads: Uploads::default(),
            cors: Cors::default(),
            telemetry: Telemetry::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
    /// Seconds before a single store operation is abandoned.
    pub timeout: Option<u64>,
}

impl Postgres {
    /// Deadline applied to ledger and directory operations.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout
                .unwrap_or(crate::database::DEFAULT_TIMEOUT_SECS),
        )
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 19, // 19 MiB.
            iterations: 2,
            parallelism: 1,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    /// HMAC secret used to sign HS256 tokens.
    pub secret: String,
    /// Token lifetime in seconds.
    /// Default is 24 hours.
    pub expiration: Option<u64>,
}

/// Photo storage configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Uploads {
    /// Root directory of stored files.
    pub directory: PathBuf,
    /// Maximum accepted request body, in bytes.
    pub max_size: usize,
}

impl Default for Uploads {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("uploads"),
            max_size: 10 << 20, // 10 MiB.
        }
    }
}

/// CORS configuration. Empty list allows any origin without credentials.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

/// OpenTelemetry configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// gRPC endpoint of an OTLP collector.
    pub otlp_endpoint: Option<String>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(mut config) => {
                    config.version = VERSION.to_owned();
                    config.path = file_path;
                    config
                },
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        Arc::new(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Override values from environment variables.
    ///
    /// `lookup` is injected so overrides can be tested without touching the
    /// process environment.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }

        let host = lookup("DB_HOST");
        if host.is_some() || self.postgres.is_none() {
            let mut postgres = self.postgres.take().unwrap_or_default();
            if let Some(host) = host {
                postgres.address = match lookup("DB_PORT") {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                };
            }
            if !postgres.address.is_empty() {
                self.postgres = Some(postgres);
            }
        }
        if let Some(postgres) = self.postgres.as_mut() {
            if let Some(name) = lookup("DB_NAME") {
                postgres.database = Some(name);
            }
            if let Some(user) = lookup("DB_USER") {
                postgres.username = Some(user);
            }
            if let Some(password) = lookup("DB_PASS") {
                postgres.password = Some(password);
            }
        }

        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            match self.token.as_mut() {
                Some(token) => token.secret = secret,
                None => {
                    self.token = Some(Token {
                        secret,
                        expiration: None,
                    })
                },
            }
        }

        if let Some(dir) = lookup("UPLOADS_DIR") {
            self.uploads.directory = PathBuf::from(dir);
        }

        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(endpoint);
        }

        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.uploads.directory, PathBuf::from("uploads"));
        assert_eq!(config.uploads.max_size, 10 * 1024 * 1024);
        assert!(config.cors.allowed_origins.is_empty());
        assert!(config.postgres.is_none());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
name: ponto-dev
port: 3000
postgres:
  address: localhost:5432
  database: ponto
  timeout: 7
token:
  secret: s3cr3t
cors:
  allowed_origins: ["http://localhost:3000"]
"#;
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "ponto-dev");
        assert_eq!(config.port, 3000);
        let postgres = config.postgres.unwrap();
        assert_eq!(postgres.database.as_deref(), Some("ponto"));
        assert_eq!(postgres.operation_timeout(), Duration::from_secs(7));
        assert_eq!(config.token.unwrap().secret, "s3cr3t");
        assert_eq!(config.cors.allowed_origins.len(), 1);
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("PORT", "9000"),
            ("DB_HOST", "db"),
            ("DB_PORT", "5433"),
            ("DB_NAME", "attendance"),
            ("DB_USER", "ponto"),
            ("DB_PASS", "pass"),
            ("JWT_SECRET", "from-env"),
        ]);
        let config = Configuration::default()
            .with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 9000);
        let postgres = config.postgres.unwrap();
        assert_eq!(postgres.address, "db:5433");
        assert_eq!(postgres.database.as_deref(), Some("attendance"));
        assert_eq!(postgres.username.as_deref(), Some("ponto"));
        assert_eq!(postgres.password.as_deref(), Some("pass"));
        assert_eq!(config.token.unwrap().secret, "from-env");
    }

    #[test]
    fn test_env_without_database_keeps_none() {
        let config = Configuration::default().with_env(|_| None);
        assert!(config.postgres.is_none());
        assert!(config.token.is_none());
    }
}
