/// Configuration management for Plaza
use crate::error::{PlazaError, PlazaResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub media: MediaConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub environment: Environment,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
}

/// Database and pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: i64,
    pub bcrypt_cost: u32,
}

/// Media storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub directory: PathBuf,
    /// Base URL prepended to stored media paths
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub token_sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PlazaResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PLAZA_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PLAZA_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| PlazaError::invalid("PLAZA_PORT", "Invalid port number"))?;

        let environment = match env::var("PLAZA_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let cors_origins = env::var("PLAZA_CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let data_directory: PathBuf = env::var("PLAZA_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_path = env::var("PLAZA_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("plaza.sqlite"));

        let access_token_secret = env::var("PLAZA_ACCESS_TOKEN_SECRET")
            .map_err(|_| PlazaError::invalid("PLAZA_ACCESS_TOKEN_SECRET", "Access token secret required"))?;
        let refresh_token_secret = env::var("PLAZA_REFRESH_TOKEN_SECRET")
            .map_err(|_| PlazaError::invalid("PLAZA_REFRESH_TOKEN_SECRET", "Refresh token secret required"))?;

        let media_directory = env::var("PLAZA_MEDIA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("media"));
        let public_base_url = env::var("PLAZA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("PLAZA_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                environment,
                cors_origins,
            },
            database: DatabaseConfig {
                path: database_path,
                max_connections: env_or("PLAZA_DB_MAX_CONNECTIONS", 10),
                acquire_timeout_secs: env_or("PLAZA_DB_ACQUIRE_TIMEOUT", 5),
                idle_timeout_secs: env_or("PLAZA_DB_IDLE_TIMEOUT", 300),
                max_lifetime_secs: env_or("PLAZA_DB_MAX_LIFETIME", 1800),
            },
            authentication: AuthConfig {
                access_token_secret,
                refresh_token_secret,
                access_token_ttl: env_or("PLAZA_ACCESS_TOKEN_TTL", 15 * 60),
                refresh_token_ttl: env_or("PLAZA_REFRESH_TOKEN_TTL", 7 * 24 * 3600),
                bcrypt_cost: env_or("PLAZA_BCRYPT_COST", bcrypt::DEFAULT_COST),
            },
            media: MediaConfig {
                directory: media_directory,
                public_base_url,
                max_upload_bytes: env_or("PLAZA_MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            },
            jobs: JobsConfig {
                token_sweep_interval_secs: env_or("PLAZA_TOKEN_SWEEP_INTERVAL", 3600),
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PlazaResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PlazaError::invalid("PLAZA_HOSTNAME", "Hostname cannot be empty"));
        }

        let auth = &self.authentication;
        if auth.access_token_secret.len() < 32 {
            return Err(PlazaError::invalid(
                "PLAZA_ACCESS_TOKEN_SECRET",
                "Access token secret must be at least 32 characters",
            ));
        }
        if auth.refresh_token_secret.len() < 32 {
            return Err(PlazaError::invalid(
                "PLAZA_REFRESH_TOKEN_SECRET",
                "Refresh token secret must be at least 32 characters",
            ));
        }
        if auth.access_token_secret == auth.refresh_token_secret {
            return Err(PlazaError::invalid(
                "PLAZA_REFRESH_TOKEN_SECRET",
                "Access and refresh secrets must differ",
            ));
        }
        if auth.access_token_ttl <= 0 || auth.refresh_token_ttl <= auth.access_token_ttl {
            return Err(PlazaError::invalid(
                "PLAZA_REFRESH_TOKEN_TTL",
                "Refresh lifetime must exceed a positive access lifetime",
            ));
        }

        if self.jobs.token_sweep_interval_secs == 0 {
            return Err(PlazaError::invalid(
                "PLAZA_TOKEN_SWEEP_INTERVAL",
                "Sweep interval must be positive",
            ));
        }

        Ok(())
    }

    /// Configuration used by unit and integration tests
    pub fn for_tests(media_directory: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 5000,
                environment: Environment::Development,
                cors_origins: vec![],
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
                acquire_timeout_secs: 5,
                idle_timeout_secs: 60,
                max_lifetime_secs: 600,
            },
            authentication: AuthConfig {
                access_token_secret: "test-access-secret-key-for-testing-only".to_string(),
                refresh_token_secret: "test-refresh-secret-key-for-testing-only".to_string(),
                access_token_ttl: 900,
                refresh_token_ttl: 7 * 24 * 3600,
                bcrypt_cost: 4,
            },
            media: MediaConfig {
                directory: media_directory,
                public_base_url: "http://localhost:5000".to_string(),
                max_upload_bytes: 1024 * 1024,
            },
            jobs: JobsConfig {
                token_sweep_interval_secs: 3600,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_for_tests_is_valid() {
        let config = ServerConfig::for_tests(PathBuf::from("/tmp/media"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = ServerConfig::for_tests(PathBuf::from("/tmp/media"));
        config.authentication.access_token_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_secret_rejected() {
        let mut config = ServerConfig::for_tests(PathBuf::from("/tmp/media"));
        config.authentication.refresh_token_secret = config.authentication.access_token_secret.clone();
        assert!(config.validate().is_err());
    }
}
