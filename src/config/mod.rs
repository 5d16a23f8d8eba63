//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden with
//! `PHC_*` environment variables. Missing values fall back to defaults, so an
//! absent or empty file yields a runnable development configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session credential configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment environment; production turns on `Secure` cookies
    #[serde(default)]
    pub environment: Environment,
    /// CORS allowed origin (cookie auth needs an explicit origin)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Directory holding the rendered site pages
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            cors_origin: default_cors_origin(),
            public_dir: default_public_dir(),
        }
    }
}

impl ServerConfig {
    /// Whether cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/phc.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing credentials. Empty means an ephemeral
    /// secret is generated at startup.
    #[serde(default)]
    pub token_secret: String,
    /// Credential and cookie lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: i64,
    /// Bootstrap admin account, created on startup when both are set
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            session_ttl_seconds: default_session_ttl(),
            admin_email: None,
            admin_password: None,
        }
    }
}

fn default_session_ttl() -> i64 {
    30 * 60
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix the upload directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Ceiling for general and article images (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Ceiling for site logos (default: 2MB)
    #[serde(default = "default_max_logo_size")]
    pub max_logo_size: u64,
    /// Ceiling for hero banners (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_hero_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            max_logo_size: default_max_logo_size(),
            max_hero_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_logo_size() -> u64 {
    2 * 1024 * 1024 // 2MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    /// Largest ceiling across all upload kinds
    pub fn largest_ceiling(&self) -> u64 {
        self.max_file_size
            .max(self.max_logo_size)
            .max(self.max_hero_size)
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration; invalid
    /// YAML is an error carrying the location of the problem.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - PHC_SERVER_HOST, PHC_SERVER_PORT, PHC_ENV
    /// - PHC_DATABASE_DRIVER, PHC_DATABASE_URL
    /// - PHC_TOKEN_SECRET, PHC_SESSION_TTL_SECONDS
    /// - PHC_UPLOAD_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.session_ttl_seconds <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_ttl_seconds must be positive".to_string(),
            ));
        }
        if self.upload.allowed_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_types must not be empty".to_string(),
            ));
        }
        let prefix = self.upload.public_prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            return Err(ConfigError::ValidationError(
                "upload.public_prefix must be an absolute path below the site root".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PHC_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PHC_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(env) = std::env::var("PHC_ENV") {
            match env.to_lowercase().as_str() {
                "production" => self.server.environment = Environment::Production,
                "development" => self.server.environment = Environment::Development,
                _ => {} // Ignore invalid values
            }
        }

        if let Ok(driver) = std::env::var("PHC_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("PHC_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("PHC_TOKEN_SECRET") {
            self.auth.token_secret = secret;
        }
        if let Ok(ttl) = std::env::var("PHC_SESSION_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                if ttl > 0 {
                    self.auth.session_ttl_seconds = ttl;
                }
            }
        }

        if let Ok(path) = std::env::var("PHC_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches PHC_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Serialised configs parse back to the same values
        #[test]
        fn config_yaml_roundtrip(
            port in 1u16..=65535,
            ttl in 1i64..=86_400,
            production in any::<bool>(),
            logo in 1u64..=10_000_000,
        ) {
            let mut config = Config::default();
            config.server.port = port;
            config.auth.session_ttl_seconds = ttl;
            config.server.environment = if production { Environment::Production } else { Environment::Development };
            config.upload.max_logo_size = logo;

            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.server.port, port);
            prop_assert_eq!(parsed.auth.session_ttl_seconds, ttl);
            prop_assert_eq!(parsed.server.secure_cookies(), production);
            prop_assert_eq!(parsed.upload.max_logo_size, logo);
        }
    }
}
