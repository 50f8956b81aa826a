//! API configuration loaded from a dotenv file and the process environment.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DB_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET_KEY` - Signing secret for access and refresh tokens
//! - `JWT_ADMIN_KEY` - Signing secret for admin tokens
//! - `JWT_API_KEY` - Signing secret for API keys
//! - `APP_STORAGE_BUCKET` - Object-storage bucket name
//!
//! ## Optional
//! - `APP_NAME` / `APP_VERSION` - Reported by the monitor endpoint
//! - `APP_HOST` - Bind address (default: 127.0.0.1)
//! - `APP_PORT` - Listen port (default: 3000)
//! - `APP_BASE_URL` - Public URL used for stored object links
//! - `APP_BODY_LIMIT` - Max request body in bytes (default: 10 MiB)
//! - `APP_FILE_LIMIT` - Max uploaded file size in bytes (default: 2 MiB)
//! - `APP_READ_TIMEOUT` / `APP_WRITE_TIMEOUT` - Seconds (default: 60)
//! - `APP_STORAGE_DIR` - Filesystem root for object storage
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 25)
//! - `JWT_ACCESS_EXPIRES` / `JWT_REFRESH_EXPIRES` / `JWT_API_KEY_EXPIRES` - Seconds
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;
const DEFAULT_FILE_LIMIT: usize = 2 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Full API configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP server and storage settings
    pub app: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Token secrets and lifetimes
    pub jwt: JwtConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, no trailing slash
    pub base_url: String,
    /// Max request body in bytes
    pub body_limit: usize,
    /// Max size of one uploaded file in bytes
    pub file_limit: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub storage_dir: PathBuf,
    pub storage_bucket: String,
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub url: SecretString,
    pub max_connections: u32,
}

/// Token secrets and lifetimes.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret for access and refresh tokens
    pub secret_key: SecretString,
    /// Secret for admin tokens
    pub admin_key: SecretString,
    /// Secret for API keys
    pub api_key: SecretString,
    /// Access token lifetime in seconds
    pub access_expires: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires: i64,
    /// API key lifetime in seconds
    pub api_key_expires: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret_key", &"[REDACTED]")
            .field("admin_key", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .field("access_expires", &self.access_expires)
            .field("refresh_expires", &self.refresh_expires)
            .field("api_key_expires", &self.api_key_expires)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a dotenv file, then the process environment.
    ///
    /// A missing dotenv file is not an error; variables already present in
    /// the environment take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (length, placeholder detection, entropy).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::from_path(path) {
            tracing::debug!(path = %path.display(), error = %e, "dotenv file not loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app = ServerConfig::from_lookup(&get)?;
        let database = DatabaseConfig::from_lookup(&get)?;
        let jwt = JwtConfig::from_lookup(&get)?;

        Ok(Self {
            app,
            database,
            jwt,
            sentry_dsn: get("SENTRY_DSN").filter(|v| !v.is_empty()),
            sentry_environment: get("SENTRY_ENVIRONMENT").filter(|v| !v.is_empty()),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.app.host, self.app.port)
    }

    /// The deadline applied to a whole request: the tighter of the two timeouts.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.app.read_timeout.min(self.app.write_timeout)
    }
}

impl ServerConfig {
    fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parse_or_default(get, "APP_HOST", "127.0.0.1".parse().ok())?;
        let port: u16 = parse_or_default(get, "APP_PORT", Some(3000))?;

        let base_url = match get("APP_BASE_URL") {
            Some(raw) => {
                url::Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("APP_BASE_URL".to_owned(), e.to_string())
                })?;
                raw.trim_end_matches('/').to_owned()
            }
            None => format!("http://{host}:{port}"),
        };

        let read_secs: u64 = parse_or_default(get, "APP_READ_TIMEOUT", Some(60))?;
        let write_secs: u64 = parse_or_default(get, "APP_WRITE_TIMEOUT", Some(60))?;

        Ok(Self {
            name: get_or_default(get, "APP_NAME", "ri-shop"),
            version: get_or_default(get, "APP_VERSION", env!("CARGO_PKG_VERSION")),
            host,
            port,
            base_url,
            body_limit: parse_or_default(get, "APP_BODY_LIMIT", Some(DEFAULT_BODY_LIMIT))?,
            file_limit: parse_or_default(get, "APP_FILE_LIMIT", Some(DEFAULT_FILE_LIMIT))?,
            read_timeout: Duration::from_secs(read_secs),
            write_timeout: Duration::from_secs(write_secs),
            storage_dir: PathBuf::from(get_or_default(get, "APP_STORAGE_DIR", "./assets/storage")),
            storage_bucket: get_required(get, "APP_STORAGE_BUCKET")?,
        })
    }
}

impl DatabaseConfig {
    fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // DATABASE_URL is what `sqlx` tooling and most hosts set
        let url = get("DB_URL")
            .or_else(|| get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DB_URL".to_owned()))?;

        Ok(Self {
            url,
            max_connections: parse_or_default(get, "DB_MAX_CONNECTIONS", Some(25))?,
        })
    }
}

impl JwtConfig {
    fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            secret_key: get_validated_secret(get, "JWT_SECRET_KEY")?,
            admin_key: get_validated_secret(get, "JWT_ADMIN_KEY")?,
            api_key: get_validated_secret(get, "JWT_API_KEY")?,
            access_expires: parse_or_default(get, "JWT_ACCESS_EXPIRES", Some(86_400))?,
            refresh_expires: parse_or_default(get, "JWT_REFRESH_EXPIRES", Some(604_800))?,
            api_key_expires: parse_or_default(get, "JWT_API_KEY_EXPIRES", Some(63_072_000))?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required<F>(get: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get a variable with a default value.
fn get_or_default<F>(get: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get(key).unwrap_or_else(|| default.to_owned())
}

/// Parse a variable, falling back to `default` when unset.
fn parse_or_default<F, T>(get: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned())),
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a signing secret.
fn get_validated_secret<F>(get: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required(get, key)?;
    validate_secret_strength(&value, key)?;
    let secret = SecretString::from(value);
    validate_secret_length(&secret, key)?;
    Ok(secret)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET_A: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6d";
    const SECRET_B: &str = "Zq8%Lw2!Hs6@Kd4#Vb7&Pn1*Ty5^Mc3e";
    const SECRET_C: &str = "Gf4!Rj8@Wm2#Xk6$Ns0%Ud3&Yh7*Ep1q";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DB_URL", "postgres://rishop:pw@localhost/rishop".to_owned()),
            ("JWT_SECRET_KEY", SECRET_A.to_owned()),
            ("JWT_ADMIN_KEY", SECRET_B.to_owned()),
            ("JWT_API_KEY", SECRET_C.to_owned()),
            ("APP_STORAGE_BUCKET", "rishop-dev-bucket".to_owned()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.app.name, "ri-shop");
        assert_eq!(config.app.port, 3000);
        assert_eq!(config.app.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.app.body_limit, DEFAULT_BODY_LIMIT);
        assert_eq!(config.database.max_connections, 25);
        assert_eq!(config.jwt.access_expires, 86_400);
        assert_eq!(config.jwt.refresh_expires, 604_800);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_database_url_fallback() {
        let mut env = base_env();
        env.remove("DB_URL");
        env.insert("DATABASE_URL", "postgres://fallback/db".to_owned());

        let config = load(&env).unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://fallback/db");
    }

    #[test]
    fn test_missing_bucket() {
        let mut env = base_env();
        env.remove("APP_STORAGE_BUCKET");

        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "APP_STORAGE_BUCKET"));
    }

    #[test]
    fn test_invalid_port() {
        let mut env = base_env();
        env.insert("APP_PORT", "not-a-port".to_owned());

        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "APP_PORT"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut env = base_env();
        env.insert("APP_BASE_URL", "https://shop.example.dev/".to_owned());

        let config = load(&env).unwrap();
        assert_eq!(config.app.base_url, "https://shop.example.dev");
    }

    #[test]
    fn test_request_timeout_is_tighter_bound() {
        let mut env = base_env();
        env.insert("APP_READ_TIMEOUT", "30".to_owned());
        env.insert("APP_WRITE_TIMEOUT", "45".to_owned());

        let config = load(&env).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut env = base_env();
        env.insert("JWT_ADMIN_KEY", "aB3$xY9!mK2@".to_owned());

        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(key, _) if key == "JWT_ADMIN_KEY"));
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_jwt_config_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let debug_output = format!("{:?}", config.jwt);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(SECRET_A));
        assert!(!debug_output.contains(SECRET_C));
    }
}
