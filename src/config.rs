use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;
const DEFAULT_ORDER_TAX_RATE: f64 = 0.18;
const DEFAULT_SESSION_COOKIE_MAX_AGE_DAYS: i64 = 7;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (webhook dedup, health probe)
    pub redis_url: String,

    /// JWT secret key (minimum 64 characters outside development)
    #[validate(custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Refresh token expiration in seconds
    pub refresh_token_expiration: usize,

    /// JWT issuer claim
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience claim
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Razorpay key id (public half of the API credential pair)
    pub razorpay_key_id: String,

    /// Razorpay key secret. Never logged, never serialized into responses.
    pub razorpay_key_secret: String,

    /// Razorpay REST base URL (overridable for tests)
    #[serde(default = "default_razorpay_api_base")]
    pub razorpay_api_base: String,

    /// Outbound payment-gateway request timeout (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub payment_gateway_timeout_secs: u64,

    /// Shared secret for verifying gateway webhook signatures
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Tax surcharge applied when opening a payment intent (0.18 = 18%)
    #[serde(default = "default_order_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub order_tax_rate: f64,

    /// Administrative address copied on order-cancellation notices
    #[serde(default = "default_admin_email")]
    pub notify_admin_email: String,

    /// Sender address for outbound notices
    #[serde(default = "default_from_email")]
    pub notify_from_email: String,

    /// Optional webhook URL the notification dispatcher POSTs notices to
    #[serde(default)]
    pub notify_webhook_url: Option<String>,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Cookie domain for the session/role cookies (host-only when unset)
    #[serde(default)]
    pub session_cookie_domain: Option<String>,

    /// Mark session cookies Secure (disable only for local HTTP development)
    #[serde(default = "default_true_bool")]
    pub session_cookie_secure: bool,

    /// Session/role cookie lifetime in days
    #[serde(default = "default_session_cookie_max_age_days")]
    pub session_cookie_max_age_days: i64,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() {
            if self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
                let mut err = ValidationError::new("jwt_secret_default_dev");
                err.message = Some(
                    "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                        .into(),
                );
                errors.add("jwt_secret", err);
            }
            if self.jwt_secret.len() < 64 {
                let mut err = ValidationError::new("jwt_secret_length");
                err.message =
                    Some("JWT secret must be at least 64 characters outside development".into());
                errors.add("jwt_secret", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_connect_timeout_secs() -> u64 {
    10
}

fn default_auth_issuer() -> String {
    "consulting-auth".to_string()
}

fn default_auth_audience() -> String {
    "consulting-api".to_string()
}

fn default_razorpay_api_base() -> String {
    DEFAULT_RAZORPAY_API_BASE.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_order_tax_rate() -> f64 {
    DEFAULT_ORDER_TAX_RATE
}

fn default_admin_email() -> String {
    "ops@consulting.example".to_string()
}

fn default_from_email() -> String {
    "no-reply@consulting.example".to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_true_bool() -> bool {
    true
}

fn default_session_cookie_max_age_days() -> i64 {
    DEFAULT_SESSION_COOKIE_MAX_AGE_DAYS
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.trim().is_empty() {
        let mut err = ValidationError::new("jwt_secret_empty");
        err.message = Some("JWT secret must not be empty".into());
        return Err(err);
    }

    let unique_chars = secret
        .chars()
        .collect::<std::collections::HashSet<_>>()
        .len();
    if unique_chars < 10 {
        let mut err = ValidationError::new("jwt_secret_entropy");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 || rate > 1.0 {
        let mut err = ValidationError::new("order_tax_rate");
        err.message = Some("order_tax_rate must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("consulting_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret and the Razorpay credentials have no defaults - they MUST be
    // provided via environment variable or config file.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://consulting.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("jwt_expiration", 3600)?
        .set_default("refresh_token_expiration", 604800)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    for key in ["razorpay_key_id", "razorpay_key_secret"] {
        if config.get_string(key).is_err() {
            error!(
                "Payment gateway credential '{}' is not configured. Set APP__{}.",
                key,
                key.to_uppercase()
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured",
                key
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            jwt_secret: DEV_DEFAULT_JWT_SECRET.into(),
            jwt_expiration: 3600,
            refresh_token_expiration: 604_800,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "production".into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            razorpay_key_id: "rzp_test_key".into(),
            razorpay_key_secret: "rzp_test_secret".into(),
            razorpay_api_base: default_razorpay_api_base(),
            payment_gateway_timeout_secs: default_gateway_timeout_secs(),
            payment_webhook_secret: None,
            order_tax_rate: default_order_tax_rate(),
            notify_admin_email: default_admin_email(),
            notify_from_email: default_from_email(),
            notify_webhook_url: None,
            event_channel_capacity: default_event_channel_capacity(),
            session_cookie_domain: None,
            session_cookie_secure: true,
            session_cookie_max_age_days: default_session_cookie_max_age_days(),
        }
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_rejects_bundled_dev_secret() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        let err = cfg.validate_additional_constraints().unwrap_err();
        assert!(err.field_errors().contains_key("jwt_secret"));
    }

    #[test]
    fn non_dev_with_origins_and_strong_secret_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        cfg.jwt_secret = format!("{}{}", "a".repeat(32), "bcdefghij0123456789ABCDEFGHIJKLMNOP");
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn tax_rate_bounds() {
        assert!(validate_tax_rate(0.18).is_ok());
        assert!(validate_tax_rate(0.0).is_ok());
        assert!(validate_tax_rate(1.5).is_err());
        assert!(validate_tax_rate(f64::NAN).is_err());
    }
}
