//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides.
//! The file path defaults to `config.yaml` and can be set via `-f` or
//! `LAWLINK_CONFIG`. Environment variables prefixed with `LAWLINK_` override
//! file values; nested fields use double underscores
//! (`LAWLINK_AUTH__NATIVE__ENABLED=false`). `DATABASE_URL` is honoured as a
//! special case and overrides `database.url`.

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LAWLINK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where the frontend is reachable. Used for password reset
    /// links and payment redirect URLs.
    pub public_url: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Email address for the initial admin user (created on first startup)
    pub admin_email: String,
    /// Password for the initial admin user (optional, can be set via environment)
    pub admin_password: Option<String>,
    /// Secret key for JWT signing (required for production)
    pub secret_key: Option<String>,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Email delivery configuration
    pub email: EmailConfig,
    /// Payment provider configuration (Razorpay or the simulated gateway)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentConfig>,
    /// Booking rules
    pub bookings: BookingConfig,
    /// Document upload rules
    pub documents: DocumentConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: "http://localhost:3000".to_string(),
            database: DatabaseConfig::default(),
            admin_email: "admin@localhost".to_string(),
            admin_password: None,
            secret_key: None,
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            payment: None,
            bookings: BookingConfig::default(),
            documents: DocumentConfig::default(),
            enable_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/lawlink".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Native (email + password) authentication
    pub native: NativeAuthConfig,
    /// Session and CORS settings
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeAuthConfig {
    /// Whether email/password login is enabled
    pub enabled: bool,
    /// Whether self-service registration is open
    pub allow_registration: bool,
    /// Password length bounds
    pub password: PasswordConfig,
    /// Session cookie name
    pub session: SessionConfig,
    /// Password reset token lifetime
    #[serde(with = "humantime_serde")]
    pub password_reset_expiry: Duration,
}

impl Default for NativeAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_registration: true,
            password: PasswordConfig::default(),
            session: SessionConfig::default(),
            password_reset_expiry: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "lawlink_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// JWT session lifetime
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(24 * 60 * 60),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; "*" allows any origin
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    pub transport: EmailTransportConfig,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::File {
                path: "./emails".to_string(),
            },
            from_email: "noreply@localhost".to_string(),
            from_name: "LawLink".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// SMTP relay
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        use_tls: bool,
    },
    /// Write emails to files; for development and tests
    File { path: String },
}

/// Payment provider selection.
///
/// Set Razorpay credentials via:
/// - `LAWLINK_PAYMENT__RAZORPAY__KEY_ID`
/// - `LAWLINK_PAYMENT__RAZORPAY__KEY_SECRET`
/// - `LAWLINK_PAYMENT__RAZORPAY__WEBHOOK_SECRET`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    /// Razorpay payment processing
    Razorpay(RazorpayConfig),
    /// Simulated gateway that treats every checkout as paid
    Dummy(DummyConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RazorpayConfig {
    /// API key id (starts with rzp_)
    pub key_id: String,
    /// API key secret
    pub key_secret: String,
    /// Webhook signing secret configured in the Razorpay dashboard
    pub webhook_secret: String,
    /// API base URL; overridden in tests
    #[serde(default = "default_razorpay_base_url")]
    pub base_url: String,
}

fn default_razorpay_base_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyConfig {}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookingConfig {
    /// Shortest bookable consultation
    pub min_duration_minutes: i32,
    /// Longest bookable consultation
    pub max_duration_minutes: i32,
    /// Currency bookings are priced in
    pub currency: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_minutes: 240,
            currency: "INR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// Maximum upload size in bytes
    pub max_file_size: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from the YAML file and environment
    pub fn load(args: &Args) -> Result<Self, Error> {
        let mut figment = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("LAWLINK_").split("__"));

        // DATABASE_URL is the conventional escape hatch
        if let Ok(url) = std::env::var("DATABASE_URL") {
            figment = figment.merge(("database.url", url));
        }

        let config: Config = figment.extract().map_err(|e| Error::Internal {
            operation: format!("load configuration: {e}"),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_some_and(|k| k.len() < 16) {
            return Err(Error::Internal {
                operation: "validate configuration: secret_key must be at least 16 characters".to_string(),
            });
        }
        if self.bookings.min_duration_minutes <= 0
            || self.bookings.max_duration_minutes < self.bookings.min_duration_minutes
        {
            return Err(Error::Internal {
                operation: "validate configuration: invalid booking duration bounds".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
