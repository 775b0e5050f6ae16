//! Configuration loading and validation for the companion service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use serde::Deserialize;

use crate::geo::RadiusBounds;
use crate::server::middleware::AuthThrottle;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP collector endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Base64-encoded 32-byte field-encryption key. Missing or invalid means
    /// profile fields are stored as plaintext.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// HMAC secret for session tokens. **Required.**
    pub session_secret: String,

    /// Session token lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// One-time code lifetime in seconds.
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,

    /// How often (seconds) expired one-time codes are purged.
    #[serde(default = "default_otp_purge_interval")]
    pub otp_purge_interval_secs: u64,

    /// Wrong guesses a pending code survives before it is discarded.
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: u32,

    /// Requests per minute accepted by `/api/auth/*`, across all callers.
    #[serde(default = "default_auth_rate_limit")]
    pub auth_rate_limit_per_minute: u64,

    /// Return issued codes in the response body. Development only.
    #[serde(default)]
    pub otp_echo_code: bool,

    /// Path of the hospital/NGO seed file (YAML or JSON).
    #[serde(default = "default_directory_path")]
    pub directory_path: String,

    /// Directory holding the persisted record files (profiles, appointments,
    /// metrics, submitted NGOs).
    #[serde(default = "default_records_dir")]
    pub records_dir: String,

    /// How often (seconds) to reload the directory seed file.
    #[serde(default = "default_directory_refresh_interval")]
    pub directory_refresh_interval_secs: u64,

    /// Smallest accepted search radius in kilometres.
    #[serde(default = "default_min_radius")]
    pub min_search_radius_km: f64,

    /// Largest accepted search radius in kilometres.
    #[serde(default = "default_max_radius")]
    pub max_search_radius_km: f64,

    /// The single origin allowed by CORS; also used to build profile links.
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
}

fn default_port() -> u16 {
    8081
}
fn default_log_level() -> String {
    "info".into()
}
fn default_session_ttl() -> u64 {
    3600
}
fn default_otp_ttl() -> u64 {
    300
}
fn default_otp_purge_interval() -> u64 {
    60
}
fn default_otp_max_attempts() -> u32 {
    5
}
fn default_auth_rate_limit() -> u64 {
    20
}
fn default_records_dir() -> String {
    "data/records".into()
}
fn default_directory_path() -> String {
    "data/directory.yaml".into()
}
fn default_directory_refresh_interval() -> u64 {
    300
}
fn default_min_radius() -> f64 {
    0.1
}
fn default_max_radius() -> f64 {
    100.0
}
fn default_frontend_origin() -> String {
    "http://localhost:5173".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.session_secret, "SESSION_SECRET")?;
        ensure_non_empty(&self.directory_path, "DIRECTORY_PATH")?;
        ensure_non_empty(&self.records_dir, "RECORDS_DIR")?;

        if self.session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be > 0");
        }
        if self.otp_ttl_secs == 0 {
            anyhow::bail!("OTP_TTL_SECS must be > 0");
        }
        if self.otp_purge_interval_secs == 0 {
            anyhow::bail!("OTP_PURGE_INTERVAL_SECS must be > 0");
        }
        if self.otp_max_attempts == 0 {
            anyhow::bail!("OTP_MAX_ATTEMPTS must be > 0");
        }
        if self.auth_rate_limit_per_minute == 0 {
            anyhow::bail!("AUTH_RATE_LIMIT_PER_MINUTE must be > 0");
        }
        if self.directory_refresh_interval_secs == 0 {
            anyhow::bail!("DIRECTORY_REFRESH_INTERVAL_SECS must be > 0");
        }
        if !(self.min_search_radius_km.is_finite() && self.min_search_radius_km > 0.0) {
            anyhow::bail!("MIN_SEARCH_RADIUS_KM must be a positive number");
        }
        if !(self.max_search_radius_km.is_finite()
            && self.max_search_radius_km >= self.min_search_radius_km)
        {
            anyhow::bail!("MAX_SEARCH_RADIUS_KM must be >= MIN_SEARCH_RADIUS_KM");
        }
        HeaderValue::from_str(&self.frontend_origin)
            .context("FRONTEND_ORIGIN must be a valid header value")?;
        Ok(())
    }

    pub fn radius_bounds(&self) -> RadiusBounds {
        RadiusBounds {
            min_km: self.min_search_radius_km,
            max_km: self.max_search_radius_km,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_secs)
    }

    pub fn otp_purge_interval(&self) -> Duration {
        Duration::from_secs(self.otp_purge_interval_secs)
    }

    pub fn directory_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.directory_refresh_interval_secs)
    }

    pub fn auth_throttle(&self) -> AuthThrottle {
        AuthThrottle::per_minute(self.auth_rate_limit_per_minute)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets are reported by presence only.
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("encryption_key_set", &self.encryption_key.is_some())
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("otp_ttl_secs", &self.otp_ttl_secs)
            .field("otp_max_attempts", &self.otp_max_attempts)
            .field("auth_rate_limit_per_minute", &self.auth_rate_limit_per_minute)
            .field("otp_echo_code", &self.otp_echo_code)
            .field("directory_path", &self.directory_path)
            .field("records_dir", &self.records_dir)
            .field("min_search_radius_km", &self.min_search_radius_km)
            .field("max_search_radius_km", &self.max_search_radius_km)
            .field("frontend_origin", &self.frontend_origin)
            .finish_non_exhaustive()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
