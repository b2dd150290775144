//! Ordering configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for checkout
//! - `SNAP_MENU_BASE_URL` - Origin of the menu site (e.g., `https://menu.example.com`)
//! - `SNAP_MENU_RESTAURANT_SLUG` - Restaurant name slug used in menu URLs
//! - `SNAP_MENU_HASHED_SLUG` - Hashed restaurant slug used in menu URLs
//! - `SNAP_MENU_CSRF_TOKEN` - CSRF token issued with the menu page
//!
//! ## Optional
//! - `SNAP_MENU_RESTAURANT_LAT` / `SNAP_MENU_RESTAURANT_LON` - Restaurant position
//! - `SNAP_MENU_DINE_IN_THRESHOLD_M` - Dine-in radius in meters (default: 100)
//! - `SNAP_MENU_OVERRIDE_POLICY` - `sticky` or `until_next_fix` (default: sticky)
//! - `SNAP_MENU_SERVICE_FEE` - Service fee (default: 0.25)
//! - `SNAP_MENU_DELIVERY_FEE` - Delivery fee (default: 0.00)
//! - `SNAP_MENU_STORAGE_PATH` - Local store file (default: .snap-menu/storage.json)
//! - `SNAP_MENU_REDIRECT_FLOOR_MS` - Minimum checkout duration (default: 1500)
//! - `SNAP_MENU_VERIFY_DELAY_MS` - Simulated verification delay (default: 1000)
//! - `SNAP_MENU_ADMIN_DELAY_MS` - Simulated admin confirmation delay (default: 3000)
//! - `SNAP_MENU_ADMIN_TIMEOUT_MS` - Admin confirmation timeout (default: 60000)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use snap_menu_core::Coordinate;
use thiserror::Error;
use url::Url;

use crate::cart::FeeSchedule;
use crate::delivery::{DetectorSettings, OverridePolicy};
use crate::geo::LocateOptions;

const MIN_CSRF_TOKEN_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &["your-", "changeme", "replace", "placeholder", "xxx"];

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

/// Top-level ordering configuration.
#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Restaurant identity and position
    pub restaurant: RestaurantConfig,
    /// Delivery-mode detection settings
    pub detector: DetectorSettings,
    /// Geolocation request options
    pub locate: LocateOptions,
    /// Fixed fees added to the cart subtotal
    pub fees: FeeSchedule,
    /// Simulated verification and confirmation timings
    pub verification: VerificationConfig,
    /// Path of the file-backed local store
    pub storage_path: PathBuf,
    /// Checkout endpoint settings, present when `SNAP_MENU_BASE_URL` is set
    pub checkout: Option<CheckoutConfig>,
}

/// Restaurant identity used to build menu URLs.
#[derive(Debug, Clone, Default)]
pub struct RestaurantConfig {
    pub slug: String,
    pub hashed_slug: String,
    pub location: Option<Coordinate>,
}

/// Checkout endpoint configuration.
///
/// Implements `Debug` manually to redact the CSRF token.
#[derive(Clone)]
pub struct CheckoutConfig {
    /// Origin the menu is served from
    pub base_url: Url,
    /// CSRF token submitted as `csrfmiddlewaretoken`
    pub csrf_token: SecretString,
    /// Checkout never completes faster than this
    pub redirect_floor: Duration,
}

impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("base_url", &self.base_url.as_str())
            .field("csrf_token", &"[REDACTED]")
            .field("redirect_floor", &self.redirect_floor)
            .finish()
    }
}

/// Timings of the simulated phone verification and admin confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationConfig {
    pub verify_delay: Duration,
    pub admin_confirmation_delay: Duration,
    pub admin_confirmation_timeout: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            verify_delay: Duration::from_millis(1000),
            admin_confirmation_delay: Duration::from_millis(3000),
            admin_confirmation_timeout: Duration::from_millis(60_000),
        }
    }
}

impl OrderingConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// checkout settings are only partially provided.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let restaurant = RestaurantConfig::from_env()?;

        let detector = DetectorSettings {
            threshold_meters: parse_env_or("SNAP_MENU_DINE_IN_THRESHOLD_M", 100.0_f64)?,
            override_policy: parse_env_or("SNAP_MENU_OVERRIDE_POLICY", OverridePolicy::Sticky)?,
        };
        if !detector.threshold_meters.is_finite() || detector.threshold_meters < 0.0 {
            return Err(ConfigError::InvalidEnvVar(
                "SNAP_MENU_DINE_IN_THRESHOLD_M".to_string(),
                "must be a non-negative number of meters".to_string(),
            ));
        }

        let fees = FeeSchedule {
            service_fee: parse_env_or("SNAP_MENU_SERVICE_FEE", FeeSchedule::default().service_fee)?,
            delivery_fee: parse_env_or(
                "SNAP_MENU_DELIVERY_FEE",
                FeeSchedule::default().delivery_fee,
            )?,
        };

        let defaults = VerificationConfig::default();
        let verification = VerificationConfig {
            verify_delay: millis_env_or("SNAP_MENU_VERIFY_DELAY_MS", defaults.verify_delay)?,
            admin_confirmation_delay: millis_env_or(
                "SNAP_MENU_ADMIN_DELAY_MS",
                defaults.admin_confirmation_delay,
            )?,
            admin_confirmation_timeout: millis_env_or(
                "SNAP_MENU_ADMIN_TIMEOUT_MS",
                defaults.admin_confirmation_timeout,
            )?,
        };

        let storage_path = PathBuf::from(get_env_or_default(
            "SNAP_MENU_STORAGE_PATH",
            ".snap-menu/storage.json",
        ));

        let checkout = CheckoutConfig::from_env()?;

        Ok(Self {
            restaurant,
            detector,
            locate: LocateOptions::default(),
            fees,
            verification,
            storage_path,
            checkout,
        })
    }

    /// Checkout settings, or an error naming the missing variable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if checkout is not configured.
    pub fn checkout(&self) -> Result<&CheckoutConfig, ConfigError> {
        self.checkout
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SNAP_MENU_BASE_URL".to_string()))
    }

    /// Restaurant position, or an error naming the missing variable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no position is configured.
    pub fn restaurant_location(&self) -> Result<Coordinate, ConfigError> {
        self.restaurant
            .location
            .ok_or_else(|| ConfigError::MissingEnvVar("SNAP_MENU_RESTAURANT_LAT".to_string()))
    }
}

impl RestaurantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let lat = get_optional_env("SNAP_MENU_RESTAURANT_LAT");
        let lon = get_optional_env("SNAP_MENU_RESTAURANT_LON");

        let location = match (lat, lon) {
            (Some(lat), Some(lon)) => {
                let lat = parse_value::<f64>("SNAP_MENU_RESTAURANT_LAT", &lat)?;
                let lon = parse_value::<f64>("SNAP_MENU_RESTAURANT_LON", &lon)?;
                let coordinate = Coordinate::new(lat, lon).map_err(|e| {
                    ConfigError::InvalidEnvVar("SNAP_MENU_RESTAURANT_LAT".to_string(), e.to_string())
                })?;
                Some(coordinate)
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar(
                    "SNAP_MENU_RESTAURANT_LON".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar(
                    "SNAP_MENU_RESTAURANT_LAT".to_string(),
                ));
            }
        };

        Ok(Self {
            slug: get_env_or_default("SNAP_MENU_RESTAURANT_SLUG", ""),
            hashed_slug: get_env_or_default("SNAP_MENU_HASHED_SLUG", ""),
            location,
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(base_url) = get_optional_env("SNAP_MENU_BASE_URL") else {
            return Ok(None);
        };
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SNAP_MENU_BASE_URL".to_string(), e.to_string())
        })?;

        // Slugs are only meaningful together with a checkout origin
        get_required_env("SNAP_MENU_RESTAURANT_SLUG")?;
        get_required_env("SNAP_MENU_HASHED_SLUG")?;

        let csrf_token = get_required_secret("SNAP_MENU_CSRF_TOKEN")?;
        validate_csrf_token(&csrf_token, "SNAP_MENU_CSRF_TOKEN")?;

        Ok(Some(Self {
            base_url,
            csrf_token,
            redirect_floor: millis_env_or("SNAP_MENU_REDIRECT_FLOOR_MS", Duration::from_millis(1500))?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

/// Parse an optional millisecond duration.
fn millis_env_or(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        parse_value::<u64>(key, &raw).map(Duration::from_millis)
    })
}

/// Validate that a CSRF token looks like a real token.
fn validate_csrf_token(token: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = token.expose_secret();
    if value.len() < MIN_CSRF_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_CSRF_TOKEN_LENGTH,
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}
