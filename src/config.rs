//! Application configuration
//!
//! Every external setting is read exactly once, at startup, into [`AppConfig`].
//! Components receive the slices they need; nothing below `main` touches the
//! process environment.
//!
//! # Environment Variables
//!
//! - `STRIPE_SECRET_KEY` (required): gateway API key
//! - `STRIPE_WEBHOOK_SECRET` (required): webhook signing secret
//! - `INVOICEPAY_HOST` / `INVOICEPAY_PORT` (or `PORT`): bind address
//! - `DEFAULT_CURRENCY`: last-resort invoice currency (default: INR)
//! - `DISPLAY_UTC_OFFSET`: offset used when printing dates (default: +05:30)
//! - `PAYMENT_TIMEOUT_MS` / `EMAIL_TIMEOUT_MS`: outbound call bounds
//! - `MAIL_API_URL` / `MAIL_API_KEY` / `MAIL_FROM`: HTTP email API (optional)
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origin allow-list
//! - `BUSINESS_PROFILES_PATH`: JSON file of business profiles

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;
use url::Url;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required variable not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// Variable set but unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Result type for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Gateway (Stripe) settings
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key, never logged
    pub secret_key: String,
    /// Webhook signing secret, never logged
    pub webhook_secret: String,
    /// API base URL
    pub api_base: Url,
    /// Redirect after a successful hosted checkout
    pub success_url: String,
    /// Redirect after an abandoned hosted checkout
    pub cancel_url: String,
    /// Allowed skew between the signature timestamp and now
    pub webhook_tolerance: Duration,
    /// Bound on each gateway call
    pub request_timeout: Duration,
}

/// Outbound email settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP endpoint of the email API; `None` means log-only delivery
    pub api_url: Option<Url>,
    /// Bearer key for the email API
    pub api_key: Option<String>,
    /// From address
    pub from: String,
    /// Bound on each send
    pub timeout: Duration,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind host
    pub host: IpAddr,
    /// Bind port
    pub port: u16,
    /// Gateway settings
    pub stripe: StripeConfig,
    /// Email settings
    pub mail: MailConfig,
    /// Currency used when neither the request nor the business names one
    pub default_currency: String,
    /// Offset used to print dates in emails and documents
    pub display_offset: FixedOffset,
    /// Product name shown to invoice recipients
    pub brand_name: String,
    /// CORS origin allow-list
    pub allowed_origins: Vec<String>,
    /// Business profiles to preload
    pub business_profiles_path: Option<PathBuf>,
}

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = match get("INVOICEPAY_HOST") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "INVOICEPAY_HOST",
                reason: e.to_string(),
            })?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let port = match get("INVOICEPAY_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: "INVOICEPAY_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let secret_key = get("STRIPE_SECRET_KEY").ok_or(ConfigError::Missing("STRIPE_SECRET_KEY"))?;
        let webhook_secret =
            get("STRIPE_WEBHOOK_SECRET").ok_or(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        let api_base = parse_url(
            "STRIPE_API_BASE",
            get("STRIPE_API_BASE").as_deref().unwrap_or("https://api.stripe.com"),
        )?;

        let success_url = get("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| {
            "https://invoicepay.app/success?session_id={CHECKOUT_SESSION_ID}".to_string()
        });
        let cancel_url = get("CHECKOUT_CANCEL_URL")
            .unwrap_or_else(|| "https://invoicepay.app/cancel".to_string());
        // Stripe substitutes the placeholder itself, so only the prefix must be a URL.
        parse_url("CHECKOUT_SUCCESS_URL", &success_url.replace("{CHECKOUT_SESSION_ID}", "x"))?;
        parse_url("CHECKOUT_CANCEL_URL", &cancel_url)?;

        let webhook_tolerance = Duration::from_secs(parse_u64(
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            get("STRIPE_WEBHOOK_TOLERANCE_SECS"),
            DEFAULT_WEBHOOK_TOLERANCE_SECS,
        )?);
        let request_timeout = Duration::from_millis(parse_u64(
            "PAYMENT_TIMEOUT_MS",
            get("PAYMENT_TIMEOUT_MS"),
            DEFAULT_TIMEOUT_MS,
        )?);
        let mail_timeout = Duration::from_millis(parse_u64(
            "EMAIL_TIMEOUT_MS",
            get("EMAIL_TIMEOUT_MS"),
            DEFAULT_TIMEOUT_MS,
        )?);

        let mail_api_url = get("MAIL_API_URL")
            .map(|raw| parse_url("MAIL_API_URL", &raw))
            .transpose()?;

        let default_currency = normalize_currency(
            get("DEFAULT_CURRENCY").as_deref().unwrap_or("INR"),
        )
        .ok_or_else(|| ConfigError::Invalid {
            var: "DEFAULT_CURRENCY",
            reason: "expected a three-letter ISO code".to_string(),
        })?;

        let display_offset = get("DISPLAY_UTC_OFFSET")
            .as_deref()
            .unwrap_or("+05:30")
            .parse::<FixedOffset>()
            .map_err(|e| ConfigError::Invalid {
                var: "DISPLAY_UTC_OFFSET",
                reason: e.to_string(),
            })?;

        let allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ]
            });

        Ok(Self {
            host,
            port,
            stripe: StripeConfig {
                secret_key,
                webhook_secret,
                api_base,
                success_url,
                cancel_url,
                webhook_tolerance,
                request_timeout,
            },
            mail: MailConfig {
                api_url: mail_api_url,
                api_key: get("MAIL_API_KEY"),
                from: get("MAIL_FROM").unwrap_or_else(|| "invoices@invoicepay.app".to_string()),
                timeout: mail_timeout,
            },
            default_currency,
            display_offset,
            brand_name: get("BRAND_NAME").unwrap_or_else(|| "InvoicePay".to_string()),
            allowed_origins,
            business_profiles_path: get("BUSINESS_PROFILES_PATH").map(PathBuf::from),
        })
    }
}

/// Upper-case a currency code, rejecting anything that is not three ASCII letters
pub fn normalize_currency(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

fn parse_url(var: &'static str, raw: &str) -> ConfigResult<Url> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> ConfigResult<u64> {
    match raw {
        Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_test"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.host, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.default_currency, "INR");
        assert_eq!(config.display_offset.local_minus_utc(), 5 * 3600 + 30 * 60);
        assert_eq!(config.stripe.webhook_tolerance, Duration::from_secs(300));
        assert_eq!(config.stripe.api_base.as_str(), "https://api.stripe.com/");
        assert!(config.mail.api_url.is_none());
        assert_eq!(config.brand_name, "InvoicePay");
    }

    #[test]
    fn test_missing_secret() {
        let err = AppConfig::from_lookup(lookup(&[("STRIPE_SECRET_KEY", "sk")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STRIPE_WEBHOOK_SECRET")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "   "),
            ("STRIPE_WEBHOOK_SECRET", "whsec"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STRIPE_SECRET_KEY")));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("DEFAULT_CURRENCY", "usd"),
            ("DISPLAY_UTC_OFFSET", "-04:00"),
            ("PAYMENT_TIMEOUT_MS", "2500"),
            ("CORS_ALLOWED_ORIGINS", "https://app.example.com, https://admin.example.com"),
            ("MAIL_API_URL", "https://mail.example.com/send"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.display_offset.local_minus_utc(), -4 * 3600);
        assert_eq!(config.stripe.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(config.mail.api_url.is_some());
    }

    #[test]
    fn test_invalid_currency() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_CURRENCY", "rupees"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEFAULT_CURRENCY", .. }));
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("INVOICEPAY_PORT", "http"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency(" inr ").as_deref(), Some("INR"));
        assert_eq!(normalize_currency("E1R"), None);
        assert_eq!(normalize_currency(""), None);
    }
}
