//! CORS policy for the dashboard front-end
//!
//! Only origins on the configured allow-list are reflected. Matching is exact
//! on `scheme://host[:port]`, case-insensitive, ignoring a trailing slash, so
//! `https://app.example.com.evil.test` never matches `https://app.example.com`.
//! The webhook route is server-to-server and unaffected by CORS.

use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers::auth::USER_ID_HEADER;

/// Methods the invoice API uses
pub const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Default max age for preflight cache (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// CORS configuration options
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Normalised allowed origins
    pub allowed_origins: Vec<String>,
    /// Whether to allow credentials (cookies, auth headers)
    pub allow_credentials: bool,
    /// Maximum age for preflight cache in seconds
    pub max_age_secs: u64,
}

impl CorsConfig {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_origins: origins
                .into_iter()
                .map(|o| normalize_origin(o.as_ref()))
                .filter(|o| !o.is_empty())
                .collect(),
            allow_credentials: true,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }

    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    pub fn with_allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Whether `origin` is on the allow-list
    pub fn allows(&self, origin: &HeaderValue) -> bool {
        match origin.to_str() {
            Ok(raw) => {
                let candidate = normalize_origin(raw);
                self.allowed_origins.iter().any(|allowed| *allowed == candidate)
            }
            Err(_) => false,
        }
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn allowed_headers() -> [HeaderName; 3] {
    [
        http::header::CONTENT_TYPE,
        http::header::AUTHORIZATION,
        HeaderName::from_static(USER_ID_HEADER),
    ]
}

/// Build the CORS layer for `config`
pub fn cors_layer(config: CorsConfig) -> CorsLayer {
    let allow_credentials = config.allow_credentials;
    let max_age = Duration::from_secs(config.max_age_secs);
    let config = Arc::new(config);

    let mut layer = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| config.allows(origin)))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
        .max_age(max_age);

    if allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}
