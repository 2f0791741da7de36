//! Poller configuration, read once at startup from environment-style settings.
//!
//! | Variable                     | Default                                              |
//! |------------------------------|------------------------------------------------------|
//! | `TFNSW_API_KEY`              | required                                             |
//! | `TFNSW_TRIP_UPDATE_URL`      | `https://api.transport.nsw.gov.au/v1/gtfs/realtime`  |
//! | `TFNSW_VEHICLE_POSITION_URL` | `https://api.transport.nsw.gov.au/v1/gtfs/vehiclepos`|
//! | `TFNSW_SCHEMA_PATH`          | embedded descriptor set                              |
//! | `TFNSW_RATE_WINDOW_MS`       | `1000`                                               |
//! | `TFNSW_RATE_MAX_PER_WINDOW`  | `5`                                                  |
//! | `TFNSW_RATE_MAX_CONCURRENT`  | `5`                                                  |
//! | `TFNSW_HTTP_TIMEOUT_SECS`    | `30`                                                 |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::error::ConfigError;
use crate::mode::FeedKind;
use crate::ratelimit::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW, RateLimitConfig,
};
use crate::schema::SchemaSource;

pub const API_KEY_VAR: &str = "TFNSW_API_KEY";
pub const TRIP_UPDATE_URL_VAR: &str = "TFNSW_TRIP_UPDATE_URL";
pub const VEHICLE_POSITION_URL_VAR: &str = "TFNSW_VEHICLE_POSITION_URL";
pub const SCHEMA_PATH_VAR: &str = "TFNSW_SCHEMA_PATH";
pub const RATE_WINDOW_MS_VAR: &str = "TFNSW_RATE_WINDOW_MS";
pub const RATE_MAX_PER_WINDOW_VAR: &str = "TFNSW_RATE_MAX_PER_WINDOW";
pub const RATE_MAX_CONCURRENT_VAR: &str = "TFNSW_RATE_MAX_CONCURRENT";
pub const HTTP_TIMEOUT_SECS_VAR: &str = "TFNSW_HTTP_TIMEOUT_SECS";

pub const DEFAULT_TRIP_UPDATE_URL: &str = "https://api.transport.nsw.gov.au/v1/gtfs/realtime";
pub const DEFAULT_VEHICLE_POSITION_URL: &str = "https://api.transport.nsw.gov.au/v1/gtfs/vehiclepos";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Base URLs for the two feed kinds. A mode path is appended to each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub trip_update_url: String,
    pub vehicle_position_url: String,
}

impl Endpoints {
    pub fn base_url(&self, kind: FeedKind) -> &str {
        match kind {
            FeedKind::TripUpdate => &self.trip_update_url,
            FeedKind::VehiclePosition => &self.vehicle_position_url,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            trip_update_url: DEFAULT_TRIP_UPDATE_URL.to_string(),
            vehicle_position_url: DEFAULT_VEHICLE_POSITION_URL.to_string(),
        }
    }
}

/// Everything the poller needs, resolved before any request is made.
#[derive(Clone)]
pub struct PollerConfig {
    /// Sent verbatim as the `Authorization` header
    pub api_key: String,
    pub endpoints: Endpoints,
    pub schema: SchemaSource,
    pub rate_limit: RateLimitConfig,
    pub http_timeout: Duration,
}

// Hand-written so the credential never reaches the logs.
impl fmt::Debug for PollerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollerConfig")
            .field("api_key", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("schema", &self.schema)
            .field("rate_limit", &self.rate_limit)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl PollerConfig {
    /// Config with the given credential and every other setting at its default.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoints: Endpoints::default(),
            schema: SchemaSource::Embedded,
            rate_limit: RateLimitConfig::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key-value source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the credential is missing or not a legal
    /// header value, or if any supplied value is blank, non-numeric, or zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(API_KEY_VAR))?;
        // The key itself stays out of the error message.
        if HeaderValue::from_str(&api_key).is_err() {
            return Err(ConfigError::Invalid {
                key: API_KEY_VAR,
                reason: "not a valid HTTP header value".to_string(),
            });
        }

        let endpoints = Endpoints {
            trip_update_url: url_setting(&lookup, TRIP_UPDATE_URL_VAR, DEFAULT_TRIP_UPDATE_URL)?,
            vehicle_position_url: url_setting(
                &lookup,
                VEHICLE_POSITION_URL_VAR,
                DEFAULT_VEHICLE_POSITION_URL,
            )?,
        };

        let schema = match lookup(SCHEMA_PATH_VAR) {
            None => SchemaSource::Embedded,
            Some(path) if path.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    key: SCHEMA_PATH_VAR,
                    reason: "must not be empty".to_string(),
                });
            }
            Some(path) => SchemaSource::File(PathBuf::from(path.trim())),
        };

        let window_ms = positive_setting(
            &lookup,
            RATE_WINDOW_MS_VAR,
            DEFAULT_WINDOW.as_millis() as u64,
        )?;
        let max_per_window =
            positive_setting(&lookup, RATE_MAX_PER_WINDOW_VAR, DEFAULT_MAX_PER_WINDOW)?;
        let max_concurrent =
            positive_setting(&lookup, RATE_MAX_CONCURRENT_VAR, DEFAULT_MAX_CONCURRENT)?;
        let rate_limit = RateLimitConfig::new(
            Duration::from_millis(window_ms),
            max_per_window,
            max_concurrent,
        )?;

        let timeout_secs =
            positive_setting(&lookup, HTTP_TIMEOUT_SECS_VAR, DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            endpoints,
            schema,
            rate_limit,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn url_setting<F>(lookup: &F, key: &'static str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default.to_string());
    };
    let url = raw.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("expected an http(s) URL, got {raw:?}"),
        });
    }
    Ok(url.to_string())
}

fn positive_setting<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = PollerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "apikey abc")])).unwrap();
        assert_eq!(config.api_key, "apikey abc");
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(matches!(config.schema, SchemaSource::Embedded));
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let err = PollerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_KEY_VAR)));
    }

    #[test]
    fn test_blank_api_key_is_error() {
        let err = PollerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_KEY_VAR)));
    }

    #[test]
    fn test_api_key_with_control_character_is_invalid() {
        let err = PollerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "apikey a\u{1}b")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: API_KEY_VAR, .. }));
        assert!(!err.to_string().contains("apikey"));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = PollerConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (TRIP_UPDATE_URL_VAR, "http://localhost:8080/tu/"),
            (VEHICLE_POSITION_URL_VAR, "http://localhost:8080/vp"),
            (SCHEMA_PATH_VAR, "/etc/tfnsw/gtfs-rt.desc"),
            (RATE_WINDOW_MS_VAR, "2000"),
            (RATE_MAX_PER_WINDOW_VAR, "3"),
            (RATE_MAX_CONCURRENT_VAR, "2"),
            (HTTP_TIMEOUT_SECS_VAR, "10"),
        ]))
        .unwrap();

        assert_eq!(config.endpoints.trip_update_url, "http://localhost:8080/tu");
        assert_eq!(
            config.endpoints.base_url(FeedKind::VehiclePosition),
            "http://localhost:8080/vp"
        );
        assert!(
            matches!(config.schema, SchemaSource::File(ref p) if p == &PathBuf::from("/etc/tfnsw/gtfs-rt.desc"))
        );
        assert_eq!(config.rate_limit.window(), Duration::from_millis(2000));
        assert_eq!(config.rate_limit.max_per_window(), 3);
        assert_eq!(config.rate_limit.max_concurrent(), 2);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_and_garbage_numbers_rejected() {
        let err = PollerConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (RATE_MAX_CONCURRENT_VAR, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: RATE_MAX_CONCURRENT_VAR, .. }));

        let err = PollerConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (RATE_WINDOW_MS_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: RATE_WINDOW_MS_VAR, .. }));
    }

    #[test]
    fn test_blank_schema_path_rejected() {
        let err = PollerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "k"), (SCHEMA_PATH_VAR, "")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: SCHEMA_PATH_VAR, .. }));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let err = PollerConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (TRIP_UPDATE_URL_VAR, "ftp://example.test"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: TRIP_UPDATE_URL_VAR, .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = PollerConfig::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
