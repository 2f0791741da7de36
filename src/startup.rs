//! Startup sequence: config, schema, HTTP client, poller.
//!
//! Every step here can fail fatally, and every step completes before the
//! first feed request is sent.

use std::sync::Arc;

use tracing::info;

use crate::config::PollerConfig;
use crate::error::{StartupError, TransportError};
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, FeedClient, HttpClient};
use crate::parser::FeedDecoder;
use crate::poll::Poller;
use crate::ratelimit::RateLimiter;
use crate::schema::Schema;

/// Builds a poller from settings read through `lookup`.
///
/// `make_http` is only called once the config is valid, so a configuration
/// error never constructs, let alone uses, an HTTP client.
pub async fn bootstrap<F, M, C>(lookup: F, make_http: M) -> Result<Poller<ApiKey<C>>, StartupError>
where
    F: Fn(&str) -> Option<String>,
    M: FnOnce(&PollerConfig) -> Result<C, TransportError>,
    C: HttpClient,
{
    let config = PollerConfig::from_lookup(lookup)?;
    let http = make_http(&config)?;
    build_poller(&config, http).await
}

/// Loads the schema and wires the authenticated, rate-limited client.
pub async fn build_poller<C: HttpClient>(
    config: &PollerConfig,
    http: C,
) -> Result<Poller<ApiKey<C>>, StartupError> {
    let schema = Arc::new(Schema::load(&config.schema).await?);
    let decoder = FeedDecoder::new(schema)?;

    let http = ApiKey::authorization(http, &config.api_key)?;
    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    let client = FeedClient::new(http, config.endpoints.clone(), limiter);

    info!(
        trip_update_url = %config.endpoints.trip_update_url,
        vehicle_position_url = %config.endpoints.vehicle_position_url,
        "Poller ready"
    );
    Ok(Poller::new(client, decoder))
}

/// The production HTTP client, honouring the configured timeout.
pub fn default_http(config: &PollerConfig) -> Result<BasicClient, TransportError> {
    BasicClient::with_timeout(config.http_timeout).map_err(TransportError::Client)
}
