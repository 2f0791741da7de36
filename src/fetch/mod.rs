//! HTTP fetching for realtime feeds.
//!
//! [`HttpClient`] is the transport seam; [`BasicClient`] is the reqwest-backed
//! implementation and [`auth::ApiKey`] decorates any client with the
//! credential header. [`FeedClient`] turns a [`FeedRequest`] into a URL and
//! runs the whole request through the shared [`RateLimiter`].

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, instrument};

use crate::config::Endpoints;
use crate::error::TransportError;
use crate::mode::FeedRequest;
use crate::ratelimit::RateLimiter;

const PROTOBUF_CONTENT_TYPE: &str = "application/x-google-protobuf";

/// Issues a GET for `url` and returns the full body.
///
/// # Errors
///
/// Fails on an unparsable URL, a transport error, a non-2xx status, or an
/// interrupted body.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, TransportError> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let mut req = reqwest::Request::new(reqwest::Method::GET, parsed);
    req.headers_mut()
        .insert(ACCEPT, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));

    let resp = client
        .execute(req)
        .await
        .map_err(|e| TransportError::from_reqwest(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    resp.bytes()
        .await
        .map_err(|e| TransportError::from_reqwest(url, e))
}

/// Rate-limited client for the TfNSW realtime endpoints.
pub struct FeedClient<C> {
    http: C,
    endpoints: Endpoints,
    limiter: Arc<RateLimiter>,
}

impl<C: HttpClient> FeedClient<C> {
    pub fn new(http: C, endpoints: Endpoints, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            endpoints,
            limiter,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// `{base_url}/{mode}` for the request's feed kind.
    pub fn request_url(&self, request: &FeedRequest) -> String {
        let base = self.endpoints.base_url(request.kind).trim_end_matches('/');
        format!("{}/{}", base, request.mode.path())
    }

    /// Fetches the raw feed bytes for one request.
    ///
    /// Admission, the request itself, and the body read all happen inside a
    /// single limiter slot. Failures are returned as-is; nothing is retried.
    #[instrument(skip(self), fields(mode = %request.mode, kind = %request.kind))]
    pub async fn fetch(&self, request: FeedRequest) -> Result<Bytes, TransportError> {
        let url = self.request_url(&request);
        let bytes = self
            .limiter
            .run(|| fetch_bytes(&self.http, &url))
            .await?;
        debug!(url = %url, bytes = bytes.len(), "Feed bytes received");
        Ok(bytes)
    }
}

impl<C> std::fmt::Debug for FeedClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("endpoints", &self.endpoints)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}
