//! Error types for configuration, schema loading, transport and decoding.
//!
//! Startup errors ([`ConfigError`], [`SchemaError`]) are fatal. Per-request
//! errors ([`TransportError`], [`DecodeError`]) are scoped to one
//! [`FeedRequest`] and wrapped in a [`PollError`] naming the mode and phase.

use std::path::PathBuf;

use thiserror::Error;

use crate::mode::{FeedKind, FeedRequest, Mode};
use crate::poll::PassState;

/// A required setting is absent or a supplied value is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required setting not present (or blank)
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// Setting present but not valid
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// The wire-format schema could not be loaded or does not describe the feed envelope.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read schema {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema is not a valid descriptor set: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("envelope type {0} not found in schema")]
    EnvelopeNotFound(String),

    #[error("envelope type {name} does not match the compiled feed layout: {reason}")]
    EnvelopeMismatch { name: String, reason: String },
}

/// One HTTP request failed before a complete body was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client itself could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid request url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header value for {header}")]
    InvalidHeader { header: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl TransportError {
    /// Classifies a reqwest failure for `url`, separating timeouts out.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// A response body did not parse as a feed envelope.
#[derive(Debug, Error)]
#[error("feed payload of {len} bytes failed to decode: {source}")]
pub struct DecodeError {
    pub len: usize,
    #[source]
    pub source: prost::DecodeError,
}

/// Failure of one fetch-and-decode step.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A failed phase of a poll pass, tagged with the mode and feed kind.
#[derive(Debug, Error)]
#[error("{mode} {kind} failed: {source}")]
pub struct PollError {
    /// Position of `mode` in the pass's mode list
    pub mode_index: usize,
    pub mode: Mode,
    pub kind: FeedKind,
    #[source]
    pub source: FetchError,
}

impl PollError {
    pub fn new(request: FeedRequest, mode_index: usize, source: FetchError) -> Self {
        Self {
            mode_index,
            mode: request.mode,
            kind: request.kind,
            source,
        }
    }

    pub fn request(&self) -> FeedRequest {
        FeedRequest::new(self.kind, self.mode)
    }

    /// The pass state this failure leaves behind.
    pub fn state(&self) -> PassState {
        PassState::Failed {
            mode_index: self.mode_index,
            phase: self.kind,
        }
    }
}

/// Anything that stops the process before polling begins.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("transport setup error: {0}")]
    Transport(#[from] TransportError),
}
