//! Destinations for decoded feeds.
//!
//! [`FeedSink`] receives every decoded [`FeedMessage`] in full. [`LogSink`]
//! renders each one through `tracing`, either as a pretty debug dump or as
//! JSON.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::gtfs_rt::FeedMessage;
use crate::mode::FeedRequest;
use crate::summary::FeedSummary;

/// Consumes decoded feeds, one at a time, in poll order.
pub trait FeedSink: Send {
    fn emit(&mut self, request: FeedRequest, feed: FeedMessage);
}

/// How [`LogSink`] renders a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Summary fields plus a debug dump of the first entity
    #[default]
    Pretty,
    /// One JSON summary per feed
    Json,
}

/// Logs a summary of each feed. Entity filtering happens here, not upstream.
#[derive(Debug, Default)]
pub struct LogSink {
    format: OutputFormat,
    emitted: usize,
}

impl LogSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, emitted: 0 }
    }

    /// Feeds received so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl FeedSink for LogSink {
    fn emit(&mut self, request: FeedRequest, feed: FeedMessage) {
        self.emitted += 1;
        let summary = FeedSummary::from_feed(request, &feed);

        match self.format {
            OutputFormat::Pretty => {
                print_pretty(&summary);
                match feed.entity.first() {
                    Some(first) => info!(mode = %request.mode, kind = %request.kind, "{:#?}", first),
                    None => info!(mode = %request.mode, kind = %request.kind, "Feed has no entities"),
                }
            }
            OutputFormat::Json => {
                if let Err(e) = print_json(&summary) {
                    error!(error = %e, "Failed to serialize feed summary");
                }
            }
        }
    }
}

/// Logs feed summary fields at `info`, with the full struct at `debug`.
pub fn print_pretty(summary: &FeedSummary) {
    info!(
        mode = %summary.mode,
        kind = %summary.kind,
        entities = summary.total_entities,
        trip_updates = summary.trip_updates,
        vehicles = summary.vehicles,
        alerts = summary.alerts,
        feed_timestamp = ?summary.feed_timestamp,
        "Feed received"
    );
    debug!("{:#?}", summary);
}

/// Logs a feed summary as JSON.
pub fn print_json(summary: &FeedSummary) -> Result<()> {
    info!("{}", serde_json::to_string(summary)?);
    Ok(())
}
