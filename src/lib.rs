//! Rate-limited poller for the Transport for NSW GTFS-Realtime feeds.
//!
//! One pass fetches the trip update and vehicle position feeds of every
//! transport mode through a shared [`ratelimit::RateLimiter`], decodes them
//! with [`parser::FeedDecoder`] and hands each [`gtfs_rt::FeedMessage`] to a
//! [`sink::FeedSink`].

pub mod config;
pub mod error;
pub mod fetch;
pub mod mode;
pub mod parser;
pub mod poll;
pub mod ratelimit;
pub mod schema;
pub mod sink;
pub mod startup;
pub mod summary;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
