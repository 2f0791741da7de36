//! Transport modes and feed kinds polled from the TfNSW realtime API.

use std::fmt;

use serde::Serialize;

/// A transport category with its own pair of realtime feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Metro,
    Buses,
    Ferries,
    LightRailInnerWest,
    LightRailNewcastle,
    NswTrains,
    SydneyTrains,
}

impl Mode {
    /// Every mode, in polling order.
    pub const ALL: [Mode; 7] = [
        Mode::Metro,
        Mode::Buses,
        Mode::Ferries,
        Mode::LightRailInnerWest,
        Mode::LightRailNewcastle,
        Mode::NswTrains,
        Mode::SydneyTrains,
    ];

    /// URL path segment appended to a feed base URL.
    pub const fn path(self) -> &'static str {
        match self {
            Mode::Metro => "metro",
            Mode::Buses => "buses",
            Mode::Ferries => "ferries",
            Mode::LightRailInnerWest => "lightrail/innerwest",
            Mode::LightRailNewcastle => "lightrail/newcastle",
            Mode::NswTrains => "nswtrains",
            Mode::SydneyTrains => "sydneytrains",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The two realtime feeds each mode publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeedKind {
    TripUpdate,
    VehiclePosition,
}

impl FeedKind {
    /// Request order within a mode.
    pub const ALL: [FeedKind; 2] = [FeedKind::TripUpdate, FeedKind::VehiclePosition];
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::TripUpdate => f.write_str("trip update"),
            FeedKind::VehiclePosition => f.write_str("vehicle position"),
        }
    }
}

/// Identifies one HTTP call: which feed, for which mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FeedRequest {
    pub kind: FeedKind,
    pub mode: Mode,
}

impl FeedRequest {
    pub const fn new(kind: FeedKind, mode: Mode) -> Self {
        Self { kind, mode }
    }
}

impl fmt::Display for FeedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mode, self.kind)
    }
}
