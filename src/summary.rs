use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gtfs_rt::FeedMessage;
use crate::mode::{FeedKind, FeedRequest, Mode};

/// Per-feed digest rendered by the log sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub received_at: DateTime<Utc>,
    pub mode: Mode,
    pub kind: FeedKind,
    pub gtfs_realtime_version: String,
    pub feed_timestamp: Option<DateTime<Utc>>,
    pub total_entities: usize,

    // entity types
    pub trip_updates: usize,
    pub vehicles: usize,
    pub alerts: usize,
    pub deleted: usize,

    // payload detail
    pub stop_time_updates: usize,
    pub with_position: usize,
    pub with_occupancy: usize,

    pub first_entity_id: Option<String>,
}

impl FeedSummary {
    pub fn from_feed(request: FeedRequest, feed: &FeedMessage) -> Self {
        let mut s = FeedSummary {
            received_at: Utc::now(),
            mode: request.mode,
            kind: request.kind,
            gtfs_realtime_version: feed.header.gtfs_realtime_version.clone(),
            feed_timestamp: feed
                .header
                .timestamp
                .and_then(|ts| i64::try_from(ts).ok())
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            total_entities: feed.entity.len(),
            trip_updates: 0,
            vehicles: 0,
            alerts: 0,
            deleted: 0,
            stop_time_updates: 0,
            with_position: 0,
            with_occupancy: 0,
            first_entity_id: feed.entity.first().map(|e| e.id.clone()),
        };

        for e in &feed.entity {
            if e.is_deleted == Some(true) {
                s.deleted += 1;
            }

            if let Some(tu) = &e.trip_update {
                s.trip_updates += 1;
                s.stop_time_updates += tu.stop_time_update.len();
            }

            if let Some(v) = &e.vehicle {
                s.vehicles += 1;

                if v.position.is_some() {
                    s.with_position += 1;
                }

                if v.occupancy_status.is_some() || !v.multi_carriage_details.is_empty() {
                    s.with_occupancy += 1;
                }
            }

            if e.alert.is_some() {
                s.alerts += 1;
            }
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::StopTimeUpdate;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, Position, TripUpdate, VehiclePosition};

    fn request() -> FeedRequest {
        FeedRequest::new(FeedKind::VehiclePosition, Mode::SydneyTrains)
    }

    #[test]
    fn test_empty_feed() {
        let s = FeedSummary::from_feed(request(), &FeedMessage::default());
        assert_eq!(s.total_entities, 0);
        assert_eq!(s.first_entity_id, None);
        assert_eq!(s.feed_timestamp, None);
        assert_eq!(s.mode, Mode::SydneyTrains);
    }

    #[test]
    fn test_counts_entity_types() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1_700_000_000),
                ..Default::default()
            },
            entity: vec![
                FeedEntity {
                    id: "v1".to_string(),
                    vehicle: Some(VehiclePosition {
                        position: Some(Position {
                            latitude: -33.88,
                            longitude: 151.21,
                            ..Default::default()
                        }),
                        occupancy_status: Some(1),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                FeedEntity {
                    id: "v2".to_string(),
                    vehicle: Some(VehiclePosition::default()),
                    ..Default::default()
                },
                FeedEntity {
                    id: "t1".to_string(),
                    trip_update: Some(TripUpdate {
                        stop_time_update: vec![StopTimeUpdate::default(), StopTimeUpdate::default()],
                        ..Default::default()
                    }),
                    is_deleted: Some(true),
                    ..Default::default()
                },
            ],
        };

        let s = FeedSummary::from_feed(request(), &feed);
        assert_eq!(s.total_entities, 3);
        assert_eq!(s.vehicles, 2);
        assert_eq!(s.with_position, 1);
        assert_eq!(s.with_occupancy, 1);
        assert_eq!(s.trip_updates, 1);
        assert_eq!(s.stop_time_updates, 2);
        assert_eq!(s.deleted, 1);
        assert_eq!(s.first_entity_id.as_deref(), Some("v1"));
        assert_eq!(
            s.feed_timestamp.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }
}
