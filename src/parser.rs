//! Protobuf decoder for GTFS Realtime feeds.

use std::sync::Arc;

use prost::Message;

use crate::error::{DecodeError, SchemaError};
use crate::gtfs_rt::FeedMessage;
use crate::schema::Schema;

/// Field number of `FeedMessage.entity` in the compiled types.
const COMPILED_ENTITY_FIELD: i32 = 2;

/// Turns raw feed bytes into a [`FeedMessage`].
///
/// Built from a loaded [`Schema`]; construction fails if that schema's envelope
/// does not agree with the compiled message layout.
#[derive(Debug, Clone)]
pub struct FeedDecoder {
    schema: Arc<Schema>,
}

impl FeedDecoder {
    pub fn new(schema: Arc<Schema>) -> Result<Self, SchemaError> {
        if schema.entity_field_number() != COMPILED_ENTITY_FIELD {
            return Err(SchemaError::EnvelopeMismatch {
                name: schema.envelope().to_string(),
                reason: format!(
                    "`entity` is field {}, expected {COMPILED_ENTITY_FIELD}",
                    schema.entity_field_number()
                ),
            });
        }
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
    pub fn decode(&self, bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
        FeedMessage::decode(bytes).map_err(|source| DecodeError {
            len: bytes.len(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, TripDescriptor, TripUpdate};
    use crate::schema::SchemaSource;

    async fn decoder() -> FeedDecoder {
        let schema = Schema::load(&SchemaSource::Embedded).await.unwrap();
        FeedDecoder::new(Arc::new(schema)).unwrap()
    }

    fn trip_entity(id: &str) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: Some(format!("trip-{id}")),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_parse_empty_bytes_returns_default_feed() {
        // Empty input is a valid, empty FeedMessage
        let feed = decoder().await.decode(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
    }

    #[tokio::test]
    async fn test_parse_invalid_bytes() {
        let invalid_bytes = vec![0xFF, 0xFE, 0x00, 0x01];
        let err = decoder().await.decode(&invalid_bytes).unwrap_err();
        assert_eq!(err.len, 4);
    }

    #[tokio::test]
    async fn test_parse_truncated_feed() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                ..Default::default()
            },
            entity: vec![trip_entity("a"), trip_entity("b")],
        };
        let encoded = feed.encode_to_vec();
        let truncated = &encoded[..encoded.len() - 3];

        assert!(decoder().await.decode(truncated).is_err());
    }

    #[tokio::test]
    async fn test_entity_count_and_order_preserved() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: Some(1_700_000_000),
                feed_version: None,
            },
            entity: vec![trip_entity("first"), trip_entity("second"), trip_entity("third")],
        };
        let parsed = decoder().await.decode(&feed.encode_to_vec()).unwrap();

        assert_eq!(parsed.header.timestamp, Some(1_700_000_000));
        let ids: Vec<_> = parsed.entity.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!(parsed, feed);
    }

    #[tokio::test]
    async fn test_decoder_rejects_mismatched_schema() {
        let mut descriptor = prost_types::FileDescriptorSet::decode(
            crate::schema::EMBEDDED_DESCRIPTOR_SET,
        )
        .unwrap();
        for file in &mut descriptor.file {
            for message in &mut file.message_type {
                if message.name() == "FeedMessage" {
                    for field in &mut message.field {
                        if field.name() == "entity" {
                            field.number = Some(7);
                        }
                    }
                }
            }
        }
        let schema = Schema::from_descriptor_set(&descriptor.encode_to_vec()).unwrap();
        let err = FeedDecoder::new(Arc::new(schema)).unwrap_err();
        assert!(matches!(err, SchemaError::EnvelopeMismatch { .. }));
    }
}
