//! Wire-format schema for the realtime feeds.
//!
//! The schema is a protobuf `FileDescriptorSet`. By default the set compiled
//! from `proto/gtfs-realtime.proto` at build time is used; a deployment can
//! point at its own set (`protoc --descriptor_set_out`) instead. Either way the
//! envelope type is resolved once at startup and the result is immutable.

use std::path::PathBuf;

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FileDescriptorSet};
use tracing::{debug, info};

use crate::error::SchemaError;

/// Descriptor set generated by `build.rs` alongside the Rust types.
pub const EMBEDDED_DESCRIPTOR_SET: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/gtfs_rt_descriptor.bin"));

/// Fully-qualified name of the envelope shared by every feed kind.
pub const ENVELOPE_TYPE: &str = "transit_realtime.FeedMessage";

const ENTITY_FIELD: &str = "entity";

/// Where the schema comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    Embedded,
    File(PathBuf),
}

/// The resolved envelope definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    envelope: String,
    entity_field_number: i32,
    entity_type: String,
}

impl Schema {
    /// Loads the descriptor set from `source` and resolves [`ENVELOPE_TYPE`].
    pub async fn load(source: &SchemaSource) -> Result<Self, SchemaError> {
        let bytes = match source {
            SchemaSource::Embedded => EMBEDDED_DESCRIPTOR_SET.to_vec(),
            SchemaSource::File(path) => match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SchemaError::NotFound(path.clone()));
                }
                Err(source) => {
                    return Err(SchemaError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            },
        };

        let schema = Self::from_descriptor_set(&bytes)?;
        info!(
            source = ?source,
            envelope = %schema.envelope,
            entity_type = %schema.entity_type,
            "Schema loaded",
        );
        Ok(schema)
    }

    /// Resolves the envelope from an encoded `FileDescriptorSet`.
    pub fn from_descriptor_set(bytes: &[u8]) -> Result<Self, SchemaError> {
        let set = FileDescriptorSet::decode(bytes)?;
        debug!(files = set.file.len(), "Descriptor set decoded");

        let envelope = find_message(&set, ENVELOPE_TYPE)
            .ok_or_else(|| SchemaError::EnvelopeNotFound(ENVELOPE_TYPE.to_string()))?;

        let entity = envelope
            .field
            .iter()
            .find(|f| f.name() == ENTITY_FIELD)
            .ok_or_else(|| SchemaError::EnvelopeMismatch {
                name: ENVELOPE_TYPE.to_string(),
                reason: format!("no `{ENTITY_FIELD}` field"),
            })?;

        if entity.label() != Label::Repeated || entity.r#type() != Type::Message {
            return Err(SchemaError::EnvelopeMismatch {
                name: ENVELOPE_TYPE.to_string(),
                reason: format!("`{ENTITY_FIELD}` is not a repeated message field"),
            });
        }

        Ok(Self {
            envelope: ENVELOPE_TYPE.to_string(),
            entity_field_number: entity.number(),
            entity_type: entity.type_name().trim_start_matches('.').to_string(),
        })
    }

    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_field_number(&self) -> i32 {
        self.entity_field_number
    }
}

/// Looks up a top-level message by its fully-qualified name.
fn find_message<'a>(set: &'a FileDescriptorSet, full_name: &str) -> Option<&'a DescriptorProto> {
    let (package, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
    set.file
        .iter()
        .filter(|file| file.package() == package)
        .flat_map(|file| file.message_type.iter())
        .find(|message| message.name() == name)
}
