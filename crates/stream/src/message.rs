//! Inbound/outbound message schema and the JSON codec used at the worker
//! boundary.
//!
//! Decoding is lenient: every inbound field is optional and decoded on its
//! own, so one malformed field is logged and dropped without losing the rest
//! of the message.

use entstream_common::{EntityId, EntitySnapshot, xyz};
use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to an entity by id. Extra fields (position, range) are accepted
/// on the wire and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        Self { id }
    }
}

impl From<&EntitySnapshot> for EntityRef {
    fn from(entity: &EntitySnapshot) -> Self {
        Self { id: entity.id }
    }
}

/// One inbound event. Any subset of fields may be present; they are applied
/// in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundMessage {
    /// New observer position.
    #[serde(with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    /// Full authoritative entity set as `[id, snapshot]` pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<(EntityId, EntitySnapshot)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_to_add: Option<EntitySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_to_remove: Option<EntityRef>,
}

impl InboundMessage {
    /// Position tick only.
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn add(entity: EntitySnapshot) -> Self {
        Self {
            entity_to_add: Some(entity),
            ..Self::default()
        }
    }

    pub fn remove(entity: impl Into<EntityRef>) -> Self {
        Self {
            entity_to_remove: Some(entity.into()),
            ..Self::default()
        }
    }

    /// Full-set replace, keyed by each snapshot's own id.
    pub fn replace_all(entities: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        Self {
            entities: Some(entities.into_iter().map(|e| (e.id, e)).collect()),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.entities.is_none()
            && self.entity_to_add.is_none()
            && self.entity_to_remove.is_none()
    }
}

/// Outbound notification, one per state change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Notification {
    StreamIn(EntitySnapshot),
    StreamOut(EntitySnapshot),
}

impl Notification {
    pub fn entity(&self) -> &EntitySnapshot {
        match self {
            Self::StreamIn(e) | Self::StreamOut(e) => e,
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity().id
    }

    pub fn is_stream_in(&self) -> bool {
        matches!(self, Self::StreamIn(_))
    }
}

/// Errors from the JSON message codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inbound message must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decode one inbound message, skipping any field that fails to parse.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => return Err(CodecError::NotAnObject(json_kind(&other))),
    };

    Ok(InboundMessage {
        position: take_field_with(&mut fields, "position", xyz::deserialize),
        entities: take_field::<Vec<Value>>(&mut fields, "entities").map(decode_entity_list),
        entity_to_add: take_field(&mut fields, "entityToAdd"),
        entity_to_remove: take_field(&mut fields, "entityToRemove"),
    })
}

/// Encode one outbound notification as a single JSON line.
pub fn encode_notification(notification: &Notification) -> Result<String, CodecError> {
    Ok(serde_json::to_string(notification)?)
}

fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    take_field_with(fields, key, serde_json::from_value)
}

fn take_field_with<T>(
    fields: &mut Map<String, Value>,
    key: &str,
    decode: impl FnOnce(Value) -> Result<T, serde_json::Error>,
) -> Option<T> {
    match fields.remove(key)? {
        Value::Null => None,
        raw => match decode(raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(field = key, %err, "skipping malformed inbound field");
                None
            }
        },
    }
}

fn decode_entity_list(entries: Vec<Value>) -> Vec<(EntityId, EntitySnapshot)> {
    let total = entries.len();
    let decoded: Vec<(EntityId, EntitySnapshot)> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<(EntityId, EntitySnapshot)>(entry) {
            Ok((key, entity)) => {
                if key != entity.id {
                    tracing::warn!(%key, id = %entity.id, "entity list key differs from snapshot id, using snapshot id");
                }
                Some((entity.id, entity))
            }
            Err(err) => {
                tracing::warn!(%err, "skipping malformed entity list entry");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        tracing::debug!(kept = decoded.len(), total, "entity list partially decoded");
    }
    decoded
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
