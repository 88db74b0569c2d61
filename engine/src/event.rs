//! Decoding of inbound push frames.
//!
//! Frames arrive from the push channel as raw JSON:
//! `{ "type": ..., "entity": ..., "data": ... }`. Known combinations decode
//! into a [`PushEvent`]; structurally valid frames with an unrecognized
//! `type`/`entity` pair decode to [`Decoded::Unknown`] so callers can skip
//! them without failing the stream.

use crate::error::{Error, Result};
use crate::model::{DeliveryState, Message, MessageId, MessageKind};
use crate::{AuthorId, ConversationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Change type carried by a push frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

impl EventType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(EventType::Insert),
            "update" => Some(EventType::Update),
            "delete" => Some(EventType::Delete),
            _ => None,
        }
    }
}

/// Entity addressed by a push frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Message,
    Conversation,
    Membership,
}

impl EntityKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(EntityKind::Message),
            "conversation" => Some(EntityKind::Conversation),
            "membership" => Some(EntityKind::Membership),
            _ => None,
        }
    }
}

/// Authoritative message fields carried by a push frame or mutation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: ConversationId,
    pub author_id: AuthorId,
    pub body: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub created_at: Timestamp,
    #[serde(default)]
    pub edited_at: Option<Timestamp>,
}

impl MessageRecord {
    /// Convert into a confirmed message carrying the server identity.
    pub fn into_message(self) -> Message {
        Message {
            id: MessageId::Server(self.id),
            conversation_id: self.conversation_id,
            author_id: self.author_id,
            body: self.body,
            kind: self.kind,
            created_at: self.created_at,
            edited_at: self.edited_at,
            delivery: DeliveryState::Confirmed,
        }
    }
}

/// Authoritative conversation fields carried by a push frame or mutation
/// response. Partial updates leave absent fields as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: ConversationId,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    pub last_activity_at: Timestamp,
    #[serde(default)]
    pub member_count: Option<u32>,
}

/// Membership change for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub conversation_id: ConversationId,
    pub member_count: u32,
}

/// A recognized push event ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    MessageInserted(MessageRecord),
    MessageUpdated(MessageRecord),
    MessageDeleted {
        conversation_id: ConversationId,
        id: String,
    },
    ConversationUpserted(ConversationRecord),
    ConversationDeleted {
        id: ConversationId,
    },
    MembershipChanged(MembershipRecord),
}

/// Result of decoding a raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A recognized event ready for reconciliation
    Event(PushEvent),
    /// A structurally valid frame this engine does not handle
    Unknown { event_type: String, entity: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageKey {
    id: String,
    conversation_id: ConversationId,
}

#[derive(Deserialize)]
struct ConversationKey {
    id: ConversationId,
}

impl PushEvent {
    /// Decode a raw frame into a reconcilable event.
    ///
    /// Returns [`Decoded::Unknown`] for unrecognized `type`/`entity`
    /// combinations, [`Error::MissingField`] when the envelope is incomplete,
    /// and [`Error::MalformedEvent`] when a recognized combination carries
    /// undecodable data.
    pub fn decode(raw: &serde_json::Value) -> Result<Decoded> {
        let frame = raw
            .as_object()
            .ok_or_else(|| Error::MalformedEvent("frame is not an object".into()))?;
        let type_str = frame
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingField("type".into()))?;
        let entity_str = frame
            .get("entity")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingField("entity".into()))?;

        let (event_type, entity) = match (EventType::parse(type_str), EntityKind::parse(entity_str))
        {
            (Some(event_type), Some(entity)) => (event_type, entity),
            _ => {
                return Ok(Decoded::Unknown {
                    event_type: type_str.to_string(),
                    entity: entity_str.to_string(),
                })
            }
        };

        let data = frame
            .get("data")
            .ok_or_else(|| Error::MissingField("data".into()))?;

        let event = match (event_type, entity) {
            (EventType::Insert, EntityKind::Message) => {
                PushEvent::MessageInserted(decode_data(data)?)
            }
            (EventType::Update, EntityKind::Message) => {
                PushEvent::MessageUpdated(decode_data(data)?)
            }
            (EventType::Delete, EntityKind::Message) => {
                let key: MessageKey = decode_data(data)?;
                PushEvent::MessageDeleted {
                    conversation_id: key.conversation_id,
                    id: key.id,
                }
            }
            (EventType::Insert | EventType::Update, EntityKind::Conversation) => {
                PushEvent::ConversationUpserted(decode_data(data)?)
            }
            (EventType::Delete, EntityKind::Conversation) => {
                let key: ConversationKey = decode_data(data)?;
                PushEvent::ConversationDeleted { id: key.id }
            }
            // Joins, leaves, and removals all carry the resulting count.
            (_, EntityKind::Membership) => PushEvent::MembershipChanged(decode_data(data)?),
        };

        Ok(Decoded::Event(event))
    }

    /// Conversation the event addresses, when it has one.
    pub fn conversation_id(&self) -> &str {
        match self {
            PushEvent::MessageInserted(record) | PushEvent::MessageUpdated(record) => {
                &record.conversation_id
            }
            PushEvent::MessageDeleted {
                conversation_id, ..
            } => conversation_id,
            PushEvent::ConversationUpserted(record) => &record.id,
            PushEvent::ConversationDeleted { id } => id,
            PushEvent::MembershipChanged(record) => &record.conversation_id,
        }
    }

    /// Entity kind the event addresses.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            PushEvent::MessageInserted(_)
            | PushEvent::MessageUpdated(_)
            | PushEvent::MessageDeleted { .. } => EntityKind::Message,
            PushEvent::ConversationUpserted(_) | PushEvent::ConversationDeleted { .. } => {
                EntityKind::Conversation
            }
            PushEvent::MembershipChanged(_) => EntityKind::Membership,
        }
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(data: &serde_json::Value) -> Result<T> {
    serde_json::from_value(data.clone()).map_err(|e| Error::MalformedEvent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_message_insert() {
        let raw = json!({
            "type": "insert",
            "entity": "message",
            "data": {
                "id": "m1",
                "conversationId": "conv-1",
                "authorId": "user-1",
                "body": "hello",
                "kind": "text",
                "createdAt": 1000,
            },
            "receivedAt": 1001,
        });

        let decoded = PushEvent::decode(&raw).unwrap();
        match decoded {
            Decoded::Event(PushEvent::MessageInserted(record)) => {
                assert_eq!(record.id, "m1");
                assert_eq!(record.conversation_id, "conv-1");
                assert_eq!(record.body, "hello");
                assert_eq!(record.created_at, 1000);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decode_defaults_kind_to_text() {
        let raw = json!({
            "type": "insert",
            "entity": "message",
            "data": {
                "id": "m1",
                "conversationId": "conv-1",
                "authorId": "user-1",
                "body": "hello",
                "createdAt": 1000,
            },
        });

        match PushEvent::decode(&raw).unwrap() {
            Decoded::Event(PushEvent::MessageInserted(record)) => {
                assert_eq!(record.kind, MessageKind::Text);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decode_message_delete() {
        let raw = json!({
            "type": "delete",
            "entity": "message",
            "data": { "id": "m1", "conversationId": "conv-1" },
        });

        match PushEvent::decode(&raw).unwrap() {
            Decoded::Event(PushEvent::MessageDeleted {
                conversation_id,
                id,
            }) => {
                assert_eq!(conversation_id, "conv-1");
                assert_eq!(id, "m1");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decode_conversation_upsert() {
        let raw = json!({
            "type": "update",
            "entity": "conversation",
            "data": {
                "id": "conv-1",
                "lastActivityAt": 5000,
                "memberCount": 4,
            },
        });

        match PushEvent::decode(&raw).unwrap() {
            Decoded::Event(PushEvent::ConversationUpserted(record)) => {
                assert_eq!(record.id, "conv-1");
                assert_eq!(record.last_message_preview, None);
                assert_eq!(record.member_count, Some(4));
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decode_membership_change() {
        let raw = json!({
            "type": "update",
            "entity": "membership",
            "data": { "conversationId": "conv-1", "memberCount": 7 },
        });

        match PushEvent::decode(&raw).unwrap() {
            Decoded::Event(PushEvent::MembershipChanged(record)) => {
                assert_eq!(record.conversation_id, "conv-1");
                assert_eq!(record.member_count, 7);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn unknown_combination_is_not_an_error() {
        let raw = json!({
            "type": "upsert",
            "entity": "message",
            "data": {},
        });

        match PushEvent::decode(&raw).unwrap() {
            Decoded::Unknown { event_type, entity } => {
                assert_eq!(event_type, "upsert");
                assert_eq!(entity, "message");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }

        let raw = json!({
            "type": "insert",
            "entity": "reaction",
            "data": {},
        });
        assert!(matches!(
            PushEvent::decode(&raw).unwrap(),
            Decoded::Unknown { .. }
        ));
    }

    #[test]
    fn missing_envelope_fields() {
        let raw = json!({ "entity": "message", "data": {} });
        assert_eq!(
            PushEvent::decode(&raw).unwrap_err(),
            Error::MissingField("type".into())
        );

        let raw = json!({ "type": "insert", "entity": "message" });
        assert_eq!(
            PushEvent::decode(&raw).unwrap_err(),
            Error::MissingField("data".into())
        );
    }

    #[test]
    fn malformed_data_is_an_error() {
        let raw = json!({
            "type": "insert",
            "entity": "message",
            "data": { "id": "m1", "body": 42 },
        });

        assert!(matches!(
            PushEvent::decode(&raw).unwrap_err(),
            Error::MalformedEvent(_)
        ));
    }

    #[test]
    fn non_object_frame_is_malformed() {
        let raw = json!("ping");
        assert!(matches!(
            PushEvent::decode(&raw).unwrap_err(),
            Error::MalformedEvent(_)
        ));
    }

    #[test]
    fn accessors() {
        let event = PushEvent::MessageDeleted {
            conversation_id: "conv-9".into(),
            id: "m1".into(),
        };
        assert_eq!(event.conversation_id(), "conv-9");
        assert_eq!(event.entity_kind(), EntityKind::Message);

        let event = PushEvent::ConversationDeleted { id: "conv-2".into() };
        assert_eq!(event.conversation_id(), "conv-2");
        assert_eq!(event.entity_kind(), EntityKind::Conversation);
    }

    #[test]
    fn record_into_message() {
        let record = MessageRecord {
            id: "m1".into(),
            conversation_id: "conv-1".into(),
            author_id: "user-1".into(),
            body: "hello".into(),
            kind: MessageKind::Text,
            created_at: 1000,
            edited_at: None,
        };

        let message = record.into_message();
        assert_eq!(message.id, MessageId::Server("m1".into()));
        assert_eq!(message.delivery, DeliveryState::Confirmed);
    }
}
