//! Message and conversation types rendered by the client.

use crate::{AuthorId, ConversationId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest preview carried by a conversation summary, in characters.
pub const PREVIEW_MAX_CHARS: usize = 120;

/// Identity of a message.
///
/// A message starts life under a locally generated placeholder id and is
/// resolved to a server-assigned id on confirmation. The two never collide
/// because they live in separate variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageId {
    /// Locally generated placeholder, pending server assignment
    Local(String),
    /// Authoritative server-assigned identity
    Server(String),
}

impl MessageId {
    /// The raw id string without the variant.
    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Local(id) | MessageId::Server(id) => id,
        }
    }

    /// Whether this identity is still a local placeholder.
    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }

    /// Whether this identity was assigned by the server.
    pub fn is_server(&self) -> bool {
        matches!(self, MessageId::Server(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(id) => write!(f, "local:{id}"),
            MessageId::Server(id) => write!(f, "server:{id}"),
        }
    }
}

/// Kind of message content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    System,
}

/// Delivery lifecycle of a message as rendered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Written optimistically, awaiting server confirmation
    Pending,
    /// Acknowledged by the server
    Confirmed,
    /// Rejected by the server, kept visible for retry or discard
    Failed,
}

/// A message in a conversation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Local placeholder or server-assigned identity
    pub id: MessageId,
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Author of the message
    pub author_id: AuthorId,
    /// Message content
    pub body: String,
    /// Content kind
    pub kind: MessageKind,
    /// Creation time (milliseconds since epoch); drives window ordering
    pub created_at: Timestamp,
    /// Last edit time, if the message was edited
    pub edited_at: Option<Timestamp>,
    /// Delivery lifecycle state
    pub delivery: DeliveryState,
}

impl Message {
    /// Create an optimistic message awaiting confirmation.
    pub fn optimistic(
        id: MessageId,
        conversation_id: impl Into<ConversationId>,
        author_id: impl Into<AuthorId>,
        body: impl Into<String>,
        kind: MessageKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id: conversation_id.into(),
            author_id: author_id.into(),
            body: body.into(),
            kind,
            created_at,
            edited_at: None,
            delivery: DeliveryState::Pending,
        }
    }

    /// Whether the message is still awaiting confirmation.
    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }

    /// Replace the body and stamp the edit time.
    pub fn apply_edit(&mut self, body: impl Into<String>, edited_at: Timestamp) {
        self.body = body.into();
        self.edited_at = Some(edited_at);
    }

    /// Preview text for conversation summaries, truncated on a char boundary.
    pub fn preview(&self) -> String {
        self.body.chars().take(PREVIEW_MAX_CHARS).collect()
    }
}

/// One row in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation identity
    pub id: ConversationId,
    /// Preview of the most recent message
    pub last_message_preview: String,
    /// Time of the most recent activity (milliseconds since epoch);
    /// drives conversation-list ordering
    pub last_activity_at: Timestamp,
    /// Number of members in the conversation
    pub member_count: u32,
}

impl ConversationSummary {
    /// Create a summary row.
    pub fn new(
        id: impl Into<ConversationId>,
        last_message_preview: impl Into<String>,
        last_activity_at: Timestamp,
        member_count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            last_message_preview: last_message_preview.into(),
            last_activity_at,
            member_count,
        }
    }

    /// Absorb a message into the preview and activity time.
    ///
    /// Returns `false` when the message is older than the recorded activity,
    /// in which case nothing changes.
    pub fn touch(&mut self, message: &Message) -> bool {
        if message.created_at < self.last_activity_at {
            return false;
        }
        self.last_activity_at = message.created_at;
        self.last_message_preview = message.preview();
        true
    }
}
