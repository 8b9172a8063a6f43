//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillsync_shared::{ChatRoomId, MessageId, MessageSource, SenderType, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A customer account known to the support backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A login session issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token presented by the client.
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Chat room
// ---------------------------------------------------------------------------

/// Per-user container for support chat messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A chat room as listed in the staff console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomSummary {
    pub room: ChatRoom,
    pub user_email: String,
    pub message_count: u32,
    pub last_message_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Chat message
// ---------------------------------------------------------------------------

/// A single immutable chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: ChatRoomId,
    pub message: String,
    pub sender_type: SenderType,
    pub source: MessageSource,
    pub sent_at: DateTime<Utc>,
}
