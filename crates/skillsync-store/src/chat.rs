//! Chat rooms and their append-only message log.
//!
//! A room is created lazily the first time a user's message is stored. The
//! `UNIQUE(user_id)` constraint on `chat_rooms` is what keeps concurrent
//! first-contact requests from creating two rooms: the insert is an upsert
//! that does nothing on conflict, followed by a read of whichever row won.

use chrono::Utc;
use rusqlite::{params, ErrorCode};
use skillsync_shared::{ChatRoomId, MessageId, MessageSource, SenderType, UserId};

use crate::database::{enum_from_sql, ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::{ChatMessage, ChatRoom, ChatRoomSummary};

impl Database {
    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Return the user's chat room, creating it on first contact.
    ///
    /// Fails with [`StoreError::ChatRoomUnavailable`] when the room can be
    /// neither found nor created (for example, the user does not exist).
    pub fn ensure_chat_room(&self, user_id: UserId) -> Result<ChatRoom> {
        let inserted = self.conn().execute(
            "INSERT INTO chat_rooms (id, user_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO NOTHING",
            params![
                ChatRoomId::new().to_string(),
                user_id.to_string(),
                ts_to_sql(&Utc::now()),
            ],
        );

        match inserted {
            Ok(1) => tracing::debug!(user = %user_id, "created chat room"),
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                tracing::warn!(user = %user_id, error = %e, "chat room could not be created");
                return Err(StoreError::ChatRoomUnavailable(user_id));
            }
            Err(e) => return Err(e.into()),
        }

        match self.get_chat_room_for_user(user_id) {
            Err(StoreError::NotFound) => Err(StoreError::ChatRoomUnavailable(user_id)),
            other => other,
        }
    }

    pub fn get_chat_room_for_user(&self, user_id: UserId) -> Result<ChatRoom> {
        self.conn()
            .query_row(
                "SELECT id, user_id, created_at FROM chat_rooms WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_room,
            )
            .map_err(StoreError::from_query)
    }

    pub fn get_chat_room(&self, id: ChatRoomId) -> Result<ChatRoom> {
        self.conn()
            .query_row(
                "SELECT id, user_id, created_at FROM chat_rooms WHERE id = ?1",
                params![id.to_string()],
                row_to_room,
            )
            .map_err(StoreError::from_query)
    }

    /// List every room with its owner and activity, most recent first.
    pub fn list_chat_rooms(&self) -> Result<Vec<ChatRoomSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.user_id, r.created_at, u.email,
                    COUNT(m.seq), MAX(m.sent_at)
             FROM chat_rooms r
             JOIN users u ON u.id = r.user_id
             LEFT JOIN chat_messages m ON m.room_id = r.id
             GROUP BY r.id
             ORDER BY COALESCE(MAX(m.sent_at), r.created_at) DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let room = row_to_room(row)?;
            let user_email: String = row.get(3)?;
            let message_count: u32 = row.get(4)?;
            let last: Option<String> = row.get(5)?;
            let last_message_at = last.map(|s| ts_from_sql(5, &s)).transpose()?;
            Ok(ChatRoomSummary {
                room,
                user_email,
                message_count,
                last_message_at,
            })
        })?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(row?);
        }
        Ok(rooms)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Append one message to the user's room, creating the room if needed.
    pub fn append_chat_message(
        &self,
        user_id: UserId,
        text: &str,
        sender_type: SenderType,
        source: MessageSource,
    ) -> Result<ChatMessage> {
        let room = self.ensure_chat_room(user_id)?;
        self.append_to_room(room.id, text, sender_type, source)
    }

    /// Append one message to an existing room.
    pub fn append_to_room(
        &self,
        room_id: ChatRoomId,
        text: &str,
        sender_type: SenderType,
        source: MessageSource,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: MessageId::new(),
            room_id,
            message: text.to_string(),
            sender_type,
            source,
            sent_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO chat_messages (id, room_id, message, sender_type, source, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id.to_string(),
                    message.room_id.to_string(),
                    message.message,
                    message.sender_type.as_str(),
                    message.source.as_str(),
                    ts_to_sql(&message.sent_at),
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::NotFound
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        Ok(message)
    }

    /// The latest `limit` messages of a room, oldest first.
    pub fn list_chat_messages(&self, room_id: ChatRoomId, limit: u32) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_id, message, sender_type, source, sent_at FROM (
                 SELECT seq, id, room_id, message, sender_type, source, sent_at
                 FROM chat_messages
                 WHERE room_id = ?1
                 ORDER BY sent_at DESC, seq DESC
                 LIMIT ?2
             )
             ORDER BY sent_at ASC, seq ASC",
        )?;

        let rows = stmt.query_map(params![room_id.to_string(), limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation))
}

/// The referenced row is missing; other constraint failures are real errors.
fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRoom> {
    let id_str: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    Ok(ChatRoom {
        id: ChatRoomId(uuid_from_sql(0, &id_str)?),
        user_id: UserId(uuid_from_sql(1, &user_id_str)?),
        created_at: ts_from_sql(2, &created_str)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_str: String = row.get(0)?;
    let room_id_str: String = row.get(1)?;
    let message: String = row.get(2)?;
    let sender_str: String = row.get(3)?;
    let source_str: String = row.get(4)?;
    let sent_str: String = row.get(5)?;

    Ok(ChatMessage {
        id: MessageId(uuid_from_sql(0, &id_str)?),
        room_id: ChatRoomId(uuid_from_sql(1, &room_id_str)?),
        message,
        sender_type: enum_from_sql(3, &sender_str)?,
        source: enum_from_sql(4, &source_str)?,
        sent_at: ts_from_sql(5, &sent_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn seed_user(db: &Database, email: &str) -> UserId {
        let user = User {
            id: UserId::new(),
            email: email.into(),
            display_name: None,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    #[test]
    fn sequential_sends_share_one_room() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");

        let first = db
            .append_chat_message(user, "hello", SenderType::User, MessageSource::HumanSupport)
            .unwrap();
        let second = db
            .append_chat_message(user, "again", SenderType::User, MessageSource::HumanSupport)
            .unwrap();

        assert_eq!(first.room_id, second.room_id);
        assert_eq!(db.list_chat_rooms().unwrap().len(), 1);

        let history = db.list_chat_messages(first.room_id, 50).unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["hello", "again"]);
    }

    #[test]
    fn ensure_room_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "b@example.com");
        let a = db.ensure_chat_room(user).unwrap();
        let b = db.ensure_chat_room(user).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_user_has_no_room() {
        let db = Database::open_in_memory().unwrap();
        let ghost = UserId::new();
        let err = db
            .append_chat_message(ghost, "hi", SenderType::User, MessageSource::HumanSupport)
            .unwrap_err();
        assert!(matches!(err, StoreError::ChatRoomUnavailable(id) if id == ghost));
        assert!(db.list_chat_rooms().unwrap().is_empty());
    }

    #[test]
    fn history_limit_keeps_latest_in_order() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "c@example.com");
        for i in 0..5 {
            db.append_chat_message(
                user,
                &format!("m{i}"),
                SenderType::User,
                MessageSource::HumanSupport,
            )
            .unwrap();
        }
        let room = db.get_chat_room_for_user(user).unwrap();
        let latest = db.list_chat_messages(room.id, 2).unwrap();
        let texts: Vec<_> = latest.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);
    }

    #[test]
    fn messages_are_immutable() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "d@example.com");
        let msg = db
            .append_chat_message(user, "original", SenderType::User, MessageSource::HumanSupport)
            .unwrap();

        let updated = db.conn().execute(
            "UPDATE chat_messages SET message = 'edited' WHERE id = ?1",
            params![msg.id.to_string()],
        );
        assert!(updated.is_err());
    }

    #[test]
    fn append_to_missing_room_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .append_to_room(
                ChatRoomId::new(),
                "hi",
                SenderType::Admin,
                MessageSource::HumanSupport,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn only_foreign_key_failures_mean_missing_room() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "g@example.com");
        let msg = db
            .append_chat_message(user, "first", SenderType::User, MessageSource::HumanSupport)
            .unwrap();

        let insert = "INSERT INTO chat_messages (id, room_id, message, sender_type, source, sent_at)
                      VALUES (?1, ?2, 'x', 'user', 'human_support', ?3)";
        let now = ts_to_sql(&Utc::now());

        let duplicate_id = db
            .conn()
            .execute(insert, params![msg.id.to_string(), msg.room_id.to_string(), now])
            .unwrap_err();
        assert!(is_constraint_violation(&duplicate_id));
        assert!(!is_foreign_key_violation(&duplicate_id));

        let dangling_room = db
            .conn()
            .execute(
                insert,
                params![MessageId::new().to_string(), ChatRoomId::new().to_string(), now],
            )
            .unwrap_err();
        assert!(is_foreign_key_violation(&dangling_room));
    }

    #[test]
    fn concurrent_first_contact_creates_one_room() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");

        let setup = Database::open_at(&path).unwrap();
        let user = seed_user(&setup, "h@example.com");

        // One connection per writer, opened up front so migrations run once.
        let connections: Vec<Database> = (0..8)
            .map(|_| Database::open_at(&path).unwrap())
            .collect();

        let handles: Vec<_> = connections
            .into_iter()
            .enumerate()
            .map(|(i, db)| {
                std::thread::spawn(move || {
                    db.append_chat_message(
                        user,
                        &format!("hello {i}"),
                        SenderType::User,
                        MessageSource::HumanSupport,
                    )
                })
            })
            .collect();

        let messages: Vec<ChatMessage> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let rooms = setup.list_chat_rooms().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].message_count, 8);
        assert!(messages.iter().all(|m| m.room_id == rooms[0].room.id));
    }

    #[test]
    fn room_summary_and_cascade() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "e@example.com");
        let _quiet = seed_user(&db, "f@example.com");
        db.append_chat_message(user, "q", SenderType::User, MessageSource::HumanSupport)
            .unwrap();
        db.append_chat_message(user, "a", SenderType::Admin, MessageSource::RuleBased)
            .unwrap();

        let rooms = db.list_chat_rooms().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].user_email, "e@example.com");
        assert_eq!(rooms[0].message_count, 2);
        assert!(rooms[0].last_message_at.is_some());

        db.delete_user(user).unwrap();
        assert!(db.list_chat_rooms().unwrap().is_empty());
        let orphans: u32 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM chat_messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
