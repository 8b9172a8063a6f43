//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `sessions`, `chat_rooms` and
//! `chat_messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (provisioned by the auth provider)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email        TEXT NOT NULL UNIQUE,
    display_name TEXT,
    created_at   TEXT NOT NULL                -- RFC-3339, microseconds, UTC
);

-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,     -- opaque session token
    user_id    TEXT NOT NULL,                 -- FK -> users(id)
    expires_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);

-- ----------------------------------------------------------------
-- Chat rooms (at most one per user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_rooms (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    user_id    TEXT NOT NULL UNIQUE,          -- FK -> users(id)
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Chat messages (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    id          TEXT NOT NULL UNIQUE,               -- UUID v4
    room_id     TEXT NOT NULL,                      -- FK -> chat_rooms(id)
    message     TEXT NOT NULL,
    sender_type TEXT NOT NULL CHECK (sender_type IN ('user', 'admin')),
    source      TEXT NOT NULL CHECK (source IN
                    ('rule_based', 'embedding_search', 'staff_confirming', 'human_support')),
    sent_at     TEXT NOT NULL,

    FOREIGN KEY (room_id) REFERENCES chat_rooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_room_sent
    ON chat_messages(room_id, sent_at, seq);

CREATE TRIGGER IF NOT EXISTS trg_chat_messages_immutable
    BEFORE UPDATE ON chat_messages
BEGIN
    SELECT RAISE(ABORT, 'chat messages are immutable');
END;
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
