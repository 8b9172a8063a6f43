//! Session lookup for bearer-token authentication.

use chrono::{DateTime, Utc};
use rusqlite::params;
use skillsync_shared::UserId;

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::Session;

impl Database {
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                session.token,
                session.user_id.to_string(),
                ts_to_sql(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Resolve a token to its session, treating expired sessions as absent.
    pub fn get_active_session(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = self
            .conn()
            .query_row(
                "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                row_to_session,
            )
            .map_err(StoreError::from_query)?;

        if session.is_expired_at(now) {
            return Err(StoreError::NotFound);
        }
        Ok(session)
    }

    /// Remove every session that expired before `now`. Returns the count.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![ts_to_sql(&now)],
        )?;
        Ok(affected)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let token: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let expires_str: String = row.get(2)?;

    Ok(Session {
        token,
        user_id: UserId(uuid_from_sql(1, &user_id_str)?),
        expires_at: ts_from_sql(2, &expires_str)?,
    })
}
