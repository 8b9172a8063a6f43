//! CRUD operations for [`User`] records.

use rusqlite::params;
use skillsync_shared::UserId;

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, email, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.email,
                user.display_name,
                ts_to_sql(&user.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, email, display_name, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    /// Delete a user. Sessions, the chat room and its messages cascade.
    pub fn delete_user(&self, id: UserId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let email: String = row.get(1)?;
    let display_name: Option<String> = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(User {
        id: UserId(uuid_from_sql(0, &id_str)?),
        email,
        display_name,
        created_at: ts_from_sql(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn create_get_delete() {
        let db = Database::open_in_memory().unwrap();
        let user = User {
            id: UserId::new(),
            email: "learner@example.com".into(),
            display_name: Some("Learner".into()),
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();

        let loaded = db.get_user(user.id).unwrap();
        assert_eq!(loaded.email, user.email);
        assert_eq!(loaded.display_name, user.display_name);

        assert!(db.delete_user(user.id).unwrap());
        assert!(matches!(db.get_user(user.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut user = User {
            id: UserId::new(),
            email: "dup@example.com".into(),
            display_name: None,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id = UserId::new();
        assert!(db.create_user(&user).is_err());
    }
}
