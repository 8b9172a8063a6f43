//! Async access to the SQLite [`Database`].
//!
//! Queries are synchronous, so each call runs on the blocking pool. The mutex
//! only hands the single connection to one query at a time; room uniqueness
//! is enforced by the schema, not by this lock.

use std::sync::{Arc, Mutex};

use skillsync_store::{Database, StoreError};

use crate::error::ServerError;

#[derive(Clone)]
pub struct StoreHandle {
    db: Arc<Mutex<Database>>,
}

impl StoreHandle {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))?;
            f(&guard).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_maps_store_errors() {
        let store = StoreHandle::new(Database::open_in_memory().unwrap());
        let err = store
            .run(|db| db.get_user(skillsync_shared::UserId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Store(StoreError::NotFound)));
    }
}
