//! # skillsync-store
//!
//! Relational storage for the Skill Sync support backend, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users,
//! sessions, chat rooms and chat messages.

pub mod chat;
pub mod database;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
