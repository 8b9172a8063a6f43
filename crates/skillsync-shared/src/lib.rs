//! # skillsync-shared
//!
//! Types and pure helpers shared by every Skill Sync crate: identifiers and
//! chat enums, storefront pricing/review/order helpers, and webhook signature
//! verification.

pub mod constants;
pub mod error;
pub mod orders;
pub mod pricing;
pub mod reviews;
pub mod signature;
pub mod types;

pub use error::{SharedError, SignatureError};
pub use types::{ChatRoomId, MessageId, MessageSource, SenderType, UserId};
