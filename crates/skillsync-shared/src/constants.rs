/// Application name
pub const APP_NAME: &str = "Skill Sync";

/// Maximum accepted chat message length in characters
pub const MAX_CHAT_MESSAGE_CHARS: usize = 2_000;

/// Default number of messages returned by a history query
pub const DEFAULT_HISTORY_LIMIT: u32 = 200;

/// Maximum image upload size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Header carrying the hex HMAC-SHA256 of a webhook body
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Minimum similarity for an embedding match to be trusted
pub const DEFAULT_EMBEDDING_THRESHOLD: f32 = 0.78;

/// Reply shown while a staff member takes over the conversation
pub const STAFF_CONFIRMING_MESSAGE: &str =
    "Thanks for your message! A member of our support staff is checking and will reply shortly.";
