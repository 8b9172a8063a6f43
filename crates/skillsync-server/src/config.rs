//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. Without an embedding API key the
//! embedding stage stays off; without an email key review notifications are
//! only logged.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use skillsync_reply::SimilarityMetric;
use skillsync_shared::constants::{
    DEFAULT_EMBEDDING_THRESHOLD, DEFAULT_HTTP_PORT, MAX_IMAGE_SIZE, STAFF_CONFIRMING_MESSAGE,
};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./data/skillsync.db`
    pub database_path: PathBuf,

    /// Directory where review and profile images are stored.
    /// Env: `IMAGE_STORAGE_PATH`
    /// Default: `./images`
    pub image_storage_path: PathBuf,

    /// Maximum image size in bytes.
    /// Env: `MAX_IMAGE_SIZE`
    /// Default: 10 MiB
    pub max_image_size: usize,

    // -- Auto-reply --

    /// JSON keyword template table. Built-in templates when unset.
    /// Env: `CHAT_TEMPLATES_PATH`
    pub chat_templates_path: Option<PathBuf>,

    /// JSON embedding index. Empty index when unset.
    /// Env: `EMBEDDING_INDEX_PATH`
    pub embedding_index_path: Option<PathBuf>,

    /// Env: `RULE_BASED_ENABLED` (true/false)
    /// Default: `true`
    pub rule_based_enabled: bool,

    /// Env: `EMBEDDING_SEARCH_ENABLED` (true/false)
    /// Default: `false`
    pub embedding_search_enabled: bool,

    /// Env: `EMBEDDING_API_URL`
    /// Default: `https://api.openai.com/v1/embeddings`
    pub embedding_api_url: String,

    /// Env: `EMBEDDING_API_KEY`
    pub embedding_api_key: Option<String>,

    /// Env: `EMBEDDING_MODEL`
    /// Default: `text-embedding-3-small`
    pub embedding_model: String,

    /// Minimum score for an embedding answer.
    /// Env: `EMBEDDING_THRESHOLD`
    /// Default: `0.78`
    pub embedding_threshold: f32,

    /// Env: `EMBEDDING_METRIC` (`cosine` | `dot`)
    /// Default: `cosine`
    pub embedding_metric: SimilarityMetric,

    /// Env: `EMBEDDING_TIMEOUT_SECS`
    /// Default: `10`
    pub embedding_timeout: Duration,

    /// Text sent when no stage answers.
    /// Env: `CHAT_FALLBACK_MESSAGE`
    pub fallback_message: String,

    // -- Secrets --

    /// Bearer token for /api/admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// HMAC key shared with the webhook sender.
    /// Env: `WEBHOOK_SECRET`
    /// Default: empty (webhooks rejected).
    pub webhook_secret: Option<String>,

    // -- Email --

    /// Env: `EMAIL_API_URL`
    /// Default: `https://api.resend.com/emails`
    pub email_api_url: String,

    /// Env: `EMAIL_API_KEY`
    pub email_api_key: Option<String>,

    /// Env: `EMAIL_FROM`
    pub email_from: String,

    /// Recipient of review notifications.
    /// Env: `NOTIFY_EMAIL`
    pub notify_email: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./data/skillsync.db"),
            image_storage_path: PathBuf::from("./images"),
            max_image_size: MAX_IMAGE_SIZE,
            chat_templates_path: None,
            embedding_index_path: None,
            rule_based_enabled: true,
            embedding_search_enabled: false,
            embedding_api_url: "https://api.openai.com/v1/embeddings".to_string(),
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_threshold: DEFAULT_EMBEDDING_THRESHOLD,
            embedding_metric: SimilarityMetric::Cosine,
            embedding_timeout: Duration::from_secs(10),
            fallback_message: STAFF_CONFIRMING_MESSAGE.to_string(),
            admin_token: None,
            webhook_secret: None,
            email_api_url: "https://api.resend.com/emails".to_string(),
            email_api_key: None,
            email_from: "Skill Sync <support@skillsync.example>".to_string(),
            notify_email: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = var("IMAGE_STORAGE_PATH") {
            config.image_storage_path = PathBuf::from(path);
        }

        if let Some(val) = var("MAX_IMAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_image_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_IMAGE_SIZE, using default"),
            }
        }

        // -- Auto-reply --

        config.chat_templates_path = non_empty(var("CHAT_TEMPLATES_PATH")).map(PathBuf::from);
        config.embedding_index_path = non_empty(var("EMBEDDING_INDEX_PATH")).map(PathBuf::from);

        if let Some(val) = var("RULE_BASED_ENABLED") {
            config.rule_based_enabled = parse_flag(&val);
        }

        if let Some(val) = var("EMBEDDING_SEARCH_ENABLED") {
            config.embedding_search_enabled = parse_flag(&val);
        }

        if let Some(url) = non_empty(var("EMBEDDING_API_URL")) {
            config.embedding_api_url = url;
        }

        config.embedding_api_key = non_empty(var("EMBEDDING_API_KEY"));

        if let Some(model) = non_empty(var("EMBEDDING_MODEL")) {
            config.embedding_model = model;
        }

        if let Some(val) = var("EMBEDDING_THRESHOLD") {
            match val.parse::<f32>() {
                Ok(t) if t.is_finite() => config.embedding_threshold = t,
                _ => tracing::warn!(value = %val, "Invalid EMBEDDING_THRESHOLD, using default"),
            }
        }

        if let Some(val) = var("EMBEDDING_METRIC") {
            match val.parse::<SimilarityMetric>() {
                Ok(metric) => config.embedding_metric = metric,
                Err(e) => tracing::warn!(error = %e, "Invalid EMBEDDING_METRIC, using default"),
            }
        }

        if let Some(val) = var("EMBEDDING_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.embedding_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid EMBEDDING_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(msg) = non_empty(var("CHAT_FALLBACK_MESSAGE")) {
            config.fallback_message = msg;
        }

        // -- Secrets --

        config.admin_token = non_empty(var("ADMIN_TOKEN"));
        config.webhook_secret = non_empty(var("WEBHOOK_SECRET"));

        // -- Email --

        if let Some(url) = non_empty(var("EMAIL_API_URL")) {
            config.email_api_url = url;
        }
        config.email_api_key = non_empty(var("EMAIL_API_KEY"));
        if let Some(from) = non_empty(var("EMAIL_FROM")) {
            config.email_from = from;
        }
        config.notify_email = non_empty(var("NOTIFY_EMAIL"));

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// The embedding stage can only run with a key to call the API.
    pub fn embedding_stage_active(&self) -> bool {
        self.embedding_search_enabled && self.embedding_api_key.is_some()
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(secret: &Option<String>) -> &'static str {
            if secret.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("image_storage_path", &self.image_storage_path)
            .field("max_image_size", &self.max_image_size)
            .field("chat_templates_path", &self.chat_templates_path)
            .field("embedding_index_path", &self.embedding_index_path)
            .field("rule_based_enabled", &self.rule_based_enabled)
            .field("embedding_search_enabled", &self.embedding_search_enabled)
            .field("embedding_api_url", &self.embedding_api_url)
            .field("embedding_api_key", &redact(&self.embedding_api_key))
            .field("embedding_model", &self.embedding_model)
            .field("embedding_threshold", &self.embedding_threshold)
            .field("embedding_metric", &self.embedding_metric)
            .field("embedding_timeout", &self.embedding_timeout)
            .field("admin_token", &redact(&self.admin_token))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("email_api_url", &self.email_api_url)
            .field("email_api_key", &redact(&self.email_api_key))
            .field("email_from", &self.email_from)
            .field("notify_email", &self.notify_email)
            .finish()
    }
}

fn parse_flag(val: &str) -> bool {
    let val = val.trim();
    !(val.eq_ignore_ascii_case("false") || val == "0")
}

fn non_empty(val: Option<String>) -> Option<String> {
    val.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
