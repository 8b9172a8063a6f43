//! # skillsync-server
//!
//! Customer-support backend for the Skill Sync store.
//!
//! This binary provides:
//! - **Support chat** with one persistent room per customer and an
//!   append-only message history
//! - **Hybrid auto-reply**: keyword templates, then embedding search, then a
//!   hand-off to staff
//! - **Staff console API** for browsing rooms and answering customers
//! - **Review webhooks** (HMAC-signed) that notify staff and clean up images
//! - **Image storage** for review photos, content-addressed on disk

mod api;
mod auth;
mod config;
mod error;
mod image_store;
mod mailer;
mod store;
mod webhooks;

use std::sync::Arc;

use anyhow::Context;
use skillsync_reply::{
    EmbeddingIndex, EmbeddingMatcher, HttpEmbeddingProvider, HybridConfig, HybridResolver,
    RuleBasedMatcher,
};
use skillsync_shared::constants::APP_NAME;
use skillsync_store::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::image_store::ImageStore;
use crate::mailer::{HttpMailer, Mailer};
use crate::store::StoreHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skillsync_server=debug")),
        )
        .init();

    info!("Starting {} support server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path).with_context(|| {
        format!("failed to open database at {}", config.database_path.display())
    })?;
    info!(path = ?db.path(), "Database ready");
    let purged = db.purge_expired_sessions(chrono::Utc::now())?;
    if purged > 0 {
        info!(purged, "Removed expired sessions");
    }
    let store = StoreHandle::new(db);

    let resolver = Arc::new(build_resolver(&config)?);

    let images = Arc::new(
        ImageStore::new(config.image_storage_path.clone(), config.max_image_size).await?,
    );

    let mailer: Option<Arc<dyn Mailer>> = match &config.email_api_key {
        Some(key) => Some(Arc::new(HttpMailer::new(
            config.email_api_url.clone(),
            key.clone(),
        )?)),
        None => {
            warn!("EMAIL_API_KEY not set, review notifications disabled");
            None
        }
    };

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        resolver,
        images,
        mailer,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn build_resolver(config: &ServerConfig) -> anyhow::Result<HybridResolver> {
    let templates = match &config.chat_templates_path {
        Some(path) => RuleBasedMatcher::from_path(path)
            .with_context(|| format!("failed to load chat templates from {}", path.display()))?,
        None => RuleBasedMatcher::builtin()?,
    };
    info!(templates = templates.len(), "Loaded chat templates");

    let embedding = if config.embedding_stage_active() {
        let index = match &config.embedding_index_path {
            Some(path) => EmbeddingIndex::from_path(path).with_context(|| {
                format!("failed to load embedding index from {}", path.display())
            })?,
            None => EmbeddingIndex::new(Vec::new())?,
        };
        info!(
            entries = index.len(),
            dimensions = index.dimensions(),
            metric = %config.embedding_metric,
            threshold = config.embedding_threshold,
            "Embedding search enabled"
        );

        let provider = HttpEmbeddingProvider::new(
            config.embedding_api_url.clone(),
            config.embedding_api_key.clone().unwrap_or_default(),
            config.embedding_model.clone(),
            config.embedding_timeout,
        )?;

        Some(EmbeddingMatcher::new(
            Arc::new(provider),
            Arc::new(index),
            config.embedding_threshold,
            config.embedding_metric,
        ))
    } else {
        if config.embedding_search_enabled {
            warn!("EMBEDDING_SEARCH_ENABLED is set but EMBEDDING_API_KEY is missing, skipping stage");
        }
        None
    };

    let hybrid = HybridConfig {
        rule_based_enabled: config.rule_based_enabled,
        embedding_enabled: embedding.is_some(),
        fallback_message: config.fallback_message.clone(),
    };

    Ok(HybridResolver::new(hybrid, templates, embedding))
}
