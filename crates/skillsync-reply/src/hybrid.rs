//! Three-stage auto-reply resolution.
//!
//! 1. keyword match (if enabled)
//! 2. embedding search (if enabled and stage 1 found nothing)
//! 3. hand-off to staff, always reachable
//!
//! The chain short-circuits: once a stage answers, later stages never run.

use serde::{Deserialize, Serialize};
use skillsync_shared::constants::STAFF_CONFIRMING_MESSAGE;
use skillsync_shared::MessageSource;
use tracing::debug;

use crate::embedding::EmbeddingMatcher;
use crate::rule_based::RuleBasedMatcher;

/// Stage switches and the hand-off text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridConfig {
    pub rule_based_enabled: bool,
    pub embedding_enabled: bool,
    pub fallback_message: String,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rule_based_enabled: true,
            embedding_enabled: false,
            fallback_message: STAFF_CONFIRMING_MESSAGE.to_string(),
        }
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridReply {
    pub answer: String,
    pub source: MessageSource,
    pub is_auto_reply: bool,
}

pub struct HybridResolver {
    config: HybridConfig,
    rule_based: RuleBasedMatcher,
    embedding: Option<EmbeddingMatcher>,
}

impl HybridResolver {
    /// `embedding` may be `None` when no provider is configured; the
    /// embedding stage is then skipped regardless of the flag.
    pub fn new(
        config: HybridConfig,
        rule_based: RuleBasedMatcher,
        embedding: Option<EmbeddingMatcher>,
    ) -> Self {
        Self {
            config,
            rule_based,
            embedding,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub async fn resolve(&self, message: &str) -> HybridReply {
        if self.config.rule_based_enabled {
            if let Some(template) = self.rule_based.find(message) {
                debug!("answered by keyword template");
                return HybridReply {
                    answer: template.answer.clone(),
                    source: MessageSource::RuleBased,
                    is_auto_reply: true,
                };
            }
        }

        if self.config.embedding_enabled {
            if let Some(matcher) = &self.embedding {
                if let Some(hit) = matcher.find(message).await {
                    debug!(score = hit.score, "answered by embedding search");
                    return HybridReply {
                        answer: hit.answer,
                        source: MessageSource::EmbeddingSearch,
                        is_auto_reply: true,
                    };
                }
            }
        }

        debug!("no confident answer, handing off to staff");
        HybridReply {
            answer: self.config.fallback_message.clone(),
            source: MessageSource::StaffConfirming,
            is_auto_reply: false,
        }
    }
}
