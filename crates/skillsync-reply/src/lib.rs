//! # skillsync-reply
//!
//! Auto-responder for the support chat: a keyword matcher over canned
//! answers, an embedding nearest-neighbour matcher, and the hybrid resolver
//! that chains them before handing the conversation to staff.

pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod rule_based;

pub use embedding::{
    EmbeddingIndex, EmbeddingMatch, EmbeddingMatcher, EmbeddingProvider, HttpEmbeddingProvider,
    SimilarityMetric,
};
pub use error::ReplyError;
pub use hybrid::{HybridConfig, HybridReply, HybridResolver};
pub use rule_based::{ChatTemplate, RuleBasedMatcher};
