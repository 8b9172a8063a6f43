//! Keyword matcher over the canned-answer table.
//!
//! Templates are scanned in file order and the first one with a keyword
//! contained in the lower-cased message wins, even if a later template would
//! match more keywords.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReplyError, Result};

const BUILTIN_TEMPLATES: &str = include_str!("../data/chat_templates.json");

/// One canned answer and the keywords that trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTemplate {
    pub keywords: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    templates: Vec<ChatTemplate>,
}

/// Immutable, ordered template table.
#[derive(Debug, Clone)]
pub struct RuleBasedMatcher {
    templates: Arc<[ChatTemplate]>,
}

impl RuleBasedMatcher {
    /// Build a matcher. Keywords are lower-cased and blank ones dropped so
    /// that an empty keyword cannot match every message.
    pub fn new(templates: Vec<ChatTemplate>) -> Self {
        let templates: Vec<ChatTemplate> = templates
            .into_iter()
            .map(|t| ChatTemplate {
                keywords: t
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                answer: t.answer,
            })
            .collect();

        Self {
            templates: templates.into(),
        }
    }

    /// Parse a `{ "templates": [...] }` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: TemplateFile = serde_json::from_str(json)?;
        if let Some(pos) = file.templates.iter().position(|t| t.answer.trim().is_empty()) {
            return Err(ReplyError::InvalidData(format!(
                "template #{pos} has an empty answer"
            )));
        }
        Ok(Self::new(file.templates))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Templates shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_TEMPLATES)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// First template with a keyword occurring in `message`.
    pub fn find(&self, message: &str) -> Option<&ChatTemplate> {
        let lowered = message.to_lowercase();
        self.templates
            .iter()
            .find(|t| t.keywords.iter().any(|k| lowered.contains(k.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(keywords: &[&str], answer: &str) -> ChatTemplate {
        ChatTemplate {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            answer: answer.to_string(),
        }
    }

    #[test]
    fn matches_case_insensitively() {
        let matcher = RuleBasedMatcher::new(vec![template(&["Refund"], "refund answer")]);
        let hit = matcher.find("How do I get a REFUND?").unwrap();
        assert_eq!(hit.answer, "refund answer");
    }

    #[test]
    fn first_template_wins() {
        let matcher = RuleBasedMatcher::new(vec![
            template(&["order"], "orders"),
            template(&["order", "refund"], "refunds"),
        ]);
        assert_eq!(matcher.find("refund my order").unwrap().answer, "orders");
    }

    #[test]
    fn no_match_is_none() {
        let matcher = RuleBasedMatcher::new(vec![template(&["refund"], "x")]);
        assert!(matcher.find("what courses do you have?").is_none());
    }

    #[test]
    fn blank_keywords_never_match() {
        let matcher = RuleBasedMatcher::new(vec![template(&["", "   "], "everything")]);
        assert!(matcher.find("anything at all").is_none());
    }

    #[test]
    fn builtin_templates_load() {
        let matcher = RuleBasedMatcher::builtin().unwrap();
        assert!(!matcher.is_empty());
        assert!(matcher.find("I forgot my password").is_some());
    }

    #[test]
    fn empty_answer_is_rejected() {
        let json = r#"{"templates":[{"keywords":["a"],"answer":" "}]}"#;
        assert!(matches!(
            RuleBasedMatcher::from_json_str(json),
            Err(ReplyError::InvalidData(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        std::fs::write(
            &path,
            r#"{"templates":[{"keywords":["hours"],"answer":"We answer 9-18 JST."}]}"#,
        )
        .unwrap();
        let matcher = RuleBasedMatcher::from_path(&path).unwrap();
        assert_eq!(matcher.len(), 1);
        assert_eq!(matcher.find("opening hours?").unwrap().answer, "We answer 9-18 JST.");
    }
}
