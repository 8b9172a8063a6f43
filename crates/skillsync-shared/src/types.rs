use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SharedError;

// User identity = account UUID issued by the auth provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChatRoomId(pub Uuid);

impl ChatRoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChatRoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChatRoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    #[default]
    User,
    Admin,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(SharedError::UnknownVariant {
                kind: "sender type",
                value: other.to_string(),
            }),
        }
    }
}

/// Which stage produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    RuleBased,
    EmbeddingSearch,
    StaffConfirming,
    #[default]
    HumanSupport,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::EmbeddingSearch => "embedding_search",
            Self::StaffConfirming => "staff_confirming",
            Self::HumanSupport => "human_support",
        }
    }

    /// Whether a message with this source was produced without a human.
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::RuleBased | Self::EmbeddingSearch)
    }
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageSource {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule_based" => Ok(Self::RuleBased),
            "embedding_search" => Ok(Self::EmbeddingSearch),
            "staff_confirming" => Ok(Self::StaffConfirming),
            "human_support" => Ok(Self::HumanSupport),
            other => Err(SharedError::UnknownVariant {
                kind: "message source",
                value: other.to_string(),
            }),
        }
    }
}
