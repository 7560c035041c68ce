//! Domain models for conversations, turns and the user profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "Nouvelle conversation";

/// Fixed key of the singleton user profile record.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// A titled, timestamped voice-chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub personality_id: Option<String>,
    pub voice_name: Option<String>,
    pub summary: Option<String>,
}

/// Fields accepted when creating a conversation. Anything left `None` is
/// filled in by the store.
#[derive(Debug, Clone, Default)]
pub struct NewConversation {
    pub id: Option<String>,
    pub title: Option<String>,
    pub personality_id: Option<String>,
    pub voice_name: Option<String>,
    pub summary: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update of a conversation. `Some` replaces the stored value.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub personality_id: Option<String>,
    pub voice_name: Option<String>,
    pub summary: Option<String>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }

    /// Parse a role name, accepting the aliases chat exports commonly use.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "human" => Some(TurnRole::User),
            "assistant" | "model" | "ai" | "bot" => Some(TurnRole::Assistant),
            "system" => Some(TurnRole::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the text of a turn came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnSource {
    /// Transcribed from the microphone.
    Speech,
    /// Emitted by the generative model.
    Model,
}

impl TurnSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnSource::Speech => "speech",
            TurnSource::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "speech" => Some(TurnSource::Speech),
            "model" => Some(TurnSource::Model),
            _ => None,
        }
    }
}

impl std::fmt::Display for TurnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance within a conversation. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub conversation_id: String,
    pub role: TurnRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TurnSource>,
    #[serde(default = "default_true")]
    pub is_final: bool,
}

/// A turn to be appended. `id` and `created_at` are assigned when absent.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub id: Option<String>,
    pub conversation_id: String,
    pub role: TurnRole,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub source: Option<TurnSource>,
    pub is_final: bool,
}

impl NewTurn {
    pub fn new(conversation_id: impl Into<String>, role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            id: None,
            conversation_id: conversation_id.into(),
            role,
            text: text.into(),
            created_at: None,
            source: None,
            is_final: true,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: TurnSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Mark the turn as an interim transcription.
    #[must_use]
    pub fn partial(mut self) -> Self {
        self.is_final = false;
        self
    }
}

/// Singleton record of user display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub timezone: Option<String>,
    pub preferences: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fields to merge over the stored profile. `None` keeps the existing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub timezone: Option<String>,
    pub preferences: Option<String>,
}

/// Conversation with all its turns, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationWithTurns {
    pub meta: Conversation,
    pub turns: Vec<Turn>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
