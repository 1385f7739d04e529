use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

/// A committed chat message. Only `rating` and `feedback` change after it
/// lands in a [`MessageStore`](crate::store::MessageStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Correlation tag shared by the replies of one multi-model turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl ChatMessage {
    /// Optimistic user message with a locally generated id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            model_id: None,
            reasoning_text: None,
            created_at: OffsetDateTime::now_utc(),
            rating: None,
            feedback: None,
            generation_id: None,
            group_id: None,
        }
    }

    pub fn assistant(model_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            model_id: Some(model_id.into()),
            reasoning_text: None,
            created_at: OffsetDateTime::now_utc(),
            rating: None,
            feedback: None,
            generation_id: None,
            group_id: None,
        }
    }
}

/// Cached projection of a backend conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Paginated envelope shared by every list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// Sampling knobs forwarded verbatim next to the turn text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

fn default_history_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

/// Persisted state of one open playground tab.
///
/// Messages are not part of it; they are fetched again from the backend
/// when the tab is reopened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Last known title of the bound conversation. `None` when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub selected_model_ids: Vec<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    #[serde(default)]
    pub scroll_position: Option<f64>,
}

impl Tab {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: None,
            title: None,
            selected_model_ids: Vec::new(),
            temperature: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            scroll_position: None,
        }
    }

    pub fn for_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::new()
        }
    }

    /// A tab for a conversation whose title is already known.
    pub fn for_titled_conversation(
        conversation_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::for_conversation(conversation_id)
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            history_limit: Some(self.history_limit),
            ..GenerationConfig::default()
        }
    }
}

impl Default for Tab {
    fn default() -> Self {
        Self::new()
    }
}
