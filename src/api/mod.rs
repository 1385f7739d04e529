/// Gateway backend interface
///
/// The playground engine only talks to the backend through [`GatewayApi`],
/// so the streaming, pagination and title logic can run against the real
/// HTTP gateway or an in-process fake.
///
/// # Architecture
///
/// - `client` - reqwest implementation of [`GatewayApi`]
///
/// # Usage
///
/// ```rust,no_run
/// use gateway_console::api::{GatewayApi, HttpGateway};
/// use gateway_console::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let gateway = HttpGateway::new(&Config::from_env());
/// let models = gateway.list_models().await?;
/// # Ok(())
/// # }
/// ```
mod client;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::registry::ModelEntry;
use crate::types::{ChatMessage, Conversation, GenerationConfig, Page};

pub use client::HttpGateway;

/// Body of one "send turn" request to one model.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub model: String,
    #[serde(flatten)]
    pub config: GenerationConfig,
}

/// An opened chat response: headers already read, body still streaming.
pub struct TurnStream {
    pub conversation_id: Option<String>,
    pub generation_id: Option<String>,
    pub body: BoxStream<'static, GatewayResult<Vec<u8>>>,
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("conversation_id", &self.conversation_id)
            .field("generation_id", &self.generation_id)
            .finish_non_exhaustive()
    }
}

/// Filter for the conversation list, newest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationQuery {
    pub page: u32,
    pub page_size: u32,
    pub keyword: Option<String>,
}

impl Default for ConversationQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            keyword: None,
        }
    }
}

/// Input for title summarization: the first exchange of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRequest {
    pub model: String,
    pub user_message: String,
    pub assistant_message: String,
}

#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Open a streamed reply for one model.
    async fn send_turn(&self, request: &TurnRequest) -> GatewayResult<TurnStream>;

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> GatewayResult<Page<Conversation>>;

    /// One page of messages, newest first. Pages are 1-based.
    async fn list_messages(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> GatewayResult<Page<ChatMessage>>;

    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> GatewayResult<()>;

    async fn delete_conversation(&self, conversation_id: &str) -> GatewayResult<()>;

    async fn summarize_title(&self, request: &TitleRequest) -> GatewayResult<String>;

    async fn list_models(&self) -> GatewayResult<Vec<ModelEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_request_flattens_generation_config() {
        let request = TurnRequest {
            message: "Hello".into(),
            conversation_id: None,
            group_id: Some("g-1".into()),
            model: "m1".into(),
            config: GenerationConfig {
                temperature: Some(0.5),
                history_limit: Some(10),
                ..GenerationConfig::default()
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "Hello");
        assert_eq!(json["groupId"], "g-1");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["historyLimit"], 10);
        assert!(json.get("conversationId").is_none());
        assert!(json.get("maxTokens").is_none());
    }
}
