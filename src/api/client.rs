use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ConversationQuery, GatewayApi, TitleRequest, TurnRequest, TurnStream};
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::registry::ModelEntry;
use crate::types::{ChatMessage, Conversation, Page};

const CONVERSATION_HEADER: &str = "x-conversation-id";
const GENERATION_HEADER: &str = "x-generation-id";

/// reqwest client for the gateway's REST + streaming endpoints.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config.base_url.clone(), config.api_key.clone())
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/conversations/{id}/...` with every segment percent-encoded, so an
    /// id holding `/`, `?` or `#` stays one path segment.
    fn conversation_url(&self, conversation_id: &str, rest: &[&str]) -> GatewayResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| GatewayError::Transport(format!("invalid base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Transport(format!("base url cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "conversations", conversation_id])
            .extend(rest);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn ensure_success(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let response = self.authorize(request).send().await?;
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> GatewayResult<()> {
        let response = self.authorize(request).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TitleResponse {
    Object { title: String },
    Plain(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelsResponse {
    Page(Page<ModelEntry>),
    List(Vec<ModelEntry>),
}

#[async_trait]
impl GatewayApi for HttpGateway {
    async fn send_turn(&self, request: &TurnRequest) -> GatewayResult<TurnStream> {
        debug!(model = %request.model, "Opening chat stream");
        let builder = self
            .client
            .post(self.url("/api/playground/chat"))
            .header("accept", "text/event-stream")
            .json(request);
        let response = self.authorize(builder).send().await?;
        let response = Self::ensure_success(response).await?;

        let conversation_id = header_value(&response, CONVERSATION_HEADER);
        let generation_id = header_value(&response, GENERATION_HEADER);
        let body = response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(GatewayError::from))
            .boxed();

        Ok(TurnStream {
            conversation_id,
            generation_id,
            body,
        })
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> GatewayResult<Page<Conversation>> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("pageSize", query.page_size.to_string()),
            ("sort", "updatedAt".to_string()),
            ("order", "desc".to_string()),
        ];
        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            params.push(("keyword", keyword.trim().to_string()));
        }
        let request = self
            .client
            .get(self.url("/api/conversations"))
            .query(&params);
        self.get_json(request).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> GatewayResult<Page<ChatMessage>> {
        let request = self
            .client
            .get(self.conversation_url(conversation_id, &["messages"])?)
            .query(&[
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
                ("sort", "createdAt".to_string()),
                ("order", "desc".to_string()),
            ]);
        self.get_json(request).await
    }

    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> GatewayResult<()> {
        let request = self
            .client
            .patch(self.conversation_url(conversation_id, &[])?)
            .json(&serde_json::json!({ "title": title }));
        self.send_empty(request).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> GatewayResult<()> {
        let request = self
            .client
            .delete(self.conversation_url(conversation_id, &[])?);
        self.send_empty(request).await
    }

    async fn summarize_title(&self, request: &TitleRequest) -> GatewayResult<String> {
        let builder = self
            .client
            .post(self.url("/api/conversations/title"))
            .json(request);
        let parsed: TitleResponse = self.get_json(builder).await?;
        Ok(match parsed {
            TitleResponse::Object { title } => title,
            TitleResponse::Plain(title) => title,
        })
    }

    async fn list_models(&self) -> GatewayResult<Vec<ModelEntry>> {
        let request = self.client.get(self.url("/api/models"));
        let parsed: ModelsResponse = self.get_json(request).await?;
        Ok(match parsed {
            ModelsResponse::Page(page) => page.items,
            ModelsResponse::List(items) => items,
        })
    }
}
