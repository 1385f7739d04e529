//! In-process gateway double shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use time::{Duration, macros::datetime};

use gateway_console::api::{ConversationQuery, GatewayApi, TitleRequest, TurnRequest, TurnStream};
use gateway_console::error::{GatewayError, GatewayResult};
use gateway_console::registry::{ModelEntry, ModelRegistry};
use gateway_console::stream::StopHandle;
use gateway_console::types::{ChatMessage, Conversation, Page, Role};

/// How one model answers a turn.
#[derive(Clone, Debug)]
pub enum ModelScript {
    /// Raw body chunks, then the transport closes.
    Stream(Vec<String>),
    /// Raw body chunks, then the transport stays open forever.
    Hang(Vec<String>),
    /// The request fails before any body arrives.
    FailOpen(String),
}

impl ModelScript {
    pub fn reply(pieces: &[&str]) -> Self {
        let mut chunks: Vec<String> = pieces
            .iter()
            .map(|piece| format!("data: {}\n\n", serde_json::json!({ "content": piece })))
            .collect();
        chunks.push("data: [DONE]\n\n".to_string());
        ModelScript::Stream(chunks)
    }
}

#[derive(Default)]
pub struct FakeGateway {
    scripts: Mutex<HashMap<String, ModelScript>>,
    conversation_id: Mutex<Option<String>>,
    /// Stored ascending by creation time.
    history: Mutex<Vec<ChatMessage>>,
    fail_history: Mutex<bool>,
    title: Mutex<Option<String>>,
    fail_rename: Mutex<bool>,
    stop_at: Mutex<Option<(StopHandle, usize)>>,
    pub requests: Mutex<Vec<TurnRequest>>,
    pub renames: Mutex<Vec<(String, String)>>,
    pub send_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub title_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, model: &str, script: ModelScript) -> Self {
        self.set_model(model, script);
        self
    }

    /// Replace a model's script between turns.
    pub fn set_model(&self, model: &str, script: ModelScript) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(model.to_string(), script);
    }

    pub fn with_conversation(self, conversation_id: &str) -> Self {
        *self.conversation_id.lock().expect("conversation lock") =
            Some(conversation_id.to_string());
        self
    }

    pub fn with_history(self, messages: Vec<ChatMessage>) -> Self {
        *self.history.lock().expect("history lock") = messages;
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        *self.title.lock().expect("title lock") = Some(title.to_string());
        self
    }

    pub fn set_fail_history(&self, fail: bool) {
        *self.fail_history.lock().expect("history lock") = fail;
    }

    pub fn set_fail_rename(&self, fail: bool) {
        *self.fail_rename.lock().expect("rename lock") = fail;
    }

    /// Fire `handle` when body chunk `index` is pulled, before the chunk is
    /// handed over.
    pub fn stop_at_chunk(&self, handle: StopHandle, index: usize) {
        *self.stop_at.lock().expect("stop lock") = Some((handle, index));
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn history_fetches(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn title_requests(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }
}

fn body_of(chunks: Vec<String>) -> impl futures::Stream<Item = GatewayResult<Vec<u8>>> {
    stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into_bytes())))
}

#[async_trait]
impl GatewayApi for FakeGateway {
    async fn send_turn(&self, request: &TurnRequest) -> GatewayResult<TurnStream> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get(&request.model)
            .cloned()
            .unwrap_or_else(|| ModelScript::FailOpen(format!("unknown model {}", request.model)));

        let body = match script {
            ModelScript::FailOpen(reason) => return Err(GatewayError::Transport(reason)),
            ModelScript::Stream(chunks) => body_of(chunks).boxed(),
            ModelScript::Hang(chunks) => body_of(chunks).chain(stream::pending()).boxed(),
        };
        let body = match self.stop_at.lock().expect("stop lock").clone() {
            Some((handle, index)) => body
                .enumerate()
                .map(move |(n, chunk)| {
                    if n == index {
                        handle.stop();
                    }
                    chunk
                })
                .boxed(),
            None => body,
        };
        Ok(TurnStream {
            conversation_id: self.conversation_id.lock().expect("conversation lock").clone(),
            generation_id: Some(format!("gen-{}", request.model)),
            body,
        })
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> GatewayResult<Page<Conversation>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn list_messages(
        &self,
        _conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> GatewayResult<Page<ChatMessage>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_history.lock().expect("history lock") {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        let history = self.history.lock().expect("history lock");
        let skip = (page.saturating_sub(1) * page_size) as usize;
        let items: Vec<ChatMessage> = history
            .iter()
            .rev()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            total: history.len() as u64,
            page,
            page_size,
        })
    }

    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> GatewayResult<()> {
        if *self.fail_rename.lock().expect("rename lock") {
            return Err(GatewayError::Status {
                status: 500,
                body: "rename failed".into(),
            });
        }
        self.renames
            .lock()
            .expect("renames lock")
            .push((conversation_id.to_string(), title.to_string()));
        Ok(())
    }

    async fn delete_conversation(&self, _conversation_id: &str) -> GatewayResult<()> {
        Ok(())
    }

    async fn summarize_title(&self, _request: &TitleRequest) -> GatewayResult<String> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        self.title
            .lock()
            .expect("title lock")
            .clone()
            .ok_or_else(|| GatewayError::Status {
                status: 503,
                body: "summarizer offline".into(),
            })
    }

    async fn list_models(&self) -> GatewayResult<Vec<ModelEntry>> {
        Ok(Vec::new())
    }
}

/// `count` alternating user/assistant messages with ids `m1..=m{count}`,
/// one minute apart.
pub fn conversation_history(count: u32) -> Vec<ChatMessage> {
    (1..=count)
        .map(|n| {
            let mut message = if n % 2 == 1 {
                ChatMessage::user(format!("question {n}"))
            } else {
                ChatMessage::assistant("m1", format!("answer {n}"))
            };
            message.id = format!("m{n}");
            message.created_at = datetime!(2024-05-01 09:00 UTC) + Duration::minutes(n as i64);
            message
        })
        .collect()
}

pub fn registry(models: &[&str]) -> ModelRegistry {
    ModelRegistry::new(models.iter().map(|name| ModelEntry::chat(*name, "test")))
}

pub fn ids(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

pub fn assistant_replies(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect()
}
