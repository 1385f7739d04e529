use std::collections::HashSet;

use tracing::debug;

use crate::types::{ChatMessage, Rating, Role};

/// Optimistically inserted message awaiting commit or revert.
#[must_use = "a staged message must be committed or reverted"]
#[derive(Debug, PartialEq, Eq)]
pub struct StagedMessage {
    id: String,
}

impl StagedMessage {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Committed history of one playground tab.
///
/// Messages are unique by id and kept in ascending `created_at` order;
/// messages sharing a timestamp keep the order they were inserted in.
/// In-flight replies never live here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    ids: HashSet<String>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut store = Self::new();
        store.prepend(messages.into_iter().collect());
        store
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|msg| msg.id == id)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last().map(|msg| msg.id.as_str())
    }

    /// Insert a newer message. Returns false if the id is already present.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if self.ids.contains(&message.id) {
            debug!(id = %message.id, "Ignoring duplicate message");
            return false;
        }
        let pos = self
            .messages
            .partition_point(|existing| existing.created_at <= message.created_at);
        self.ids.insert(message.id.clone());
        self.messages.insert(pos, message);
        true
    }

    /// Merge an older page in front of the current history.
    ///
    /// Messages whose id is already present (page overlap) are dropped.
    /// Returns the messages that were actually inserted, oldest first.
    pub fn prepend(&mut self, page: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut fresh: Vec<ChatMessage> = Vec::with_capacity(page.len());
        let mut seen: HashSet<String> = HashSet::new();
        for message in page {
            if self.ids.contains(&message.id) || !seen.insert(message.id.clone()) {
                continue;
            }
            fresh.push(message);
        }
        if fresh.is_empty() {
            return fresh;
        }
        fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let existing = std::mem::take(&mut self.messages);
        let mut merged = Vec::with_capacity(existing.len() + fresh.len());
        let mut older = fresh.iter().cloned().peekable();
        for message in existing {
            while let Some(candidate) = older.next_if(|c| c.created_at <= message.created_at) {
                merged.push(candidate);
            }
            merged.push(message);
        }
        merged.extend(older);

        self.ids.extend(fresh.iter().map(|msg| msg.id.clone()));
        self.messages = merged;
        fresh
    }

    /// Optimistically append a message that may later be reverted.
    pub fn stage(&mut self, message: ChatMessage) -> StagedMessage {
        let id = message.id.clone();
        self.append(message);
        StagedMessage { id }
    }

    /// Keep a staged message permanently.
    pub fn commit(&mut self, staged: StagedMessage) {
        debug!(id = %staged.id, "Committed staged message");
    }

    /// Remove a staged message, returning it if it was still present.
    pub fn revert(&mut self, staged: StagedMessage) -> Option<ChatMessage> {
        self.remove(&staged.id)
    }

    fn remove(&mut self, id: &str) -> Option<ChatMessage> {
        let pos = self.messages.iter().position(|msg| msg.id == id)?;
        self.ids.remove(id);
        Some(self.messages.remove(pos))
    }

    pub fn set_rating(&mut self, id: &str, rating: Option<Rating>) -> bool {
        match self.messages.iter_mut().find(|msg| msg.id == id) {
            Some(msg) => {
                msg.rating = rating;
                true
            }
            None => false,
        }
    }

    pub fn set_feedback(&mut self, id: &str, feedback: Option<String>) -> bool {
        match self.messages.iter_mut().find(|msg| msg.id == id) {
            Some(msg) => {
                msg.feedback = feedback.filter(|text| !text.trim().is_empty());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// First user message and the first assistant reply after it with at
    /// least `min_chars` characters of trimmed content.
    pub fn first_exchange(&self, min_chars: usize) -> Option<(&ChatMessage, &ChatMessage)> {
        let user_pos = self.messages.iter().position(|msg| msg.role == Role::User)?;
        let user = &self.messages[user_pos];
        let assistant = self.messages[user_pos + 1..].iter().find(|msg| {
            msg.role == Role::Assistant && msg.content.trim().chars().count() >= min_chars
        })?;
        Some((user, assistant))
    }
}
