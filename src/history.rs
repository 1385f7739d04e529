use tracing::{debug, warn};

use crate::error::GatewayResult;
use crate::store::MessageStore;
use crate::types::{ChatMessage, Page};

/// Bookmark for backward pagination through one conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub next_page: u32,
    pub page_size: u32,
    pub exhausted: bool,
}

impl Cursor {
    fn starting_at(next_page: u32, page_size: u32) -> Self {
        Self {
            next_page,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    /// Record a fetched page. A short page means there is nothing older.
    fn advance(&mut self, fetched: usize) {
        self.next_page += 1;
        if fetched < self.page_size as usize {
            self.exhausted = true;
        }
    }
}

/// A page fetch that has been started but not yet merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub conversation_id: String,
    pub page: u32,
    pub page_size: u32,
}

/// Loads older message pages on demand and merges them into the store.
#[derive(Clone, Debug)]
pub struct HistoryLoader {
    conversation_id: Option<String>,
    cursor: Cursor,
    loading: bool,
}

impl HistoryLoader {
    pub fn new(page_size: u32) -> Self {
        Self {
            conversation_id: None,
            cursor: Cursor::starting_at(1, page_size),
            loading: false,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.conversation_id.is_some() && !self.cursor.exhausted
    }

    /// Point the loader at a conversation, resetting the cursor.
    ///
    /// `seeded` means the store already holds the newest page, so the next
    /// fetch starts at page two.
    pub fn bind(&mut self, conversation_id: Option<String>, seeded: bool) {
        let start = if seeded { 2 } else { 1 };
        debug!(conversation_id = ?conversation_id, start, "Binding history cursor");
        self.conversation_id = conversation_id;
        self.cursor = Cursor::starting_at(start, self.cursor.page_size);
        self.loading = false;
    }

    /// Bind a conversation that was just created by this tab; the store
    /// already holds all of it.
    pub fn bind_created(&mut self, conversation_id: String) {
        self.bind(Some(conversation_id), true);
        self.cursor.exhausted = true;
    }

    /// Start a fetch, or return `None` if one is in flight, the cursor is
    /// exhausted, or no conversation is bound.
    pub fn begin(&mut self) -> Option<PageRequest> {
        if self.loading || self.cursor.exhausted {
            return None;
        }
        let conversation_id = self.conversation_id.clone()?;
        self.loading = true;
        Some(PageRequest {
            conversation_id,
            page: self.cursor.next_page,
            page_size: self.cursor.page_size,
        })
    }

    /// Merge a fetched page. Returns the messages that were new to the store,
    /// oldest first, or `None` if the fetch failed or is stale.
    pub fn finish(
        &mut self,
        request: &PageRequest,
        result: GatewayResult<Page<ChatMessage>>,
        store: &mut MessageStore,
    ) -> Option<Vec<ChatMessage>> {
        if self.conversation_id.as_deref() != Some(request.conversation_id.as_str())
            || self.cursor.next_page != request.page
        {
            debug!(
                conversation_id = %request.conversation_id,
                page = request.page,
                "Discarding stale history page"
            );
            return None;
        }
        self.loading = false;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    conversation_id = %request.conversation_id,
                    page = request.page,
                    error = %err,
                    "Failed to load older messages"
                );
                return None;
            }
        };

        let fetched = page.items.len();
        self.cursor.advance(fetched);

        // Pages arrive newest first.
        let mut items = page.items;
        items.reverse();
        let inserted = store.prepend(items);
        debug!(
            conversation_id = %request.conversation_id,
            page = request.page,
            fetched,
            inserted = inserted.len(),
            exhausted = self.cursor.exhausted,
            "Merged older messages"
        );
        Some(inserted)
    }
}
