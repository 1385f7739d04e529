//! One playground tab session.
//!
//! [`Playground`] is the single writer for a tab: it owns the message store,
//! the history cursor, the scroll anchor and the title guard, and drives the
//! dispatcher. Views call the phased methods (`begin_*`/`finish_*`) so no
//! borrow is held across an await; headless callers use the async helpers.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::api::GatewayApi;
use crate::config::Config;
use crate::error::{GatewayResult, SendError};
use crate::history::{HistoryLoader, PageRequest};
use crate::registry::ModelRegistry;
use crate::scroll::{HistoryState, ScrollAnchor, ScrollCommand, Viewport};
use crate::store::{MessageStore, StagedMessage};
use crate::stream::{ChannelUpdate, Dispatcher, PreparedTurn, Settlement, StopHandle, TurnOutcome};
use crate::title::{TitleContext, TitleGenerator, TitleJob, TitleUpdate};
use crate::types::{ChatMessage, Page, Rating, Tab};

pub struct Playground {
    api: Arc<dyn GatewayApi>,
    config: Config,
    tab: Tab,
    title: String,
    store: MessageStore,
    history: HistoryLoader,
    scroll: ScrollAnchor,
    titles: TitleGenerator,
    dispatcher: Dispatcher,
    input: String,
    last_error: Option<String>,
    stop: Option<StopHandle>,
    title_tx: UnboundedSender<TitleUpdate>,
    title_rx: UnboundedReceiver<TitleUpdate>,
}

impl Playground {
    pub fn new(api: Arc<dyn GatewayApi>, config: Config, tab: Tab) -> Self {
        let mut history = HistoryLoader::new(config.page_size);
        history.bind(tab.conversation_id.clone(), false);
        let mut titles = TitleGenerator::new();
        // A restored conversation whose title is unknown may already be named
        // on the backend; never overwrite it.
        if let (Some(conversation_id), None) = (&tab.conversation_id, &tab.title) {
            titles.skip(conversation_id);
        }
        let (title_tx, title_rx) = unbounded_channel();
        Self {
            api,
            config,
            title: tab.title.clone().unwrap_or_default(),
            tab,
            store: MessageStore::new(),
            history,
            scroll: ScrollAnchor::new(),
            titles,
            dispatcher: Dispatcher::new(),
            input: String::new(),
            last_error: None,
            stop: None,
            title_tx,
            title_rx,
        }
    }

    pub fn api(&self) -> Arc<dyn GatewayApi> {
        Arc::clone(&self.api)
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.tab.conversation_id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.tab.title = Some(self.title.clone());
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    pub fn history(&self) -> &HistoryLoader {
        &self.history
    }

    pub fn scroll(&self) -> &ScrollAnchor {
        &self.scroll
    }

    pub fn scroll_mut(&mut self) -> &mut ScrollAnchor {
        &mut self.scroll
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn is_sending(&self) -> bool {
        self.dispatcher.is_sending()
    }

    /// Seed the store with the newest page fetched by whoever opened the tab.
    /// The cursor then starts at the second page.
    pub fn seed(&mut self, newest_first: Vec<ChatMessage>) {
        let mut messages = newest_first;
        messages.reverse();
        self.store = MessageStore::from_messages(messages);
        self.history
            .bind(self.tab.conversation_id.clone(), !self.store.is_empty());
        debug!(
            conversation_id = ?self.tab.conversation_id,
            seeded = self.store.len(),
            "Seeded playground"
        );
    }

    // ============================================
    // Model selection and settings
    // ============================================

    /// Keep only chat models the registry knows about.
    pub fn select_models(&mut self, registry: &ModelRegistry, model_ids: &[String]) {
        self.tab.selected_model_ids = registry.filter_selectable(model_ids);
    }

    pub fn selected_models(&self) -> &[String] {
        &self.tab.selected_model_ids
    }

    pub fn set_temperature(&mut self, temperature: Option<f32>) {
        self.tab.temperature = temperature.map(|t| t.clamp(0.0, 2.0));
    }

    pub fn set_history_limit(&mut self, limit: u32) {
        self.tab.history_limit = limit;
    }

    // ============================================
    // Sending
    // ============================================

    /// Validate the compose box and stage the user message. The input is
    /// cleared on success; validation errors are recorded for display.
    pub fn begin_send(&mut self) -> Result<(PreparedTurn, StagedMessage), SendError> {
        let turn = match self.dispatcher.begin(
            &self.input,
            &self.tab.selected_model_ids,
            self.tab.conversation_id.as_deref(),
            &self.tab.generation_config(),
        ) {
            Ok(turn) => turn,
            Err(err) => {
                if err.is_validation() {
                    self.last_error = Some(err.to_string());
                }
                return Err(err);
            }
        };
        let staged = self.store.stage(turn.user_message().clone());
        self.stop = Some(turn.stop_handle());
        self.input.clear();
        self.last_error = None;
        Ok((turn, staged))
    }

    /// Apply a finished turn. A conversation created by this turn is bound
    /// to the tab.
    pub fn finish_send(&mut self, outcome: TurnOutcome, staged: StagedMessage) -> Settlement {
        self.stop = None;
        let settlement = self.dispatcher.settle(outcome, staged, &mut self.store);
        match &settlement {
            Settlement::Committed {
                failures,
                conversation_id,
                ..
            } => {
                if let Some(id) = conversation_id.as_ref().filter(|_| self.tab.conversation_id.is_none()) {
                    info!(conversation_id = %id, "Bound new conversation");
                    self.tab.conversation_id = Some(id.clone());
                    self.tab.title = Some(self.title.clone());
                    self.history.bind_created(id.clone());
                }
                self.last_error = (!failures.is_empty()).then(|| {
                    failures
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                });
            }
            Settlement::RolledBack {
                restored_input,
                error,
            } => {
                self.input = restored_input.clone();
                self.last_error = error.as_ref().map(ToString::to_string);
            }
        }
        settlement
    }

    /// Send the compose box to every selected model and wait for all of them.
    /// Title generation is spawned on the tokio runtime when eligible.
    pub async fn send(
        &mut self,
        updates: Option<UnboundedSender<ChannelUpdate>>,
    ) -> Result<Settlement, SendError> {
        let (turn, staged) = self.begin_send()?;
        let api = Arc::clone(&self.api);
        let outcome = turn.run(api.as_ref(), updates).await;
        let settlement = self.finish_send(outcome, staged);
        self.spawn_title_generation();
        Ok(settlement)
    }

    /// Abort the in-flight turn, if any.
    pub fn stop(&self) {
        if let Some(stop) = &self.stop {
            info!("Stopping in-flight turn");
            stop.stop();
        }
    }

    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.stop.clone()
    }

    // ============================================
    // Titles
    // ============================================

    /// Claim title generation for the bound conversation if it is eligible.
    pub fn title_job(&mut self) -> Option<TitleJob> {
        let ctx = TitleContext {
            conversation_id: self.tab.conversation_id.as_deref(),
            current_title: &self.title,
            store: &self.store,
            sending: self.dispatcher.is_sending(),
            model_override: self.config.title_model.as_deref(),
        };
        self.titles.try_start(ctx)
    }

    /// Run an eligible title job in the background. Results arrive through
    /// [`next_title_update`](Self::next_title_update).
    pub fn spawn_title_generation(&mut self) -> bool {
        let Some(job) = self.title_job() else {
            return false;
        };
        let api = Arc::clone(&self.api);
        let tx = self.title_tx.clone();
        tokio::spawn(async move {
            if let Some(update) = job.run(api.as_ref()).await {
                let _ = tx.send(update);
            }
        });
        true
    }

    /// Apply a finished title. Updates for another conversation are ignored.
    pub fn apply_title(&mut self, update: &TitleUpdate) -> bool {
        if self.tab.conversation_id.as_deref() != Some(update.conversation_id.as_str()) {
            return false;
        }
        self.set_title(update.title.clone());
        true
    }

    pub async fn next_title_update(&mut self) -> Option<TitleUpdate> {
        let update = self.title_rx.recv().await?;
        self.apply_title(&update);
        Some(update)
    }

    // ============================================
    // History and scrolling
    // ============================================

    /// Record a scroll observation; true means older history should load.
    pub fn on_scroll(&mut self, viewport: Viewport) -> bool {
        let state = HistoryState {
            has_more: self.history.has_more(),
            loading: self.history.is_loading(),
        };
        self.scroll.on_scroll(viewport, state)
    }

    pub fn begin_history_page(&mut self) -> Option<PageRequest> {
        let request = self.history.begin();
        if request.is_none() {
            self.scroll.cancel_prepend();
        }
        request
    }

    /// Merge a fetched page. The scroll anchor is released when nothing was
    /// inserted, otherwise it waits for [`after_layout`](Self::after_layout).
    pub fn finish_history_page(
        &mut self,
        request: &PageRequest,
        result: GatewayResult<Page<ChatMessage>>,
    ) -> Option<Vec<ChatMessage>> {
        let inserted = self.history.finish(request, result, &mut self.store);
        if inserted.as_ref().is_none_or(Vec::is_empty) {
            self.scroll.cancel_prepend();
        }
        inserted
    }

    pub async fn load_older_page(&mut self) -> Option<Vec<ChatMessage>> {
        let request = self.begin_history_page()?;
        let result = self
            .api
            .list_messages(&request.conversation_id, request.page, request.page_size)
            .await;
        self.finish_history_page(&request, result)
    }

    /// Layout settled after a render: keep the prepend anchor in place, or
    /// follow new content while stuck to the bottom.
    pub fn after_layout(&mut self, viewport: Viewport) -> Option<ScrollCommand> {
        if self.scroll.is_anchoring() {
            return self.scroll.after_prepend(viewport);
        }
        if let Some(command) = self.scroll.on_last_message(self.store.last_id()) {
            return Some(command);
        }
        self.scroll.on_content_resized(viewport)
    }

    pub fn restore_scroll(&mut self) -> ScrollCommand {
        let saved = self.tab.scroll_position;
        self.scroll.restore(saved, self.store.last_id())
    }

    /// Save the scroll offset into the tab before the view goes away.
    pub fn persist_scroll(&mut self) -> &Tab {
        self.tab.scroll_position = self.scroll.persisted_position();
        &self.tab
    }

    // ============================================
    // User edits
    // ============================================

    pub fn rate(&mut self, message_id: &str, rating: Option<Rating>) -> bool {
        self.store.set_rating(message_id, rating)
    }

    pub fn set_feedback(&mut self, message_id: &str, feedback: Option<String>) -> bool {
        self.store.set_feedback(message_id, feedback)
    }

    /// Start over in the same tab with a fresh, unbound conversation.
    pub fn clear(&mut self) {
        if self.dispatcher.is_sending() {
            warn!("Ignoring clear while a turn is in flight");
            return;
        }
        self.store.clear();
        self.tab.conversation_id = None;
        self.tab.scroll_position = None;
        self.tab.title = None;
        self.title.clear();
        self.history.bind(None, false);
        self.scroll = ScrollAnchor::new();
        self.last_error = None;
    }

    /// Rename locally at once, then persist best-effort.
    pub async fn rename(&mut self, title: &str) -> GatewayResult<()> {
        let title = title.trim().to_string();
        self.set_title(title.clone());
        let Some(conversation_id) = self.tab.conversation_id.clone() else {
            return Ok(());
        };
        let api = Arc::clone(&self.api);
        let result = api.rename_conversation(&conversation_id, &title).await;
        if let Err(err) = &result {
            warn!(conversation_id = %conversation_id, error = %err, "Rename failed");
        }
        result
    }

    /// Delete the bound conversation and reset the tab.
    pub async fn delete_conversation(&mut self) -> GatewayResult<()> {
        let Some(conversation_id) = self.tab.conversation_id.clone() else {
            return Ok(());
        };
        let api = Arc::clone(&self.api);
        api.delete_conversation(&conversation_id).await?;
        info!(conversation_id = %conversation_id, "Conversation deleted");
        self.clear();
        Ok(())
    }
}

impl std::fmt::Debug for Playground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playground")
            .field("tab", &self.tab)
            .field("title", &self.title)
            .field("messages", &self.store.len())
            .field("sending", &self.dispatcher.is_sending())
            .finish_non_exhaustive()
    }
}
