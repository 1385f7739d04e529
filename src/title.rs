use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::api::{GatewayApi, TitleRequest};
use crate::store::MessageStore;

/// Assistant replies shorter than this are not worth summarizing.
pub const MIN_ASSISTANT_CHARS: usize = 20;
const MAX_EXCERPT_CHARS: usize = 500;
const MAX_TITLE_CHARS: usize = 100;
const DEFAULT_TITLES: &[&str] = &["", "new chat", "new conversation", "untitled"];

pub fn is_default_title(title: &str) -> bool {
    let normalized = title.trim().to_lowercase();
    DEFAULT_TITLES.contains(&normalized.as_str())
}

fn truncate_text(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

/// Clean a model-produced title. Returns `None` if nothing usable is left.
pub fn clean_title(raw_title: &str) -> Option<String> {
    let cleaned = raw_title
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .trim_matches('"')
        .trim_matches('\'')
        .to_string();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned.chars().count() > MAX_TITLE_CHARS {
        return Some(format!("{}...", truncate_text(&cleaned, MAX_TITLE_CHARS - 3)));
    }
    Some(cleaned)
}

/// What the playground knows when deciding whether to name a conversation.
#[derive(Clone, Copy, Debug)]
pub struct TitleContext<'a> {
    pub conversation_id: Option<&'a str>,
    pub current_title: &'a str,
    pub store: &'a MessageStore,
    pub sending: bool,
    pub model_override: Option<&'a str>,
}

/// Once-per-conversation guard for background title generation.
#[derive(Clone, Debug, Default)]
pub struct TitleGenerator {
    handled: HashSet<String>,
}

impl TitleGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_handled(&self, conversation_id: &str) -> bool {
        self.handled.contains(conversation_id)
    }

    /// Mark a conversation as handled without generating a title, e.g. when
    /// its current title is not known locally.
    pub fn skip(&mut self, conversation_id: &str) {
        if self.handled.insert(conversation_id.to_string()) {
            debug!(conversation_id, "Title generation skipped");
        }
    }

    /// Check eligibility and, if it holds, claim the conversation before any
    /// async work starts. Repeated calls for the same conversation return
    /// `None` no matter how often they run.
    pub fn try_start(&mut self, ctx: TitleContext<'_>) -> Option<TitleJob> {
        let conversation_id = ctx.conversation_id?;
        if ctx.sending || self.handled.contains(conversation_id) {
            return None;
        }
        if !is_default_title(ctx.current_title) {
            return None;
        }
        let (user, assistant) = ctx.store.first_exchange(MIN_ASSISTANT_CHARS)?;
        let model = ctx
            .model_override
            .map(str::to_string)
            .or_else(|| assistant.model_id.clone())?;

        self.handled.insert(conversation_id.to_string());
        debug!(conversation_id, model = %model, "Title generation claimed");

        Some(TitleJob {
            conversation_id: conversation_id.to_string(),
            request: TitleRequest {
                model,
                user_message: truncate_text(&user.content, MAX_EXCERPT_CHARS),
                assistant_message: truncate_text(&assistant.content, MAX_EXCERPT_CHARS),
            },
        })
    }
}

/// A claimed title generation, ready to run in the background.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleJob {
    pub conversation_id: String,
    pub request: TitleRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TitleUpdate {
    pub conversation_id: String,
    pub title: String,
    pub persisted: bool,
}

impl TitleJob {
    /// Summarize and persist. Every failure is logged and swallowed.
    pub async fn run(self, api: &dyn GatewayApi) -> Option<TitleUpdate> {
        let raw = match api.summarize_title(&self.request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(conversation_id = %self.conversation_id, error = %err, "Title generation failed");
                return None;
            }
        };
        let Some(title) = clean_title(&raw) else {
            warn!(conversation_id = %self.conversation_id, "Title generation returned nothing usable");
            return None;
        };

        let persisted = match api.rename_conversation(&self.conversation_id, &title).await {
            Ok(()) => true,
            Err(err) => {
                warn!(conversation_id = %self.conversation_id, error = %err, "Failed to persist generated title");
                false
            }
        };
        info!(conversation_id = %self.conversation_id, title = %title, persisted, "Conversation titled");

        Some(TitleUpdate {
            conversation_id: self.conversation_id,
            title,
            persisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn exchange(reply: &str) -> MessageStore {
        let mut store = MessageStore::new();
        store.append(ChatMessage::user("How do I reverse a list in Rust?"));
        let mut assistant = ChatMessage::assistant("m1", reply);
        assistant.created_at += time::Duration::seconds(1);
        store.append(assistant);
        store
    }

    fn ctx<'a>(store: &'a MessageStore, title: &'a str) -> TitleContext<'a> {
        TitleContext {
            conversation_id: Some("c1"),
            current_title: title,
            store,
            sending: false,
            model_override: None,
        }
    }

    #[test]
    fn clean_title_strips_quotes_and_extra_lines() {
        assert_eq!(
            clean_title("  \"Reversing Lists\"\nExplanation: ...").as_deref(),
            Some("Reversing Lists")
        );
        assert_eq!(clean_title("   ").as_deref(), None);
        let long = "x".repeat(150);
        let cleaned = clean_title(&long).unwrap();
        assert_eq!(cleaned.chars().count(), 100);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn fires_at_most_once_per_conversation() {
        let store = exchange("Call `.reverse()` on the Vec, or iterate with `.rev()`.");
        let mut generator = TitleGenerator::new();

        let job = generator.try_start(ctx(&store, "New Chat")).unwrap();
        assert_eq!(job.conversation_id, "c1");
        assert_eq!(job.request.model, "m1");
        assert!(generator.has_handled("c1"));

        for _ in 0..5 {
            assert!(generator.try_start(ctx(&store, "New Chat")).is_none());
        }
    }

    #[test]
    fn skips_ineligible_states() {
        let mut generator = TitleGenerator::new();
        let short = exchange("Use rev.");
        assert!(generator.try_start(ctx(&short, "")).is_none());

        let store = exchange("Call `.reverse()` on the Vec, or iterate with `.rev()`.");
        assert!(generator.try_start(ctx(&store, "Rust lists")).is_none());

        let mut sending = ctx(&store, "");
        sending.sending = true;
        assert!(generator.try_start(sending).is_none());

        let mut unbound = ctx(&store, "");
        unbound.conversation_id = None;
        assert!(generator.try_start(unbound).is_none());

        assert!(!generator.has_handled("c1"));
    }

    #[test]
    fn later_long_reply_qualifies() {
        let mut store = exchange("Hi!");
        let mut second = ChatMessage::user("Now explain iterators in detail.");
        second.created_at += time::Duration::seconds(2);
        store.append(second);
        let mut long = ChatMessage::assistant("m2", "Iterators are lazy adapters over a sequence.");
        long.created_at += time::Duration::seconds(3);
        store.append(long);

        let mut generator = TitleGenerator::new();
        let job = generator.try_start(ctx(&store, "")).unwrap();
        assert_eq!(job.request.model, "m2");
        assert_eq!(job.request.user_message, "How do I reverse a list in Rust?");
        assert_eq!(
            job.request.assistant_message,
            "Iterators are lazy adapters over a sequence."
        );
    }

    #[test]
    fn skipped_conversation_never_fires() {
        let store = exchange("Call `.reverse()` on the Vec, or iterate with `.rev()`.");
        let mut generator = TitleGenerator::new();
        generator.skip("c1");
        assert!(generator.has_handled("c1"));
        assert!(generator.try_start(ctx(&store, "")).is_none());
    }

    #[test]
    fn model_override_wins() {
        let store = exchange("Call `.reverse()` on the Vec, or iterate with `.rev()`.");
        let mut generator = TitleGenerator::new();
        let mut context = ctx(&store, "");
        context.model_override = Some("summarizer");
        let job = generator.try_start(context).unwrap();
        assert_eq!(job.request.model, "summarizer");
    }
}
