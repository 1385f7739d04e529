use dioxus::prelude::*;
use tracing::warn;

use crate::api::ConversationQuery;
use crate::types::Conversation;
use crate::views::shared::GatewayHandle;

/// Recent conversations with keyword search.
#[component]
pub fn ConversationSidebar(
    mut refresh: Signal<u32>,
    on_open: EventHandler<Conversation>,
    on_deleted: EventHandler<String>,
) -> Element {
    let gateway = use_context::<GatewayHandle>();
    let mut keyword = use_signal(String::new);

    let conversations = use_resource({
        let api = gateway.0.clone();
        move || {
            let api = api.clone();
            let keyword = keyword();
            let _ = refresh();
            async move {
                let query = ConversationQuery {
                    keyword: Some(keyword.trim().to_string()).filter(|k| !k.is_empty()),
                    ..ConversationQuery::default()
                };
                match api.list_conversations(&query).await {
                    Ok(page) => page.items,
                    Err(err) => {
                        warn!(error = %err, "Failed to list conversations");
                        Vec::new()
                    }
                }
            }
        }
    });

    let items = conversations.read().clone().unwrap_or_default();

    rsx! {
        aside { class: "sidebar",
            input {
                r#type: "search",
                placeholder: "Search conversations",
                value: "{keyword}",
                oninput: move |ev| keyword.set(ev.value()),
            }
            div { class: "conversation-list",
                for conversation in items {
                    div {
                        class: "conversation-row",
                        key: "{conversation.id}",
                        onclick: {
                            let conversation = conversation.clone();
                            move |_| on_open.call(conversation.clone())
                        },
                        span { if conversation.title.is_empty() { "Untitled" } else { "{conversation.title}" } }
                        button {
                            class: "action-btn",
                            title: "Delete conversation",
                            onclick: {
                                let api = gateway.0.clone();
                                let id = conversation.id.clone();
                                move |ev: MouseEvent| {
                                    ev.stop_propagation();
                                    let api = api.clone();
                                    let id = id.clone();
                                    spawn(async move {
                                        match api.delete_conversation(&id).await {
                                            Ok(()) => {
                                                on_deleted.call(id);
                                                refresh.set(refresh() + 1);
                                            }
                                            Err(err) => warn!(conversation_id = %id, error = %err, "Delete failed"),
                                        }
                                    });
                                }
                            },
                            "✕"
                        }
                    }
                }
            }
        }
    }
}
