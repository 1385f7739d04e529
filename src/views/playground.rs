use dioxus::events::Key;
use dioxus::prelude::*;
use tokio::sync::mpsc::unbounded_channel;
use tracing::warn;

use crate::config::Config;
use crate::playground::Playground;
use crate::registry::ModelRegistry;
use crate::stream::{ChannelStatus, ChannelUpdate};
use crate::theme::ThemeMode;
use crate::types::{ChatMessage, Rating, Role, Tab};
use crate::views::settings::SettingsPanel;
use crate::views::shared::{
    GatewayHandle, MESSAGE_LIST_ID, apply_scroll, copy_to_clipboard, format_message_timestamp,
    markdown_to_html, measure_viewport,
};

/// Transient view of one in-flight channel. Never stored.
#[derive(Clone, Debug, PartialEq)]
struct LiveReply {
    channel_id: String,
    model_id: String,
    text: String,
    status: ChannelStatus,
}

fn apply_update(replies: &mut [LiveReply], update: ChannelUpdate) {
    let Some(reply) = replies
        .iter_mut()
        .find(|reply| reply.channel_id == update.channel_id())
    else {
        return;
    };
    match update {
        ChannelUpdate::Started { .. } => reply.status = ChannelStatus::Streaming,
        ChannelUpdate::Snapshot { text, .. } => reply.text = text,
        ChannelUpdate::Finished { status, .. } => reply.status = status,
    }
}

/// Fetch and merge the next older page. True when something was inserted.
async fn load_older(mut playground: Signal<Playground>) -> bool {
    let Some(request) = playground.with_mut(|pg| pg.begin_history_page()) else {
        return false;
    };
    let api = playground.read().api();
    let result = api
        .list_messages(&request.conversation_id, request.page, request.page_size)
        .await;
    let inserted = playground.with_mut(|pg| pg.finish_history_page(&request, result));
    inserted.is_some_and(|messages| !messages.is_empty())
}

async fn settle_layout(mut playground: Signal<Playground>) {
    let Some(viewport) = measure_viewport().await else {
        return;
    };
    if let Some(command) = playground.with_mut(|pg| pg.after_layout(viewport)) {
        apply_scroll(command);
    }
}

#[component]
pub fn PlaygroundView(
    tab: Tab,
    registry: ModelRegistry,
    theme: Signal<ThemeMode>,
    on_tab_change: EventHandler<Tab>,
    on_conversation_change: EventHandler<()>,
) -> Element {
    let gateway = use_context::<GatewayHandle>();
    let config = use_context::<Config>();
    let mut playground =
        use_signal(|| Playground::new(gateway.0.clone(), config.clone(), tab.clone()));
    let mut live = use_signal(Vec::<LiveReply>::new);

    use_hook(move || {
        spawn(async move {
            load_older(playground).await;
            let command = playground.with_mut(|pg| pg.restore_scroll());
            apply_scroll(command);
        });
    });

    use_drop(move || {
        if let Ok(mut pg) = playground.try_write() {
            let tab = pg.persist_scroll().clone();
            on_tab_change.call(tab);
        }
    });

    let last_message = use_memo(move || playground.read().store().last_id().map(str::to_string));
    let content_size = use_memo(move || {
        let live_chars: usize = live.read().iter().map(|reply| reply.text.len()).sum();
        live_chars + playground.read().store().len()
    });
    use_effect(move || {
        let _ = last_message();
        let _ = content_size();
        spawn(settle_layout(playground));
    });

    let mut send = move || {
        let prepared = playground.with_mut(|pg| pg.begin_send());
        let Ok((turn, staged)) = prepared else {
            return;
        };
        live.set(
            turn.channels()
                .into_iter()
                .map(|(channel_id, model_id)| LiveReply {
                    channel_id,
                    model_id,
                    text: String::new(),
                    status: ChannelStatus::Pending,
                })
                .collect(),
        );
        let api = playground.read().api();
        spawn(async move {
            let (tx, mut rx) = unbounded_channel();
            let forward = async move {
                while let Some(update) = rx.recv().await {
                    live.with_mut(|replies| apply_update(replies, update));
                }
            };
            let (outcome, ()) = futures::join!(turn.run(api.as_ref(), Some(tx)), forward);

            let tab = playground.with_mut(|pg| {
                pg.finish_send(outcome, staged);
                pg.tab().clone()
            });
            live.set(Vec::new());
            let bound = tab.conversation_id.is_some();
            on_tab_change.call(tab);
            if bound {
                on_conversation_change.call(());
            }

            let Some(job) = playground.with_mut(|pg| pg.title_job()) else {
                return;
            };
            spawn(async move {
                let Some(update) = job.run(api.as_ref()).await else {
                    return;
                };
                let tab = playground.with_mut(|pg| pg.apply_title(&update).then(|| pg.tab().clone()));
                if let Some(tab) = tab {
                    on_tab_change.call(tab);
                    on_conversation_change.call(());
                }
            });
        });
    };

    let pg = playground.read();
    let messages = pg.messages().to_vec();
    let input = pg.input().to_string();
    let title = pg.title().to_string();
    let sending = pg.is_sending();
    let error = pg.last_error().map(str::to_string);
    let show_jump = pg.scroll().shows_jump_to_bottom();
    let loading_history = pg.history().is_loading();
    let history_done = pg.conversation_id().is_some() && !pg.history().has_more();
    drop(pg);
    let live_replies = live();

    rsx! {
        div { class: "playground",
            div { class: "playground-header",
                input {
                    r#type: "text",
                    placeholder: "New Chat",
                    value: "{title}",
                    onchange: move |ev: FormEvent| {
                        let title = ev.value().trim().to_string();
                        let tab = playground.with_mut(|pg| {
                            pg.set_title(title.clone());
                            pg.tab().clone()
                        });
                        let Some(conversation_id) = tab.conversation_id.clone() else {
                            return;
                        };
                        on_tab_change.call(tab);
                        let api = playground.read().api();
                        spawn(async move {
                            match api.rename_conversation(&conversation_id, &title).await {
                                Ok(()) => on_conversation_change.call(()),
                                Err(err) => warn!(conversation_id = %conversation_id, error = %err, "Rename failed"),
                            }
                        });
                    },
                }
                button {
                    class: "btn",
                    r#type: "button",
                    disabled: sending,
                    onclick: move |_| {
                        let tab = playground.with_mut(|pg| {
                            pg.clear();
                            pg.tab().clone()
                        });
                        on_tab_change.call(tab);
                    },
                    "New chat"
                }
            }
            SettingsPanel { playground, registry, theme, on_tab_change }
            if let Some(error) = error {
                div { class: "error-banner",
                    span { "{error}" }
                    button {
                        class: "action-btn",
                        onclick: move |_| playground.with_mut(|pg| pg.dismiss_error()),
                        "Dismiss"
                    }
                }
            }
            div {
                id: MESSAGE_LIST_ID,
                class: "message-list",
                onscroll: move |_| {
                    spawn(async move {
                        let Some(viewport) = measure_viewport().await else {
                            return;
                        };
                        if playground.with_mut(|pg| pg.on_scroll(viewport)) && load_older(playground).await {
                            settle_layout(playground).await;
                        }
                    });
                },
                if loading_history {
                    div { class: "history-status", "Loading older messages…" }
                } else if history_done && !messages.is_empty() {
                    div { class: "history-status", "Beginning of conversation" }
                }
                for message in messages {
                    MessageRow { key: "{message.id}", message, playground }
                }
                for reply in live_replies {
                    div { class: "message-row assistant", key: "{reply.channel_id}",
                        div { class: "message-stack",
                            div { class: "bubble assistant live",
                                if reply.text.is_empty() {
                                    span { class: "shimmer-text",
                                        if reply.status == ChannelStatus::Pending { "Connecting…" } else { "Thinking…" }
                                    }
                                } else {
                                    div { class: "md", dangerous_inner_html: markdown_to_html(&reply.text) }
                                }
                            }
                            div { class: "message-meta",
                                span { class: "model-tag", "{reply.model_id}" }
                            }
                        }
                    }
                }
            }
            if show_jump {
                button {
                    class: "btn jump-to-bottom",
                    r#type: "button",
                    onclick: move |_| apply_scroll(playground.with_mut(|pg| pg.scroll_mut().jump_to_bottom())),
                    "↓ Latest"
                }
            }
            form { class: "composer",
                onsubmit: move |ev| ev.prevent_default(),
                textarea {
                    rows: "2",
                    placeholder: "Send a message to the selected models",
                    value: "{input}",
                    oninput: move |ev| playground.with_mut(|pg| pg.set_input(ev.value())),
                    onkeydown: move |ev| {
                        if ev.key() == Key::Enter && !ev.modifiers().shift() {
                            ev.prevent_default();
                            send();
                        }
                    },
                }
                if sending {
                    button {
                        class: "btn",
                        r#type: "button",
                        onclick: move |_| playground.read().stop(),
                        "Stop"
                    }
                } else {
                    button {
                        class: "btn btn-primary",
                        r#type: "button",
                        onclick: move |_| send(),
                        "Send"
                    }
                }
            }
        }
    }
}

#[component]
fn MessageRow(message: ChatMessage, mut playground: Signal<Playground>) -> Element {
    let is_user = message.role == Role::User;
    let side = if is_user { "user" } else { "assistant" };
    let timestamp = format_message_timestamp(message.created_at);
    let rating = message.rating;
    let id = message.id.clone();
    let rating_class = |value: Rating| {
        if rating == Some(value) {
            "action-btn active"
        } else {
            "action-btn"
        }
    };
    let up_class = rating_class(Rating::Up);
    let down_class = rating_class(Rating::Down);

    rsx! {
        div { class: "message-row {side}",
            div { class: "message-stack",
                div { class: "bubble {side}",
                    if is_user {
                        "{message.content}"
                    } else {
                        div { class: "md", dangerous_inner_html: markdown_to_html(&message.content) }
                    }
                }
                div { class: "message-meta",
                    if let Some(model) = message.model_id.as_ref() {
                        span { class: "model-tag", "{model}" }
                    }
                    if let Some(ts) = timestamp {
                        span { class: "message-timestamp", "{ts}" }
                    }
                    if !is_user {
                        button {
                            class: "action-btn",
                            title: "Copy markdown",
                            onclick: {
                                let content = message.content.clone();
                                move |_| copy_to_clipboard(content.clone())
                            },
                            "Copy"
                        }
                        button {
                            class: up_class,
                            onclick: {
                                let id = id.clone();
                                move |_| {
                                    let next = (rating != Some(Rating::Up)).then_some(Rating::Up);
                                    playground.with_mut(|pg| pg.rate(&id, next));
                                }
                            },
                            "👍"
                        }
                        button {
                            class: down_class,
                            onclick: {
                                let id = id.clone();
                                move |_| {
                                    let next = (rating != Some(Rating::Down)).then_some(Rating::Down);
                                    playground.with_mut(|pg| pg.rate(&id, next));
                                }
                            },
                            "👎"
                        }
                    }
                }
                if rating == Some(Rating::Down) {
                    input {
                        r#type: "text",
                        placeholder: "What went wrong?",
                        value: message.feedback.clone().unwrap_or_default(),
                        onchange: move |ev: FormEvent| {
                            playground.with_mut(|pg| pg.set_feedback(&id, Some(ev.value())));
                        },
                    }
                }
            }
        }
    }
}
