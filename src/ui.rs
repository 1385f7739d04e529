use std::sync::Arc;

use dioxus::prelude::*;
use tracing::{error, warn};

use crate::api::{GatewayApi, HttpGateway};
use crate::config::Config;
use crate::error::StateError;
use crate::registry::ModelRegistry;
use crate::tabs::TabStore;
use crate::theme::{BASE_CSS, ThemeMode, theme_css};
use crate::types::{Conversation, Tab};
use crate::views::shared::GatewayHandle;
use crate::views::{ConversationSidebar, PlaygroundView};

fn load_tabs(config: &Config) -> TabStore {
    let path = config.tabs_file();
    TabStore::load(&path).unwrap_or_else(|err| {
        error!(path = %path.display(), error = %err, "Failed to load tabs");
        TabStore::empty(path)
    })
}

fn report(result: Result<impl Sized, StateError>) {
    if let Err(err) = result {
        warn!(error = %err, "Failed to save tab state");
    }
}

#[component]
pub fn App() -> Element {
    let config = use_context_provider(Config::from_env);
    let gateway = use_context_provider(|| {
        let api: Arc<dyn GatewayApi> = Arc::new(HttpGateway::new(&config));
        GatewayHandle(api)
    });
    let theme = use_signal(ThemeMode::default);
    let mut tabs = use_signal(|| load_tabs(&config));
    let mut refresh = use_signal(|| 0u32);

    use_hook(move || {
        if tabs.read().active().is_none() {
            let first = tabs.read().tabs().first().map(|tab| tab.id.clone());
            match first {
                Some(id) => report(tabs.with_mut(|store| store.set_active(&id))),
                None => report(tabs.with_mut(|store| store.open(Tab::new()))),
            }
        }
    });

    let registry = use_resource(move || {
        let api = gateway.0.clone();
        async move {
            match api.list_models().await {
                Ok(models) => ModelRegistry::new(models),
                Err(err) => {
                    warn!(error = %err, "Failed to load model registry");
                    ModelRegistry::default()
                }
            }
        }
    });

    let open_conversation = move |conversation: Conversation| {
        let existing = tabs
            .read()
            .tabs()
            .iter()
            .find(|tab| tab.conversation_id.as_deref() == Some(conversation.id.as_str()))
            .map(|tab| tab.id.clone());
        match existing {
            Some(id) => report(tabs.with_mut(|store| store.set_active(&id))),
            None => report(tabs.with_mut(|store| {
                store.open(Tab::for_titled_conversation(
                    &conversation.id,
                    &conversation.title,
                ))
            })),
        }
    };

    let active = tabs.read().active().cloned();
    let tab_list = tabs.read().tabs().to_vec();
    let registry_value = registry.read().clone().unwrap_or_default();

    rsx! {
        style { dangerous_inner_html: BASE_CSS }
        style { dangerous_inner_html: theme_css(theme()) }
        div { class: "console",
            ConversationSidebar {
                refresh,
                on_open: open_conversation,
                on_deleted: move |id: String| {
                    report(tabs.with_mut(|store| store.forget_conversation(&id)));
                },
            }
            main { class: "workspace",
                div { class: "tabs",
                    for tab in tab_list {
                        TabButton {
                            key: "{tab.id}",
                            label: tab_label(&tab),
                            active: active.as_ref().is_some_and(|current| current.id == tab.id),
                            on_select: {
                                let id = tab.id.clone();
                                move |_| report(tabs.with_mut(|store| store.set_active(&id)))
                            },
                            on_close: {
                                let id = tab.id.clone();
                                move |_| {
                                    report(tabs.with_mut(|store| store.close(&id)));
                                    if tabs.read().tabs().is_empty() {
                                        report(tabs.with_mut(|store| store.open(Tab::new())));
                                    }
                                }
                            },
                        }
                    }
                    button {
                        class: "btn",
                        r#type: "button",
                        title: "New tab",
                        onclick: move |_| report(tabs.with_mut(|store| store.open(Tab::new()))),
                        "+"
                    }
                }
                if let Some(tab) = active {
                    PlaygroundView {
                        key: "{tab.id}",
                        tab,
                        registry: registry_value,
                        theme,
                        on_tab_change: move |tab: Tab| report(tabs.with_mut(|store| store.update(&tab))),
                        on_conversation_change: move |_| refresh += 1,
                    }
                }
            }
        }
    }
}

fn tab_label(tab: &Tab) -> String {
    tab.title
        .as_ref()
        .filter(|title| !title.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| "New Chat".to_string())
}

#[component]
fn TabButton(
    label: String,
    active: bool,
    on_select: EventHandler<()>,
    on_close: EventHandler<()>,
) -> Element {
    let class = if active { "tab active" } else { "tab" };
    rsx! {
        div { class: class, onclick: move |_| on_select.call(()),
            "{label} "
            button {
                class: "action-btn",
                title: "Close tab",
                onclick: move |ev: MouseEvent| {
                    ev.stop_propagation();
                    on_close.call(());
                },
                "×"
            }
        }
    }
}
