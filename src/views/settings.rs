use dioxus::prelude::*;

use crate::playground::Playground;
use crate::registry::ModelRegistry;
use crate::theme::ThemeMode;
use crate::types::Tab;

/// Model selection and sampling knobs for one tab.
#[component]
pub fn SettingsPanel(
    mut playground: Signal<Playground>,
    registry: ModelRegistry,
    mut theme: Signal<ThemeMode>,
    on_tab_change: EventHandler<Tab>,
) -> Element {
    let selected = playground.read().selected_models().to_vec();
    let temperature = playground.read().tab().temperature;
    let history_limit = playground.read().tab().history_limit;
    let sending = playground.read().is_sending();
    let models = registry
        .chat_models()
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    rsx! {
        div { class: "settings-panel",
            div { class: "model-picker",
                if models.is_empty() {
                    span { class: "text-muted", "No chat models available" }
                }
                for model in models {
                    label { class: "model-option", key: "{model.name}",
                        input {
                            r#type: "checkbox",
                            checked: selected.contains(&model.name),
                            disabled: sending,
                            onchange: {
                                let registry = registry.clone();
                                let name = model.name.clone();
                                move |ev: FormEvent| {
                                    let mut ids = playground.read().selected_models().to_vec();
                                    ids.retain(|id| id != &name);
                                    if ev.checked() {
                                        ids.push(name.clone());
                                    }
                                    let tab = playground.with_mut(|pg| {
                                        pg.select_models(&registry, &ids);
                                        pg.tab().clone()
                                    });
                                    on_tab_change.call(tab);
                                }
                            },
                        }
                        "{model.name}"
                        span { class: "text-muted", " ({model.provider})" }
                    }
                }
            }
            label {
                "Temperature "
                input {
                    r#type: "number",
                    min: "0",
                    max: "2",
                    step: "0.1",
                    value: temperature.map(|t| t.to_string()).unwrap_or_default(),
                    onchange: move |ev: FormEvent| {
                        let value = ev.value().trim().parse::<f32>().ok();
                        let tab = playground.with_mut(|pg| {
                            pg.set_temperature(value);
                            pg.tab().clone()
                        });
                        on_tab_change.call(tab);
                    },
                }
            }
            label {
                "History "
                input {
                    r#type: "number",
                    min: "0",
                    max: "100",
                    value: "{history_limit}",
                    onchange: move |ev: FormEvent| {
                        if let Ok(limit) = ev.value().trim().parse::<u32>() {
                            let tab = playground.with_mut(|pg| {
                                pg.set_history_limit(limit);
                                pg.tab().clone()
                            });
                            on_tab_change.call(tab);
                        }
                    },
                }
            }
            button {
                class: "btn",
                r#type: "button",
                onclick: move |_| theme.set(theme().toggled()),
                "{theme().toggled().label()} theme"
            }
        }
    }
}
