#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::Dark => "Dark",
            ThemeMode::Light => "Light",
        }
    }
}

pub fn theme_css(mode: ThemeMode) -> &'static str {
    match mode {
        ThemeMode::Dark => DARK_THEME,
        ThemeMode::Light => LIGHT_THEME,
    }
}

pub const BASE_CSS: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: ui-sans-serif, system-ui, sans-serif; background: var(--color-bg-primary); color: var(--color-text-primary); }
.console { display: grid; grid-template-columns: 260px 1fr; height: 100vh; }
.sidebar { border-right: 1px solid var(--color-input-border); display: flex; flex-direction: column; overflow: hidden; }
.sidebar input { margin: 0.75rem; padding: 0.4rem 0.6rem; background: var(--color-input-bg); color: var(--color-text-primary); border: 1px solid var(--color-input-border); }
.conversation-list { overflow-y: auto; flex: 1; }
.conversation-row { display: flex; justify-content: space-between; padding: 0.5rem 0.75rem; cursor: pointer; }
.conversation-row:hover { background: var(--color-surface-muted); }
.workspace { display: flex; flex-direction: column; min-width: 0; height: 100vh; }
.tabs { display: flex; gap: 0.25rem; padding: 0.5rem; border-bottom: 1px solid var(--color-input-border); overflow-x: auto; }
.tab { padding: 0.3rem 0.7rem; border: 1px solid transparent; cursor: pointer; white-space: nowrap; }
.tab.active { border-color: var(--color-border); }
.playground { display: flex; flex-direction: column; flex: 1; min-height: 0; position: relative; }
.playground-header { display: flex; gap: 0.5rem; align-items: center; padding: 0.5rem 1rem; }
.playground-header input { flex: 1; background: transparent; color: var(--color-text-primary); border: none; font-size: 1.1rem; }
.message-list { flex: 1; overflow-y: auto; padding: 1rem; }
.message-row { display: flex; margin-bottom: 0.75rem; }
.message-row.user { justify-content: flex-end; }
.bubble { max-width: 75%; padding: 0.6rem 0.8rem; border-radius: 0.5rem; }
.bubble.user { background: var(--color-chat-user-bg); color: var(--color-chat-user-text); }
.bubble.assistant { background: var(--color-chat-assistant-bg); color: var(--color-chat-assistant-text); border: 1px solid var(--color-input-border); }
.bubble.live { opacity: 0.85; }
.message-meta { font-size: 0.75rem; color: var(--color-timestamp); display: flex; gap: 0.5rem; margin-top: 0.25rem; }
.model-tag { font-weight: 600; }
.history-status { text-align: center; color: var(--color-timestamp); font-size: 0.8rem; padding: 0.25rem; }
.jump-to-bottom { position: absolute; right: 1.5rem; bottom: 7rem; }
.error-banner { background: var(--color-error-bg); color: var(--color-error-text); padding: 0.5rem 1rem; display: flex; justify-content: space-between; }
.composer { display: flex; gap: 0.5rem; padding: 0.75rem 1rem; border-top: 1px solid var(--color-input-border); }
.composer textarea { flex: 1; resize: none; padding: 0.5rem; background: var(--color-input-bg); color: var(--color-text-primary); border: 1px solid var(--color-input-border); }
.settings-panel { display: flex; flex-wrap: wrap; gap: 1rem; padding: 0.5rem 1rem; font-size: 0.85rem; }
.model-option { display: inline-flex; gap: 0.25rem; align-items: center; }
.btn { padding: 0.35rem 0.8rem; background: transparent; color: var(--color-text-primary); border: 1px solid var(--color-input-border); cursor: pointer; }
.btn:hover { background: var(--color-surface-muted); }
.btn:disabled { opacity: 0.4; cursor: default; }
.action-btn { background: none; border: none; color: var(--color-timestamp); cursor: pointer; padding: 0; }
.action-btn.active { color: var(--color-text-primary); }
"#;

const DARK_THEME: &str = r#"
:root {
    --color-bg-primary: #000000;
    --color-text-primary: #ffffff;
    --color-border: #ffffff;
    --color-surface-muted: #111111;
    --color-input-border: #2a2a2a;
    --color-input-bg: #000000;
    --color-chat-user-bg: #ffffff;
    --color-chat-user-text: #000000;
    --color-chat-assistant-bg: #050505;
    --color-chat-assistant-text: #ffffff;
    --color-timestamp: #9b9b9b;
    --color-error-bg: #3a0d06;
    --color-error-text: #ffb4a6;
}
"#;

const LIGHT_THEME: &str = r#"
:root {
    --color-bg-primary: #ffffff;
    --color-text-primary: #000000;
    --color-border: #000000;
    --color-surface-muted: #e6e6e6;
    --color-input-border: #c2c2c2;
    --color-input-bg: #ffffff;
    --color-chat-user-bg: #111111;
    --color-chat-user-text: #ffffff;
    --color-chat-assistant-bg: #f5f5f5;
    --color-chat-assistant-text: #000000;
    --color-timestamp: #606060;
    --color-error-bg: #ffe4de;
    --color-error-text: #7a1a08;
}
"#;
