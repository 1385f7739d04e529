//! Persistent tab state for the playground.
//!
//! Tabs survive restarts with their settings, model selection, known title
//! and scroll position. Message bodies are never written; a reopened tab
//! reloads its history from the gateway.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;
use crate::types::Tab;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabFile {
    #[serde(default)]
    tabs: Vec<Tab>,
    #[serde(default)]
    active_tab_id: Option<String>,
}

/// File-backed tab list. Every mutation is written through immediately.
#[derive(Clone, Debug)]
pub struct TabStore {
    path: PathBuf,
    state: TabFile,
}

impl TabStore {
    /// Load tabs from `path`. A missing file yields an empty store; a
    /// corrupt one is logged and replaced on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<TabFile>(&raw) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Ignoring unreadable tab state");
                    TabFile::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => TabFile::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), tabs = state.tabs.len(), "Loaded tab state");
        Ok(Self { path, state })
    }

    /// A store with no tabs that will write to `path` on the first mutation.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: TabFile::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.state.tabs
    }

    pub fn get(&self, id: &str) -> Option<&Tab> {
        self.state.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn active(&self) -> Option<&Tab> {
        let id = self.state.active_tab_id.as_deref()?;
        self.get(id)
    }

    /// Add a tab and make it active.
    pub fn open(&mut self, tab: Tab) -> Result<(), StateError> {
        self.state.active_tab_id = Some(tab.id.clone());
        match self.state.tabs.iter_mut().find(|existing| existing.id == tab.id) {
            Some(existing) => *existing = tab,
            None => self.state.tabs.push(tab),
        }
        self.save()
    }

    /// Replace a tab's persisted settings. Unknown ids are ignored.
    pub fn update(&mut self, tab: &Tab) -> Result<bool, StateError> {
        let Some(existing) = self.state.tabs.iter_mut().find(|existing| existing.id == tab.id)
        else {
            return Ok(false);
        };
        *existing = tab.clone();
        self.save()?;
        Ok(true)
    }

    /// Remove a tab. Closing the active tab activates its right neighbour,
    /// or the left one if it was last.
    pub fn close(&mut self, id: &str) -> Result<Option<Tab>, StateError> {
        let Some(pos) = self.state.tabs.iter().position(|tab| tab.id == id) else {
            return Ok(None);
        };
        let removed = self.state.tabs.remove(pos);
        if self.state.active_tab_id.as_deref() == Some(id) {
            let next = pos.min(self.state.tabs.len().saturating_sub(1));
            self.state.active_tab_id = self.state.tabs.get(next).map(|tab| tab.id.clone());
        }
        self.save()?;
        Ok(Some(removed))
    }

    pub fn set_active(&mut self, id: &str) -> Result<bool, StateError> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.state.active_tab_id = Some(id.to_string());
        self.save()?;
        Ok(true)
    }

    /// Tabs bound to a deleted conversation become fresh chats. They get a
    /// new id so any view built for the old binding is rebuilt.
    pub fn forget_conversation(&mut self, conversation_id: &str) -> Result<(), StateError> {
        let mut changed = false;
        for tab in &mut self.state.tabs {
            if tab.conversation_id.as_deref() != Some(conversation_id) {
                continue;
            }
            let fresh = Tab {
                selected_model_ids: std::mem::take(&mut tab.selected_model_ids),
                temperature: tab.temperature,
                history_limit: tab.history_limit,
                ..Tab::new()
            };
            if self.state.active_tab_id.as_deref() == Some(tab.id.as_str()) {
                self.state.active_tab_id = Some(fresh.id.clone());
            }
            *tab = fresh;
            changed = true;
        }
        if changed {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<(), StateError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(&self.state)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
