use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Chat,
    Embedding,
    Image,
    Audio,
    Rerank,
    #[serde(other)]
    Other,
}

/// One row of the provider/model registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub name: String,
    pub provider: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
}

impl ModelEntry {
    pub fn chat(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            model_type: ModelType::Chat,
        }
    }

    pub fn is_chat(&self) -> bool {
        self.model_type == ModelType::Chat
    }
}

/// Read-only lookup of registry entries keyed by model name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    pub fn new(entries: impl IntoIterator<Item = ModelEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries eligible for the playground, sorted by provider then name.
    pub fn chat_models(&self) -> Vec<&ModelEntry> {
        let mut models: Vec<&ModelEntry> =
            self.entries.values().filter(|entry| entry.is_chat()).collect();
        models.sort_by(|a, b| a.provider.cmp(&b.provider).then(a.name.cmp(&b.name)));
        models
    }

    pub fn is_selectable(&self, name: &str) -> bool {
        self.get(name).is_some_and(ModelEntry::is_chat)
    }

    /// Keep only known chat models, preserving order and dropping repeats.
    pub fn filter_selectable(&self, names: &[String]) -> Vec<String> {
        let mut kept: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if self.is_selectable(name) && !kept.contains(name) {
                kept.push(name.clone());
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::new([
            ModelEntry::chat("gpt-4o", "openai"),
            ModelEntry::chat("claude-3-5-sonnet", "anthropic"),
            ModelEntry {
                name: "text-embedding-3-small".into(),
                provider: "openai".into(),
                model_type: ModelType::Embedding,
            },
        ])
    }

    #[test]
    fn only_chat_models_are_selectable() {
        let registry = registry();
        let names: Vec<&str> = registry
            .chat_models()
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["claude-3-5-sonnet", "gpt-4o"]);
        assert!(!registry.is_selectable("text-embedding-3-small"));
        assert!(!registry.is_selectable("missing"));
    }

    #[test]
    fn filter_selectable_drops_unknown_and_duplicates() {
        let registry = registry();
        let picked = registry.filter_selectable(&[
            "gpt-4o".into(),
            "missing".into(),
            "text-embedding-3-small".into(),
            "gpt-4o".into(),
            "claude-3-5-sonnet".into(),
        ]);
        assert_eq!(picked, vec!["gpt-4o".to_string(), "claude-3-5-sonnet".to_string()]);
    }

    #[test]
    fn parses_unknown_model_types() {
        let entry: ModelEntry =
            serde_json::from_str(r#"{"name":"x","provider":"p","type":"video"}"#).unwrap();
        assert_eq!(entry.model_type, ModelType::Other);
        assert!(!entry.is_chat());
    }
}
