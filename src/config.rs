use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Runtime configuration, read from the environment after `.env` is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub title_model: Option<String>,
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let base_url = env::var("GATEWAY_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = non_empty_var("GATEWAY_API_KEY");
        let title_model = non_empty_var("GATEWAY_TITLE_MODEL");
        let page_size = parsed_var("GATEWAY_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1);
        let state_dir = non_empty_var("GATEWAY_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size,
            title_model,
            state_dir,
        }
    }

    pub fn tabs_file(&self) -> PathBuf {
        self.state_dir.join("tabs.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            title_model: None,
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("gateway-console");
    }

    PathBuf::from("cache")
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, fallback = %default, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_file_lives_in_state_dir() {
        let config = Config {
            state_dir: PathBuf::from("/tmp/console"),
            ..Config::default()
        };
        assert_eq!(config.tabs_file(), PathBuf::from("/tmp/console/tabs.json"));
    }

    #[test]
    fn default_page_size_is_twenty() {
        assert_eq!(Config::default().page_size, 20);
        assert!(Config::default().api_key.is_none());
    }
}
