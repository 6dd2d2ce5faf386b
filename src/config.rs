use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// App configuration, read from `config.toml` in the platform config
/// directory. Missing file or fields fall back to defaults; the API key can
/// also come from `GARNISH_API_KEY`, which wins over the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GarnishConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
}

impl Default for GarnishConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
        }
    }
}

impl GarnishConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("garnish").join("config.toml"))
    }

    pub fn load_or_default() -> Self {
        let mut config = Self::config_path()
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(raw) => match toml::from_str(&raw) {
                    Ok(config) => Some(config),
                    Err(err) => {
                        warn!(path = %path.display(), %err, "ignoring malformed config file");
                        None
                    }
                },
                Err(_) => None,
            })
            .unwrap_or_default();

        if let Ok(key) = std::env::var("GARNISH_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = key;
            }
        }
        config
    }
}
