use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

use crate::session::Timings;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/process_user_input";
pub const DEFAULT_PROMPT_FIELD: &str = "prompt_form_input";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub prompt_field: String,
    pub typing_interval_ms: u64,
    pub dispatch_delay_ms: u64,
    pub toast_visible_ms: u64,
    pub toast_fade_ms: u64,
    pub scroll_settle_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            prompt_field: DEFAULT_PROMPT_FIELD.to_string(),
            typing_interval_ms: 10,
            dispatch_delay_ms: 400,
            toast_visible_ms: 3000,
            toast_fade_ms: 400,
            scroll_settle_ms: 100,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings {
            typing_interval: Duration::from_millis(self.typing_interval_ms),
            dispatch_delay: Duration::from_millis(self.dispatch_delay_ms),
            toast_visible: Duration::from_millis(self.toast_visible_ms),
            toast_fade: Duration::from_millis(self.toast_fade_ms),
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sai-chat").join("config.json"))
    }
}
