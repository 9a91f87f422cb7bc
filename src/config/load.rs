use crate::config::types::{Config, UserSettings};
use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::Path;

pub const SETTINGS_FILE: &str = "settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Self {
            settings: load_settings_or_default(Path::new(SETTINGS_FILE)),
        })
    }
}

/// 讀取設定；檔案不存在時回傳預設值
pub fn load_settings(path: &Path) -> Result<UserSettings> {
    if !path.exists() {
        return Ok(UserSettings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    let mut settings: UserSettings = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
    settings.frame_video.sanitize();

    Ok(settings)
}

/// 損毀的設定檔不阻止程式啟動
pub fn load_settings_or_default(path: &Path) -> UserSettings {
    load_settings(path).unwrap_or_else(|e| {
        warn!("{e:#}，使用預設設定");
        UserSettings::default()
    })
}
