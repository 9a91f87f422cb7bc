use crate::component::frame_video_generator::{
    CodecCandidate, DEFAULT_CLIP_LIMIT, DEFAULT_CODEC_PRIORITY, DEFAULT_FRAME_RATE,
    DEFAULT_TILE_GRID,
};
use crate::tools::DEFAULT_LOG_FILE;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 最近使用路徑的最大數量
pub const MAX_RECENT_PATHS: usize = 10;

pub const MAX_FRAME_RATE: u32 = 240;
/// CLAHE 每個方向的區塊格數上限
pub const MAX_TILE_GRID: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "zh-CN")]
    ZhCn,
}

impl Language {
    pub const ALL: [Self; 3] = [Self::EnUs, Self::ZhTw, Self::ZhCn];

    /// rust-i18n 的 locale 名稱
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::ZhTw => "zh-TW",
            Self::ZhCn => "zh-CN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnUs => write!(f, "English"),
            Self::ZhTw => write!(f, "繁體中文"),
            Self::ZhCn => write!(f, "简体中文"),
        }
    }
}

/// 影格轉影片設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameVideoSettings {
    pub frame_rate: u32,
    /// 依序嘗試的編碼器
    pub codec_priority: Vec<CodecCandidate>,
    /// 是否套用 CLAHE 對比強化
    pub enhance: bool,
    pub clip_limit: f32,
    pub tile_grid: (u32, u32),
    /// 編碼後以 ffprobe 確認影格數
    pub verify_output: bool,
    pub log_file: PathBuf,
}

impl Default for FrameVideoSettings {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            codec_priority: DEFAULT_CODEC_PRIORITY.to_vec(),
            enhance: true,
            clip_limit: DEFAULT_CLIP_LIMIT,
            tile_grid: DEFAULT_TILE_GRID,
            verify_output: true,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl FrameVideoSettings {
    /// 把手動編輯造成的無效值換回預設值
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        if self.frame_rate == 0 || self.frame_rate > MAX_FRAME_RATE {
            warn!("無效的影格率 {}，改用 {}", self.frame_rate, defaults.frame_rate);
            self.frame_rate = defaults.frame_rate;
        }

        if self.codec_priority.is_empty() {
            warn!("編碼器清單為空，改用預設順序");
            self.codec_priority = defaults.codec_priority;
        } else {
            if self.codec_priority.iter().any(|c| !c.color) {
                warn!("輸出只支援彩色，忽略編碼器清單中的灰階設定");
            }
            for candidate in &mut self.codec_priority {
                candidate.color = true;
            }
            let mut seen = Vec::with_capacity(self.codec_priority.len());
            self.codec_priority.retain(|c| {
                let first = !seen.contains(c);
                seen.push(*c);
                first
            });
        }

        if !self.clip_limit.is_finite() || self.clip_limit <= 0.0 {
            warn!("無效的 clip limit {}，改用 {}", self.clip_limit, defaults.clip_limit);
            self.clip_limit = defaults.clip_limit;
        }

        if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
            warn!("無效的區塊格數 {:?}，改用 {:?}", self.tile_grid, defaults.tile_grid);
            self.tile_grid = defaults.tile_grid;
        } else if self.tile_grid.0 > MAX_TILE_GRID || self.tile_grid.1 > MAX_TILE_GRID {
            let clamped = (
                self.tile_grid.0.min(MAX_TILE_GRID),
                self.tile_grid.1.min(MAX_TILE_GRID),
            );
            warn!("區塊格數 {:?} 過大，改用 {clamped:?}", self.tile_grid);
            self.tile_grid = clamped;
        }

        if self.log_file.as_os_str().is_empty() {
            self.log_file = defaults.log_file;
        }
    }
}

/// 使用者設定（存於 settings.json）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub language: Language,
    pub recent_paths: Vec<String>,
    pub frame_video: FrameVideoSettings,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: UserSettings,
}
