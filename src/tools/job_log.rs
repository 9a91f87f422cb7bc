//! 批次工作紀錄檔
//!
//! 每次批次執行由呼叫端建立一個 `JobLog`，逐行追加紀錄，
//! 同時轉送到 `log` 門面，方便在終端機以 `RUST_LOG` 觀察。

use super::path_validator::ensure_directory_exists;
use chrono::Local;
use log::{Level, log, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "frame_video.log";

pub struct JobLog {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl JobLog {
    /// 以追加模式開啟紀錄檔，不存在時建立
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_directory_exists(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Some(file),
        })
    }

    /// 開啟失敗時退回只寫入 `log` 門面
    #[must_use]
    pub fn open_or_disabled(path: &Path) -> Self {
        Self::open(path).unwrap_or_else(|e| {
            warn!("無法開啟紀錄檔 {}: {e}", path.display());
            Self::disabled()
        })
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, level: Level, message: &str) {
        log!(level, "{message}");

        let Some(file) = self.file.as_mut() else {
            return;
        };

        let line = format_line(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string(), level, message);
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
            warn!("寫入紀錄檔失敗: {e}");
        }
    }

    pub fn info(&mut self, message: &str) {
        self.record(Level::Info, message);
    }

    pub fn error(&mut self, message: &str) {
        self.record(Level::Error, message);
    }
}

fn format_line(timestamp: &str, level: Level, message: &str) -> String {
    // 訊息中的換行會破壞一行一筆的格式
    let message = message.replace(['\r', '\n'], " ");
    format!("{timestamp} - {level} - {message}\n")
}
