use super::codec_negotiator::CodecAttempt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 影片寫入端（開啟、寫入、關閉）的錯誤
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("無法啟動 ffmpeg: {0}")]
    Spawn(#[source] io::Error),
    #[error("編碼器無法開啟: {0}")]
    Rejected(String),
    #[error("影格尺寸 {actual_width}x{actual_height} 與輸出串流 {width}x{height} 不符")]
    FrameSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("寫入影格失敗: {source}{}", format_stderr(.stderr))]
    Write {
        #[source]
        source: io::Error,
        stderr: String,
    },
    #[error("ffmpeg 異常結束 ({status}){}", format_stderr(.stderr))]
    Process { status: String, stderr: String },
    #[error("無法驗證輸出影片: {0}")]
    Verify(String),
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// 單一工作的致命錯誤；只會讓目前的資料夾失敗，批次繼續
#[derive(Debug, Error)]
pub enum JobError {
    #[error("無法列出資料夾內容 {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("無法建立暫存資料夾 {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("無法複製影格 {} -> {}: {source}", .from.display(), .to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("沒有影格或第一張影格無法讀取: {}", .path.display())]
    EmptyOrUnreadableFirstFrame {
        path: PathBuf,
        #[source]
        source: Option<image::ImageError>,
    },
    #[error("無法讀取影格 {}: {source}", .path.display())]
    UnreadableFrame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("找不到可用的編碼器（{}）", format_attempts(.attempts))]
    NoCompatibleCodec { attempts: Vec<CodecAttempt> },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("輸出影格數不符: 預期 {expected}，實際 {actual}")]
    FrameCountMismatch { expected: usize, actual: u64 },
}

impl JobError {
    /// 紀錄檔使用的固定分類名稱
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::Staging { .. } => "staging",
            Self::CopyFailure { .. } => "copy_failure",
            Self::EmptyOrUnreadableFirstFrame { .. } => "unreadable_first_frame",
            Self::UnreadableFrame { .. } => "unreadable_frame",
            Self::NoCompatibleCodec { .. } => "no_compatible_codec",
            Self::Encode(_) => "encode",
            Self::FrameCountMismatch { .. } => "frame_count_mismatch",
        }
    }
}

fn format_attempts(attempts: &[CodecAttempt]) -> String {
    if attempts.is_empty() {
        return "沒有設定任何編碼器".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.candidate.codec, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
