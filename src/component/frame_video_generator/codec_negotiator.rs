//! 編碼器協商
//!
//! 依設定的優先順序逐一嘗試候選編碼器，第一個成功開啟的就固定用於整個工作。

use super::backend::{OpenRequest, VideoBackend};
use super::error::{EncodeError, JobError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    H264,
    Mpeg4,
    Xvid,
    Mjpeg,
}

impl Codec {
    /// 四字元代碼，與常見影片工具的命名一致
    #[must_use]
    pub const fn fourcc(self) -> &'static str {
        match self {
            Self::H264 => "avc1",
            Self::Mpeg4 => "mp4v",
            Self::Xvid => "XVID",
            Self::Mjpeg => "MJPG",
        }
    }

    /// 對應的 ffmpeg 編碼器名稱
    #[must_use]
    pub const fn encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Mpeg4 => "mpeg4",
            Self::Xvid => "libxvid",
            Self::Mjpeg => "mjpeg",
        }
    }

    #[must_use]
    pub const fn pixel_format(self) -> &'static str {
        match self {
            Self::H264 | Self::Mpeg4 | Self::Xvid => "yuv420p",
            Self::Mjpeg => "yuvj420p",
        }
    }

    #[must_use]
    pub const fn quality_args(self) -> [&'static str; 2] {
        match self {
            Self::H264 => ["-crf", "18"],
            Self::Mpeg4 | Self::Xvid | Self::Mjpeg => ["-q:v", "3"],
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::H264 => "H.264",
            Self::Mpeg4 => "MPEG-4",
            Self::Xvid => "XviD",
            Self::Mjpeg => "Motion JPEG",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.fourcc())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCandidate {
    pub codec: Codec,
    pub color: bool,
}

impl CodecCandidate {
    #[must_use]
    pub const fn color(codec: Codec) -> Self {
        Self { codec, color: true }
    }
}

/// 預設順序：H.264 優先，其次 MPEG-4、XviD，最後 Motion JPEG
pub const DEFAULT_CODEC_PRIORITY: [CodecCandidate; 4] = [
    CodecCandidate::color(Codec::H264),
    CodecCandidate::color(Codec::Mpeg4),
    CodecCandidate::color(Codec::Xvid),
    CodecCandidate::color(Codec::Mjpeg),
];

/// MPEG-4 優先的替代順序，給 H.264 編碼器不穩定的環境使用
pub const MPEG4_FIRST_CODEC_PRIORITY: [CodecCandidate; 4] = [
    CodecCandidate::color(Codec::Mpeg4),
    CodecCandidate::color(Codec::H264),
    CodecCandidate::color(Codec::Xvid),
    CodecCandidate::color(Codec::Mjpeg),
];

/// 單次失敗的嘗試
#[derive(Debug, Clone)]
pub struct CodecAttempt {
    pub candidate: CodecCandidate,
    pub reason: String,
}

pub struct NegotiatedWriter<W> {
    pub candidate: CodecCandidate,
    pub writer: W,
    /// 成功前失敗的嘗試，依嘗試順序排列
    pub failed_attempts: Vec<CodecAttempt>,
}

#[derive(Debug, Clone)]
pub struct CodecNegotiator {
    priority: Vec<CodecCandidate>,
}

impl Default for CodecNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_CODEC_PRIORITY.to_vec())
    }
}

impl CodecNegotiator {
    #[must_use]
    pub const fn new(priority: Vec<CodecCandidate>) -> Self {
        Self { priority }
    }

    #[must_use]
    pub fn priority(&self) -> &[CodecCandidate] {
        &self.priority
    }

    /// 依序嘗試候選編碼器，第一個成功者立即回傳，其餘不再嘗試
    pub fn negotiate<B: VideoBackend>(
        &self,
        backend: &mut B,
        request: &OpenRequest<'_>,
    ) -> Result<NegotiatedWriter<B::Writer>, JobError> {
        let mut failed_attempts = Vec::new();

        for &candidate in &self.priority {
            debug!(
                "嘗試編碼器 {} ({}, {} fps): {}",
                candidate.codec,
                request.size,
                request.frame_rate,
                request.output_path.display()
            );

            match backend.open(candidate, request) {
                Ok(writer) => {
                    info!("使用編碼器 {}: {}", candidate.codec, request.output_path.display());
                    return Ok(NegotiatedWriter {
                        candidate,
                        writer,
                        failed_attempts,
                    });
                }
                Err(e) => {
                    warn!("編碼器 {} 無法使用，嘗試下一個: {e}", candidate.codec);
                    failed_attempts.push(CodecAttempt {
                        candidate,
                        reason: summarize(&e),
                    });
                }
            }
        }

        Err(JobError::NoCompatibleCodec {
            attempts: failed_attempts,
        })
    }
}

fn summarize(error: &EncodeError) -> String {
    // ffmpeg 的錯誤訊息可能很長，只保留最後一行
    let message = error.to_string();
    message
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}
