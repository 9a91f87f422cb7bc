//! 影片寫入端抽象
//!
//! `VideoBackend` 負責以指定編碼器開啟輸出串流；`FrameWriter` 是開啟後的單一串流，
//! 影格必須依序寫入。實際實作見 `ffmpeg_backend`，測試則使用記憶體內的假實作。

use super::codec_negotiator::CodecCandidate;
use super::error::EncodeError;
use image::RgbImage;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 開啟輸出串流所需的參數
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    pub output_path: &'a Path,
    pub frame_rate: u32,
    pub size: FrameSize,
    /// 工作期間可自由使用的暫存資料夾（即 staging 資料夾）
    pub scratch_dir: &'a Path,
}

pub trait VideoBackend {
    type Writer: FrameWriter;

    /// 以指定候選編碼器開啟輸出串流；回傳成功即代表串流已可寫入
    fn open(
        &mut self,
        candidate: CodecCandidate,
        request: &OpenRequest<'_>,
    ) -> Result<Self::Writer, EncodeError>;
}

pub trait FrameWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), EncodeError>;

    /// 關閉串流並回傳輸出檔案中的影格數
    fn finish(self) -> Result<u64, EncodeError>;
}
