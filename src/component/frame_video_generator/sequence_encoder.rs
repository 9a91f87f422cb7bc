//! 影格序列編碼
//!
//! 驅動收集、協商與強化，把一個葉資料夾編成一支影片。
//! 影格嚴格依序號處理；暫存資料夾在任何結果下都會刪除。

use super::backend::{FrameSize, FrameWriter, OpenRequest, VideoBackend};
use super::codec_negotiator::CodecNegotiator;
use super::error::JobError;
use super::frame_collator::{StagingDir, collate};
use super::frame_enhancer::FrameEnhancer;
use super::job::{JobOutcome, JobPhase, JobStatus, VideoJob};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader, RgbImage};
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// 每 N 張影格回報一次進度（最後一張一定回報）
pub const PROGRESS_INTERVAL: usize = 10;

pub const DEFAULT_FRAME_RATE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProgress {
    /// 從 1 開始
    pub index: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl FrameProgress {
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.index as f64 / self.total as f64 * 100.0
    }
}

#[must_use]
pub const fn should_report(index: usize, total: usize) -> bool {
    index % PROGRESS_INTERVAL == 0 || index == total
}

pub struct SequenceEncoder {
    negotiator: CodecNegotiator,
    enhancer: Option<FrameEnhancer>,
    frame_rate: u32,
}

impl SequenceEncoder {
    /// `enhancer` 為 None 時影格原樣寫入
    #[must_use]
    pub const fn new(
        negotiator: CodecNegotiator,
        enhancer: Option<FrameEnhancer>,
        frame_rate: u32,
    ) -> Self {
        Self {
            negotiator,
            enhancer,
            frame_rate,
        }
    }

    #[must_use]
    pub const fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// 處理單一葉資料夾：收集、暫存、編碼、清理
    pub fn process_leaf<B: VideoBackend>(
        &self,
        backend: &mut B,
        leaf_dir: &Path,
        on_progress: &mut dyn FnMut(&FrameProgress),
    ) -> JobOutcome {
        let started = Instant::now();
        let mut job = VideoJob::new(leaf_dir, self.frame_rate);

        job.advance(JobPhase::Staging);
        let status = match collate(leaf_dir) {
            Ok(None) => JobStatus::SkippedEmpty,
            Ok(Some(staging)) => {
                job.frame_count = staging.len();
                match self.encode(backend, &mut job, staging, on_progress) {
                    Ok(()) => JobStatus::Success,
                    Err(e) => JobStatus::Failed(e),
                }
            }
            Err(e) => {
                // 部分暫存已在 collate 內隨 StagingDir 刪除
                job.advance(JobPhase::Failed);
                job.advance(JobPhase::Cleanup);
                JobStatus::Failed(e)
            }
        };

        job.advance(JobPhase::Done);
        job.elapsed = started.elapsed();
        JobOutcome { job, status }
    }

    /// 將已暫存的影格編碼為影片；結束時一定刪除暫存資料夾
    pub fn encode<B: VideoBackend>(
        &self,
        backend: &mut B,
        job: &mut VideoJob,
        staging: StagingDir,
        on_progress: &mut dyn FnMut(&FrameProgress),
    ) -> Result<(), JobError> {
        let staging_path = staging.path().to_path_buf();
        let result = self.write_video(backend, job, &staging, on_progress);

        if result.is_ok() {
            job.advance(JobPhase::Succeeded);
        } else {
            job.advance(JobPhase::Failed);
        }

        job.advance(JobPhase::Cleanup);
        if let Err(e) = staging.remove() {
            warn!("無法刪除暫存資料夾 {}: {e}", staging_path.display());
        }

        // 已開始寫入的輸出檔案不完整，刪除
        if result.is_err() && job.codec.is_some() && job.output_path.exists() {
            match fs::remove_file(&job.output_path) {
                Ok(()) => info!("已刪除失敗的輸出檔案: {}", job.output_path.display()),
                Err(e) => warn!(
                    "無法刪除失敗的輸出檔案 {}: {e}",
                    job.output_path.display()
                ),
            }
        }

        result
    }

    fn write_video<B: VideoBackend>(
        &self,
        backend: &mut B,
        job: &mut VideoJob,
        staging: &StagingDir,
        on_progress: &mut dyn FnMut(&FrameProgress),
    ) -> Result<(), JobError> {
        let frames = staging.frames();
        let size = first_frame_size(staging)?;

        job.advance(JobPhase::CodecNegotiation);
        let output_path = job.output_path.clone();
        let request = OpenRequest {
            output_path: &output_path,
            frame_rate: self.frame_rate,
            size,
            scratch_dir: staging.path(),
        };
        let negotiated = self.negotiator.negotiate(backend, &request)?;
        job.codec = Some(negotiated.candidate);
        let mut writer = negotiated.writer;

        job.advance(JobPhase::Encoding);
        info!(
            "正在生成影片: {} -> {} ({} 張影格, {size}, {})",
            job.leaf_dir.display(),
            output_path.display(),
            frames.len(),
            negotiated.candidate.codec
        );

        let started = Instant::now();
        let total = frames.len();
        for (offset, path) in frames.iter().enumerate() {
            let frame = load_frame(path, size)?;
            let frame = match &self.enhancer {
                Some(enhancer) => enhancer.enhance(&frame),
                None => frame,
            };
            writer.write_frame(&frame)?;

            let index = offset + 1;
            if should_report(index, total) {
                on_progress(&FrameProgress {
                    index,
                    total,
                    elapsed: started.elapsed(),
                });
            }
        }

        let written = writer.finish()?;
        if written != total as u64 {
            return Err(JobError::FrameCountMismatch {
                expected: total,
                actual: written,
            });
        }

        info!(
            "影片生成完成: {} ({:.1} 秒)",
            output_path.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<fs::File>>, ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?)
}

fn first_frame_size(staging: &StagingDir) -> Result<FrameSize, JobError> {
    let Some(first) = staging.frames().first() else {
        return Err(JobError::EmptyOrUnreadableFirstFrame {
            path: staging.path().to_path_buf(),
            source: None,
        });
    };

    let (width, height) = open_reader(first)
        .and_then(ImageReader::into_dimensions)
        .map_err(|source| JobError::EmptyOrUnreadableFirstFrame {
            path: first.clone(),
            source: Some(source),
        })?;

    if width == 0 || height == 0 {
        return Err(JobError::EmptyOrUnreadableFirstFrame {
            path: first.clone(),
            source: None,
        });
    }

    Ok(FrameSize::new(width, height))
}

/// 解碼為 8 位元 RGB；尺寸與第一張不同時縮放，確保輸出影格數與輸入一致
fn load_frame(path: &Path, size: FrameSize) -> Result<RgbImage, JobError> {
    let frame = open_reader(path)
        .and_then(ImageReader::decode)
        .map(DynamicImage::into_rgb8)
        .map_err(|source| JobError::UnreadableFrame {
            path: path.to_path_buf(),
            source,
        })?;

    if frame.dimensions() == (size.width, size.height) {
        return Ok(frame);
    }

    warn!(
        "影格尺寸 {}x{} 與第一張影格 {size} 不同，已縮放: {}",
        frame.width(),
        frame.height(),
        path.display()
    );
    Ok(imageops::resize(
        &frame,
        size.width,
        size.height,
        FilterType::Triangle,
    ))
}
