//! 目錄樹走訪與批次驅動
//!
//! 葉資料夾（沒有子資料夾）是工作單位。單一葉資料夾失敗不會中止批次，
//! 只有根目錄驗證失敗會回傳給呼叫端。

use super::backend::VideoBackend;
use super::frame_collator::STAGING_DIR_NAME;
use super::job::{JobOutcome, JobStatus};
use super::sequence_encoder::{FrameProgress, SequenceEncoder};
use crate::tools::{JobLog, PathError, resolve_directory};
use log::{Level, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

fn is_staging_dir(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == STAGING_DIR_NAME)
}

/// 只看子資料夾，不看檔案內容；暫存資料夾不算子資料夾。
/// 指向資料夾的符號連結也算子資料夾，但走訪時不會進入。
pub fn classify(directory: &Path) -> io::Result<NodeKind> {
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() && !is_staging_dir(&path) {
            return Ok(NodeKind::Internal);
        }
    }
    Ok(NodeKind::Leaf)
}

/// 深度優先、依名稱排序列出所有葉資料夾（包含根目錄本身）
#[must_use]
pub fn find_leaf_directories(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_staging_dir(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("無法讀取目錄項目: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| match classify(entry.path()) {
            Ok(NodeKind::Leaf) => Some(entry.into_path()),
            Ok(NodeKind::Internal) => None,
            Err(e) => {
                warn!("無法分類資料夾 {}: {e}", entry.path().display());
                None
            }
        })
        .collect()
}

/// 批次過程的回報介面，方法皆有空實作
pub trait BatchObserver {
    fn batch_started(&mut self, _root: &Path, _leaf_count: usize) {}

    /// `index` 從 1 開始
    fn job_started(&mut self, _index: usize, _total: usize, _leaf_dir: &Path) {}

    fn frame_progress(&mut self, _progress: &FrameProgress) {}

    fn job_finished(&mut self, _outcome: &JobOutcome) {}
}

pub struct SilentObserver;

impl BatchObserver for SilentObserver {}

#[derive(Debug)]
pub struct BatchSummary {
    pub root: PathBuf,
    pub outcomes: Vec<JobOutcome>,
    /// 收到中斷信號後未開始的葉資料夾
    pub cancelled: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl BatchSummary {
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.outcomes.len() + self.cancelled.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_skipped()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.status.error().is_some())
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }
}

pub struct BatchDriver<B: VideoBackend> {
    encoder: SequenceEncoder,
    backend: B,
    job_log: JobLog,
    shutdown_signal: Arc<AtomicBool>,
}

impl<B: VideoBackend> BatchDriver<B> {
    /// 每個批次重新開始；上一個批次留下的中斷信號會被清除
    #[must_use]
    pub fn new(
        encoder: SequenceEncoder,
        backend: B,
        job_log: JobLog,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        shutdown_signal.store(false, Ordering::SeqCst);
        Self {
            encoder,
            backend,
            job_log,
            shutdown_signal,
        }
    }

    /// 依序處理根目錄下每個葉資料夾；中斷信號只在工作之間檢查
    pub fn run(
        &mut self,
        root: &Path,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchSummary, PathError> {
        let started = Instant::now();
        let root = resolve_directory(root)?;

        let leaves = find_leaf_directories(&root);
        self.job_log.info(&format!(
            "開始批次處理: {} ({} 個葉資料夾, {} fps)",
            root.display(),
            leaves.len(),
            self.encoder.frame_rate()
        ));
        observer.batch_started(&root, leaves.len());

        let total = leaves.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = Vec::new();

        for (offset, leaf_dir) in leaves.iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                cancelled = leaves[offset..].to_vec();
                self.job_log.record(
                    Level::Warn,
                    &format!("收到中斷信號，剩餘 {} 個資料夾未處理", cancelled.len()),
                );
                break;
            }

            observer.job_started(offset + 1, total, leaf_dir);
            let outcome = self.encoder.process_leaf(&mut self.backend, leaf_dir, &mut |progress| {
                observer.frame_progress(progress);
            });
            self.record_outcome(&outcome);
            observer.job_finished(&outcome);
            outcomes.push(outcome);
        }

        let summary = BatchSummary {
            root,
            outcomes,
            cancelled,
            elapsed: started.elapsed(),
        };

        self.job_log.info(&format!(
            "批次處理結束: 成功 {}, 跳過 {}, 失敗 {}, 取消 {}, 耗時 {:.1} 秒",
            summary.succeeded(),
            summary.skipped(),
            summary.failed(),
            summary.cancelled.len(),
            summary.elapsed.as_secs_f64()
        ));
        info!("批次處理完成: {}", summary.root.display());

        Ok(summary)
    }

    fn record_outcome(&mut self, outcome: &JobOutcome) {
        let job = &outcome.job;
        match &outcome.status {
            JobStatus::Success => {
                let codec = job
                    .codec
                    .map_or_else(|| "-".to_string(), |c| c.codec.to_string());
                self.job_log.info(&format!(
                    "成功處理: {} -> {} ({} 張影格, {codec}, {:.1} 秒)",
                    job.leaf_dir.display(),
                    job.output_path.display(),
                    job.frame_count,
                    job.elapsed.as_secs_f64()
                ));
            }
            JobStatus::SkippedEmpty => {
                self.job_log
                    .info(&format!("跳過（無圖片）: {}", job.leaf_dir.display()));
            }
            JobStatus::Failed(e) => {
                self.job_log.error(&format!(
                    "處理失敗 [{}]: {}: {e}",
                    e.kind(),
                    job.leaf_dir.display()
                ));
            }
        }
    }
}
