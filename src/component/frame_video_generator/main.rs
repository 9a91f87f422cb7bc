use super::codec_negotiator::CodecNegotiator;
use super::ffmpeg_backend::FfmpegBackend;
use super::frame_enhancer::FrameEnhancer;
use super::job::{JobOutcome, JobStatus};
use super::sequence_encoder::{FrameProgress, SequenceEncoder};
use super::tree_walker::{BatchDriver, BatchObserver, BatchSummary};
use crate::config::save::{add_recent_path, save_settings};
use crate::config::{Config, FrameVideoSettings};
use crate::tools::{JobLog, is_ffmpeg_available, is_ffprobe_available};
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 影格轉影片元件
///
/// 走訪資料夾樹，把每個葉資料夾內的圖片依檔名順序編成
/// `<資料夾>/<資料夾名稱>.mp4`。
pub struct FrameVideoGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl FrameVideoGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影格轉影片 ===").cyan().bold());

        let Some(input_path) = self.prompt_input_path()? else {
            return Ok(()); // ESC pressed
        };
        let root = resolve_input_path(&input_path)?;

        // 更新路徑歷史並儲存
        {
            let mut settings = self.config.settings.clone();
            add_recent_path(&mut settings, &root.to_string_lossy());
            if let Err(e) = save_settings(&settings) {
                warn!("無法儲存路徑歷史: {e}");
            }
        }

        self.run_path(&root)
    }

    /// 非互動模式：處理指定根目錄並印出摘要
    pub fn run_path(&self, root: &Path) -> Result<()> {
        let summary = self.process_root(root)?;
        self.print_summary(&summary);
        Ok(())
    }

    pub fn process_root(&self, root: &Path) -> Result<BatchSummary> {
        if !is_ffmpeg_available() {
            bail!("找不到 ffmpeg，請先安裝並加入 PATH");
        }

        let settings = &self.config.settings.frame_video;
        let verify_output = settings.verify_output && {
            let available = is_ffprobe_available();
            if !available {
                warn!("找不到 ffprobe，略過輸出影格數驗證");
            }
            available
        };

        let job_log = JobLog::open_or_disabled(&settings.log_file);
        if let Some(path) = job_log.path() {
            println!("{}", style(format!("紀錄檔: {}", path.display())).dim());
        }

        let mut driver = BatchDriver::new(
            build_encoder(settings),
            FfmpegBackend::new(verify_output),
            job_log,
            Arc::clone(&self.shutdown_signal),
        );

        let mut observer = ConsoleObserver::default();
        driver
            .run(root, &mut observer)
            .with_context(|| format!("無法處理資料夾: {}", root.display()))
    }

    fn prompt_input_path(&self) -> Result<Option<String>> {
        let recent_paths = &self.config.settings.recent_paths;

        if recent_paths.is_empty() {
            return Ok(Some(prompt_new_path()?));
        }

        let mut options: Vec<String> = recent_paths
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let exists = Path::new(p).exists();
                let indicator = if exists { "✓" } else { "✗" };
                format!("{} [{}] {}", i + 1, indicator, p)
            })
            .collect();
        options.push("輸入新路徑...".to_string());

        println!("{}", style("(按 ESC 返回主選單)").dim());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇路徑")
            .items(&options)
            .default(0)
            .interact_opt()?;

        match selection {
            None => Ok(None),
            Some(idx) if idx < recent_paths.len() => Ok(Some(recent_paths[idx].clone())),
            Some(_) => Ok(Some(prompt_new_path()?)),
        }
    }

    fn print_summary(&self, summary: &BatchSummary) {
        println!();
        println!("{}", style("=== 影格轉影片摘要 ===").cyan().bold());
        println!("  根目錄: {}", summary.root.display());
        println!("  總計: {} 個葉資料夾", summary.leaf_count());
        println!("  成功: {} 個", style(summary.succeeded()).green());

        if summary.skipped() > 0 {
            println!("  跳過: {} 個（無圖片）", style(summary.skipped()).yellow());
        }

        if summary.failed() > 0 {
            println!("  失敗: {} 個", style(summary.failed()).red());
            for outcome in summary.failures() {
                if let Some(e) = outcome.status.error() {
                    println!(
                        "    {} {} [{}]",
                        style("✗").red(),
                        outcome.job.leaf_dir.display(),
                        e.kind()
                    );
                }
            }
        }

        if summary.was_cancelled() {
            println!("  取消: {} 個", style(summary.cancelled.len()).yellow());
        }

        println!("  耗時: {:.1} 秒", summary.elapsed.as_secs_f64());

        info!(
            "影格轉影片完成 - 成功: {}, 跳過: {}, 失敗: {}, 取消: {}",
            summary.succeeded(),
            summary.skipped(),
            summary.failed(),
            summary.cancelled.len()
        );
    }
}

/// 依設定建立編碼器
#[must_use]
pub fn build_encoder(settings: &FrameVideoSettings) -> SequenceEncoder {
    let enhancer = settings
        .enhance
        .then(|| FrameEnhancer::new(settings.clip_limit, settings.tile_grid));

    SequenceEncoder::new(
        CodecNegotiator::new(settings.codec_priority.clone()),
        enhancer,
        settings.frame_rate,
    )
}

/// 空白輸入代表目前工作目錄
pub fn resolve_input_path(input: &str) -> Result<PathBuf> {
    let trimmed = input.trim().trim_matches(['"', '\'']);
    if trimmed.is_empty() {
        return env::current_dir().context("無法取得目前工作目錄");
    }
    Ok(PathBuf::from(trimmed))
}

fn prompt_new_path() -> Result<String> {
    let path: String = Input::new()
        .with_prompt("請輸入影格資料夾路徑（留空使用目前目錄）")
        .allow_empty(true)
        .interact_text()?;
    Ok(path.trim().to_string())
}

#[derive(Default)]
struct ConsoleObserver {
    progress_bar: Option<ProgressBar>,
}

impl ConsoleObserver {
    fn progress_bar(&mut self, total: usize) -> &ProgressBar {
        self.progress_bar.get_or_insert_with(|| {
            let progress_bar = ProgressBar::new(total as u64);
            progress_bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .expect("Invalid progress bar template")
                    .progress_chars("#>-"),
            );
            progress_bar
        })
    }
}

impl BatchObserver for ConsoleObserver {
    fn batch_started(&mut self, root: &Path, leaf_count: usize) {
        println!(
            "{}",
            style(format!("在 {} 找到 {leaf_count} 個葉資料夾", root.display())).green()
        );
    }

    fn job_started(&mut self, index: usize, total: usize, leaf_dir: &Path) {
        let name = leaf_dir
            .file_name()
            .map_or_else(|| leaf_dir.display().to_string(), |n| n.to_string_lossy().to_string());
        println!(
            "\n{} [{index}/{total}] {}",
            style("處理中").cyan(),
            style(name).bold()
        );
    }

    fn frame_progress(&mut self, progress: &FrameProgress) {
        let progress_bar = self.progress_bar(progress.total);
        progress_bar.set_position(progress.index as u64);
        progress_bar.set_message(format!(
            "{:.1}% 已用 {:.1} 秒",
            progress.percent(),
            progress.elapsed.as_secs_f64()
        ));
    }

    fn job_finished(&mut self, outcome: &JobOutcome) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }

        let job = &outcome.job;
        match &outcome.status {
            JobStatus::Success => println!(
                "  {} {} ({} 張影格, {:.1} 秒)",
                style("✓").green(),
                job.output_path.display(),
                job.frame_count,
                job.elapsed.as_secs_f64()
            ),
            JobStatus::SkippedEmpty => {
                println!("  {} 沒有圖片，跳過", style("⤳").dim());
            }
            JobStatus::Failed(e) => println!("  {} 處理失敗: {e}", style("✗").red()),
        }
    }
}
