use crate::config::FrameVideoSettings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "auto_frame_video",
    version,
    about = "Batch-convert folders of image frames into MP4 videos"
)]
pub struct Cli {
    /// 不帶子命令時進入互動選單
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encode every leaf folder under PATH (defaults to the current directory)
    Video {
        path: Option<PathBuf>,

        /// Output frame rate
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=240))]
        fps: Option<u32>,

        /// Write frames without contrast enhancement
        #[arg(long)]
        no_enhance: bool,

        /// Skip the ffprobe frame count check
        #[arg(long)]
        no_verify: bool,

        /// Job log file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

impl Command {
    /// 命令列參數覆寫已儲存的設定（不寫回 settings.json）
    pub fn apply_overrides(&self, settings: &mut FrameVideoSettings) {
        let Self::Video {
            fps,
            no_enhance,
            no_verify,
            log_file,
            ..
        } = self;

        if let Some(fps) = fps {
            settings.frame_rate = *fps;
        }
        if *no_enhance {
            settings.enhance = false;
        }
        if *no_verify {
            settings.verify_output = false;
        }
        if let Some(log_file) = log_file {
            settings.log_file.clone_from(log_file);
        }
    }
}
