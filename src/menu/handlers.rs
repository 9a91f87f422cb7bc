use crate::component::FrameVideoGenerator;
use crate::config::Config;
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use rust_i18n::t;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_frame_video_generator(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    let generator = FrameVideoGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        eprintln!("{} {:#}", style(t!("common.error_prefix")).red().bold(), e);
    }

    // 元件會更新最近路徑，重新讀取以同步
    *config = Config::new()?;

    pause(term)?;
    Ok(())
}
