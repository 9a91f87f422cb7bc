use anyhow::Result;
use auto_frame_video::cli::{Cli, Command};
use auto_frame_video::component::FrameVideoGenerator;
use auto_frame_video::component::frame_video_generator::resolve_input_path;
use auto_frame_video::config::Config;
use auto_frame_video::init;
use auto_frame_video::menu::run_menu_loop;
use auto_frame_video::signal::setup_shutdown_signal;
use clap::Parser;
use console::Term;
use log::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        init::init_with_filter("debug");
    } else {
        init::init();
    }

    let shutdown_signal = setup_shutdown_signal()?;

    // Load config and set locale
    let mut config = Config::new()?;
    rust_i18n::set_locale(config.settings.language.as_str());

    match cli.command {
        Some(command) => {
            command.apply_overrides(&mut config.settings.frame_video);
            let Command::Video { path, .. } = &command;
            let root = match path {
                Some(path) => path.clone(),
                None => resolve_input_path("")?,
            };

            info!("Non-interactive run: {}", root.display());
            FrameVideoGenerator::new(config, shutdown_signal).run_path(&root)
        }
        None => run_menu_loop(&Term::stdout(), &shutdown_signal, &mut config),
    }
}
