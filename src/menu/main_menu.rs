use crate::component::frame_video_generator::{
    CodecCandidate, DEFAULT_CODEC_PRIORITY, MPEG4_FIRST_CODEC_PRIORITY,
};
use crate::config::save::save_settings;
use crate::config::types::MAX_FRAME_RATE;
use crate::config::{Config, Language};
use crate::menu::handlers::run_frame_video_generator;
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use log::{info, warn};
use rust_i18n::t;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 主選單迴圈，直到使用者離開或發生錯誤
pub fn run_menu_loop(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    loop {
        match show_main_menu(term, shutdown_signal, config) {
            Ok(true) => {}
            Ok(false) => {
                term.clear_screen()?;
                println!("\n{}", style(t!("main_menu.goodbye")).green().bold());
                info!("Program exited normally");
                break;
            }
            Err(e) => {
                warn!("Program error: {e}");
                eprintln!("{} {}", style(t!("common.error_prefix")).red().bold(), e);
                break;
            }
        }
    }

    Ok(())
}

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style(t!("main_menu.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let options = vec![
        t!("main_menu.opt_frame_video"),
        t!("main_menu.opt_settings"),
        t!("main_menu.exit"),
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("main_menu.prompt"))
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_frame_video_generator(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(2) | None => Ok(false), // ESC pressed - exit
        _ => unreachable!(),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style(t!("settings.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let options = vec![
            t!("settings.opt_frame_rate"),
            t!("settings.opt_codec_order"),
            t!("settings.opt_enhance"),
            t!("settings.opt_verify"),
            t!("settings.opt_language"),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_frame_rate_menu(term, config)?,
            Some(1) => show_codec_order_menu(term, config)?,
            Some(2) => show_enhance_menu(term, config)?,
            Some(3) => show_verify_menu(term, config)?,
            Some(4) => show_language_menu(term, config)?,
            Some(5) | None => break, // ESC or back
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn announce_saved(value: impl std::fmt::Display) {
    println!("\n{} {}", style(t!("settings.saved")).green(), value);
    std::thread::sleep(std::time::Duration::from_secs(1));
}

/// 影格率設定
fn show_frame_rate_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.frame_rate.title")).cyan().bold());

    let frame_rate: u32 = Input::new()
        .with_prompt(t!("settings.frame_rate.prompt"))
        .default(config.settings.frame_video.frame_rate)
        .validate_with(|value: &u32| -> Result<(), String> {
            if (1..=MAX_FRAME_RATE).contains(value) {
                Ok(())
            } else {
                Err(t!("settings.frame_rate.invalid", max = MAX_FRAME_RATE).to_string())
            }
        })
        .interact_text_on(term)?;

    if frame_rate != config.settings.frame_video.frame_rate {
        config.settings.frame_video.frame_rate = frame_rate;
        save_settings(&config.settings)?;
        announce_saved(format!("{frame_rate} fps"));
    }

    Ok(())
}

/// 編碼器嘗試順序
fn show_codec_order_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.codec_order.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let current = &config.settings.frame_video.codec_priority;
    println!(
        "\n{} {}",
        style(t!("settings.codec_order.current")).dim(),
        describe_priority(current)
    );
    println!();

    let presets: [&[CodecCandidate]; 2] = [&DEFAULT_CODEC_PRIORITY, &MPEG4_FIRST_CODEC_PRIORITY];
    let items: Vec<String> = presets.iter().map(|p| describe_priority(p)).collect();

    let default_index = presets
        .iter()
        .position(|p| *p == current.as_slice())
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.codec_order.prompt"))
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC pressed - return without saving
    let Some(selection) = selection else {
        return Ok(());
    };

    let selected = presets[selection];
    if selected != current.as_slice() {
        config.settings.frame_video.codec_priority = selected.to_vec();
        save_settings(&config.settings)?;
        announce_saved(describe_priority(selected));
    }

    Ok(())
}

fn describe_priority(priority: &[CodecCandidate]) -> String {
    priority
        .iter()
        .map(|c| c.codec.fourcc())
        .collect::<Vec<_>>()
        .join(" > ")
}

/// CLAHE 對比強化開關
fn show_enhance_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.enhance.title")).cyan().bold());
    println!(
        "{}",
        style(t!(
            "settings.enhance.detail",
            clip = config.settings.frame_video.clip_limit,
            cols = config.settings.frame_video.tile_grid.0,
            rows = config.settings.frame_video.tile_grid.1
        ))
        .dim()
    );

    let enhance = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.enhance.prompt"))
        .default(config.settings.frame_video.enhance)
        .interact_on(term)?;

    if enhance != config.settings.frame_video.enhance {
        config.settings.frame_video.enhance = enhance;
        save_settings(&config.settings)?;
        announce_saved(enhance);
    }

    Ok(())
}

/// ffprobe 影格數驗證開關
fn show_verify_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.verify.title")).cyan().bold());

    let verify = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.verify.prompt"))
        .default(config.settings.frame_video.verify_output)
        .interact_on(term)?;

    if verify != config.settings.frame_video.verify_output {
        config.settings.frame_video.verify_output = verify;
        save_settings(&config.settings)?;
        announce_saved(verify);
    }

    Ok(())
}

/// 語言設定選單
fn show_language_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.language.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let languages = Language::ALL;
    let items: Vec<String> = languages.iter().map(ToString::to_string).collect();

    let default_index = languages
        .iter()
        .position(|&l| l == config.settings.language)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("settings.language.prompt"))
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC pressed - return without saving
    let Some(selection) = selection else {
        return Ok(());
    };

    let selected_lang = languages[selection];

    if selected_lang != config.settings.language {
        config.settings.language = selected_lang;
        rust_i18n::set_locale(selected_lang.as_str());
        save_settings(&config.settings)?;
        announce_saved(selected_lang);
    }

    Ok(())
}
