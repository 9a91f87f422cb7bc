use std::process::{Command, Stdio};

/// 檢查外部工具是否可執行（以 `-version` 測試）
#[must_use]
pub fn is_tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[must_use]
pub fn is_ffmpeg_available() -> bool {
    is_tool_available("ffmpeg")
}

#[must_use]
pub fn is_ffprobe_available() -> bool {
    is_tool_available("ffprobe")
}
