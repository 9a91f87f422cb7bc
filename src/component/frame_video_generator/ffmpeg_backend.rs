//! 以 ffmpeg 子程序實作的影片寫入端
//!
//! 影格以 rawvideo 從 stdin 餵入，stderr 寫到暫存資料夾內的紀錄檔，
//! 失敗時擷取最後幾行放進錯誤訊息。

use super::backend::{FrameSize, FrameWriter, OpenRequest, VideoBackend};
use super::codec_negotiator::CodecCandidate;
use super::error::EncodeError;
use crate::tools::{VideoInfo, get_video_info};
use image::RgbImage;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// 協商時試編一張影格的輸出檔，位於暫存資料夾
pub const PROBE_FILE_NAME: &str = "codec_probe.mp4";
const STDERR_LOG_NAME: &str = "ffmpeg_stderr.log";
const STDERR_TAIL_LINES: usize = 5;
const STDIN_BUFFER_SIZE: usize = 1 << 20;
const INPUT_PIXEL_FORMAT: &str = "rgb24";
const FRAME_RATE_TOLERANCE: f64 = 0.01;

pub struct FfmpegCommand {
    candidate: CodecCandidate,
    size: FrameSize,
    frame_rate: u32,
    output_path: PathBuf,
}

impl FfmpegCommand {
    #[must_use]
    pub fn new(
        candidate: CodecCandidate,
        size: FrameSize,
        frame_rate: u32,
        output_path: &Path,
    ) -> Self {
        Self {
            candidate,
            size,
            frame_rate,
            output_path: output_path.to_path_buf(),
        }
    }

    /// 輸入一律是 rgb24
    #[must_use]
    pub const fn bytes_per_frame(&self) -> usize {
        self.size.pixel_count() * 3
    }

    #[must_use]
    pub fn build_command(&self) -> Command {
        let codec = self.candidate.codec;
        let size = self.size.to_string();
        let frame_rate = self.frame_rate.to_string();

        let mut cmd = Command::new("ffmpeg");
        isolate_from_terminal_signals(&mut cmd);
        cmd.args([
            "-hide_banner",
            "-nostats",
            "-loglevel", "error",
            "-y",
            "-f", "rawvideo",
            "-pix_fmt", INPUT_PIXEL_FORMAT,
            "-s", &size,
            "-r", &frame_rate,
            "-i", "pipe:0",
            "-an",
            "-c:v", codec.encoder(),
            "-pix_fmt", codec.pixel_format(),
        ]);
        cmd.args(codec.quality_args());
        cmd.args(["-r", &frame_rate, "-movflags", "+faststart", "-f", "mp4"]);
        cmd.arg(&self.output_path);

        cmd
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FfmpegBackend {
    verify_output: bool,
}

impl FfmpegBackend {
    /// `verify_output` 需要 ffprobe
    #[must_use]
    pub const fn new(verify_output: bool) -> Self {
        Self { verify_output }
    }

    /// 以黑色影格試編一次，確認編碼器、尺寸與 MP4 容器可以搭配
    fn probe(candidate: CodecCandidate, request: &OpenRequest<'_>) -> Result<(), EncodeError> {
        let probe_path = request.scratch_dir.join(PROBE_FILE_NAME);
        let ffmpeg_cmd = FfmpegCommand::new(candidate, request.size, request.frame_rate, &probe_path);

        let mut command = ffmpeg_cmd.build_command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(EncodeError::Spawn)?;
        if let Some(mut stdin) = child.stdin.take() {
            // 編碼器不存在時 ffmpeg 會提早結束，寫入失敗以結束碼為準
            let blank = vec![0u8; ffmpeg_cmd.bytes_per_frame()];
            if let Err(e) = stdin.write_all(&blank) {
                debug!("試編寫入中斷 ({}): {e}", candidate.codec);
            }
        }

        let output = child.wait_with_output().map_err(EncodeError::Spawn)?;
        if let Err(e) = fs::remove_file(&probe_path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("無法刪除試編檔案 {}: {e}", probe_path.display());
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = tail_lines(&String::from_utf8_lossy(&output.stderr));
        if stderr.is_empty() {
            Err(EncodeError::Rejected(output.status.to_string()))
        } else {
            Err(EncodeError::Rejected(stderr))
        }
    }
}

impl VideoBackend for FfmpegBackend {
    type Writer = FfmpegWriter;

    fn open(
        &mut self,
        candidate: CodecCandidate,
        request: &OpenRequest<'_>,
    ) -> Result<FfmpegWriter, EncodeError> {
        if !candidate.color {
            return Err(EncodeError::Rejected(format!(
                "{} 只支援彩色輸出",
                candidate.codec
            )));
        }
        Self::probe(candidate, request)?;
        FfmpegWriter::spawn(candidate, request, self.verify_output)
    }
}

pub struct FfmpegWriter {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr_path: PathBuf,
    output_path: PathBuf,
    size: FrameSize,
    frame_rate: u32,
    frames_written: u64,
    verify_output: bool,
    finished: bool,
}

impl FfmpegWriter {
    fn spawn(
        candidate: CodecCandidate,
        request: &OpenRequest<'_>,
        verify_output: bool,
    ) -> Result<Self, EncodeError> {
        let stderr_path = request.scratch_dir.join(STDERR_LOG_NAME);
        let stderr_file = File::create(&stderr_path).map_err(EncodeError::Spawn)?;

        let ffmpeg_cmd = FfmpegCommand::new(
            candidate,
            request.size,
            request.frame_rate,
            request.output_path,
        );
        let mut command = ffmpeg_cmd.build_command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file));

        let mut child = command.spawn().map_err(EncodeError::Spawn)?;
        debug!(
            "啟動 ffmpeg [{}]: {}",
            child.id(),
            request.output_path.display()
        );
        let stdin = child
            .stdin
            .take()
            .map(|s| BufWriter::with_capacity(STDIN_BUFFER_SIZE, s));

        Ok(Self {
            child,
            stdin,
            stderr_path,
            output_path: request.output_path.to_path_buf(),
            size: request.size,
            frame_rate: request.frame_rate,
            frames_written: 0,
            verify_output,
            finished: false,
        })
    }

    fn stderr_tail(&self) -> String {
        fs::read_to_string(&self.stderr_path)
            .map(|s| tail_lines(&s))
            .unwrap_or_default()
    }

    /// 終止程序並附上 stderr
    fn abort(&mut self, source: io::Error) -> EncodeError {
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.finished = true;
        EncodeError::Write {
            source,
            stderr: self.stderr_tail(),
        }
    }

    fn verify(&self) -> Result<u64, EncodeError> {
        let info = get_video_info(&self.output_path)
            .map_err(|e| EncodeError::Verify(format!("{e:#}")))?;
        debug!(
            "驗證輸出 {}: codec={}",
            self.output_path.display(),
            info.codec_name.as_deref().unwrap_or("?")
        );
        check_output(&info, self.size, self.frame_rate)
    }
}

/// 比對 ffprobe 結果與預期的尺寸、幀率，回傳實際影格數
fn check_output(info: &VideoInfo, size: FrameSize, frame_rate: u32) -> Result<u64, EncodeError> {
    if (info.width, info.height) != (size.width, size.height) {
        return Err(EncodeError::Verify(format!(
            "輸出尺寸 {}x{} 與預期 {size} 不符",
            info.width, info.height
        )));
    }

    if (info.frame_rate - f64::from(frame_rate)).abs() > FRAME_RATE_TOLERANCE {
        return Err(EncodeError::Verify(format!(
            "輸出幀率 {:.3} 與預期 {frame_rate} 不符",
            info.frame_rate
        )));
    }

    info.frame_count
        .ok_or_else(|| EncodeError::Verify("ffprobe 未回報影格數".to_string()))
}

/// 讓 ffmpeg 使用獨立的程序群組，終端機的 Ctrl-C 只送到本程式
#[cfg(unix)]
fn isolate_from_terminal_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_from_terminal_signals(_cmd: &mut Command) {}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), EncodeError> {
        let (width, height) = frame.dimensions();
        if (width, height) != (self.size.width, self.size.height) {
            return Err(EncodeError::FrameSize {
                width: self.size.width,
                height: self.size.height,
                actual_width: width,
                actual_height: height,
            });
        }

        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(frame.as_raw()),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "ffmpeg stdin 已關閉")),
        };

        if let Err(source) = result {
            return Err(self.abort(source));
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<u64, EncodeError> {
        if let Some(mut stdin) = self.stdin.take()
            && let Err(source) = stdin.flush()
        {
            return Err(self.abort(source));
        }

        let status = self.child.wait().map_err(|source| EncodeError::Write {
            source,
            stderr: String::new(),
        })?;
        self.finished = true;

        if !status.success() {
            return Err(EncodeError::Process {
                status: status.to_string(),
                stderr: self.stderr_tail(),
            });
        }

        if self.verify_output {
            return self.verify();
        }
        Ok(self.frames_written)
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // 中途放棄：關閉輸入並終止程序，避免殘留子程序
        self.stdin.take();
        if let Err(e) = self.child.kill() {
            warn!("無法終止 ffmpeg [{}]: {e}", self.child.id());
        }
        let _ = self.child.wait();
    }
}

fn tail_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::frame_video_generator::codec_negotiator::Codec;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_build_command_for_h264() {
        let cmd = FfmpegCommand::new(
            CodecCandidate::color(Codec::H264),
            FrameSize::new(640, 360),
            30,
            Path::new("/videos/A/A.mp4"),
        )
        .build_command();
        let args = args(&cmd);

        assert_eq!(cmd.get_program(), "ffmpeg");
        assert_eq!(value_after(&args, "-s").as_deref(), Some("640x360"));
        assert_eq!(value_after(&args, "-i").as_deref(), Some("pipe:0"));
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("libx264"));
        assert_eq!(value_after(&args, "-f").as_deref(), Some("rawvideo"));
        assert_eq!(value_after(&args, "-crf").as_deref(), Some("18"));
        assert_eq!(args.last().map(String::as_str), Some("/videos/A/A.mp4"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
    }

    #[test]
    fn test_input_is_always_rgb24() {
        let cmd = FfmpegCommand::new(
            CodecCandidate::color(Codec::Mjpeg),
            FrameSize::new(4, 2),
            25,
            Path::new("/o.mp4"),
        );
        assert_eq!(cmd.bytes_per_frame(), 24);

        let args = args(&cmd.build_command());
        assert_eq!(value_after(&args, "-pix_fmt").as_deref(), Some("rgb24"));
        assert!(!args.iter().any(|a| a == "gray"));
    }

    #[test]
    fn test_open_rejects_grayscale_candidate() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let request = OpenRequest {
            output_path: &output,
            scratch_dir: dir.path(),
            size: FrameSize::new(4, 4),
            frame_rate: 30,
        };
        let candidate = CodecCandidate {
            codec: Codec::H264,
            color: false,
        };

        let result = FfmpegBackend::new(false).open(candidate, &request);
        assert!(matches!(result, Err(EncodeError::Rejected(_))));
        assert!(!output.exists());
    }

    fn info(width: u32, height: u32, frame_rate: f64, frame_count: Option<u64>) -> VideoInfo {
        VideoInfo {
            width,
            height,
            frame_rate,
            frame_count,
            codec_name: Some("h264".to_string()),
        }
    }

    #[test]
    fn test_check_output_accepts_matching_video() {
        let size = FrameSize::new(640, 360);
        let result = check_output(&info(640, 360, 30.0, Some(12)), size, 30);
        assert_eq!(result.unwrap(), 12);
    }

    #[test]
    fn test_check_output_rejects_wrong_frame_rate() {
        let size = FrameSize::new(640, 360);
        let result = check_output(&info(640, 360, 25.0, Some(12)), size, 30);
        assert!(matches!(result, Err(EncodeError::Verify(msg)) if msg.contains("幀率")));
    }

    #[test]
    fn test_check_output_rejects_wrong_size_and_missing_count() {
        let size = FrameSize::new(640, 360);
        assert!(matches!(
            check_output(&info(320, 180, 30.0, Some(12)), size, 30),
            Err(EncodeError::Verify(_))
        ));
        assert!(matches!(
            check_output(&info(640, 360, 30.0, None), size, 30),
            Err(EncodeError::Verify(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_child_runs_in_own_process_group() {
        // /proc/<pid>/stat 第 5 欄是程序群組
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo $$; cut -d' ' -f5 /proc/$$/stat"]);
        isolate_from_terminal_signals(&mut cmd);

        let Ok(output) = cmd.output() else {
            eprintln!("找不到 sh，略過測試");
            return;
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().map(str::trim).collect();
        assert_eq!(lines.len(), 2, "{stdout}");
        assert_eq!(lines[0], lines[1]);
        assert_ne!(lines[1], std::process::id().to_string());
    }

    #[test]
    fn test_tail_lines_keeps_last_lines() {
        let text = "1\n2\n\n3\n4\n5\n6\n7\n";
        assert_eq!(tail_lines(text), "3\n4\n5\n6\n7");
        assert_eq!(tail_lines(""), "");
    }
}
