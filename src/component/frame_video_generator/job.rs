use super::codec_negotiator::CodecCandidate;
use super::error::JobError;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const OUTPUT_EXTENSION: &str = "mp4";

/// 工作狀態機：Pending → Staging → CodecNegotiation → Encoding →
/// {Succeeded | Failed} → Cleanup → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    Staging,
    CodecNegotiation,
    Encoding,
    Succeeded,
    Failed,
    Cleanup,
    Done,
}

#[derive(Debug)]
pub enum JobStatus {
    Success,
    SkippedEmpty,
    Failed(JobError),
}

impl JobStatus {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedEmpty)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&JobError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// 一個葉資料夾對應一個影片工作
#[derive(Debug)]
pub struct VideoJob {
    pub leaf_dir: PathBuf,
    pub output_path: PathBuf,
    pub frame_rate: u32,
    pub frame_count: usize,
    pub codec: Option<CodecCandidate>,
    pub phase: JobPhase,
    pub elapsed: Duration,
}

impl VideoJob {
    #[must_use]
    pub fn new(leaf_dir: &Path, frame_rate: u32) -> Self {
        Self {
            leaf_dir: leaf_dir.to_path_buf(),
            output_path: output_path_for(leaf_dir),
            frame_rate,
            frame_count: 0,
            codec: None,
            phase: JobPhase::Pending,
            elapsed: Duration::ZERO,
        }
    }

    pub fn advance(&mut self, phase: JobPhase) {
        debug!(
            "{}: {:?} -> {:?}",
            self.leaf_dir.display(),
            self.phase,
            phase
        );
        self.phase = phase;
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub job: VideoJob,
    pub status: JobStatus,
}

/// `<葉資料夾>/<資料夾名稱>.mp4`
#[must_use]
pub fn output_path_for(leaf_dir: &Path) -> PathBuf {
    let name = leaf_dir
        .file_name()
        .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().to_string());
    leaf_dir.join(format!("{name}.{OUTPUT_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_directory_name() {
        assert_eq!(
            output_path_for(Path::new("/frames/run_01")),
            Path::new("/frames/run_01/run_01.mp4")
        );
    }

    #[test]
    fn test_output_path_for_root_falls_back() {
        assert_eq!(output_path_for(Path::new("/")), Path::new("/output.mp4"));
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = VideoJob::new(Path::new("/frames/a"), 30);
        assert_eq!(job.phase, JobPhase::Pending);
        assert_eq!(job.output_path, Path::new("/frames/a/a.mp4"));
        assert!(job.codec.is_none());
    }
}
