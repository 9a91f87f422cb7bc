mod ffmpeg_locator;
mod ffprobe_info;
mod job_log;
mod path_validator;

pub use ffmpeg_locator::{is_ffmpeg_available, is_ffprobe_available, is_tool_available};
pub use ffprobe_info::{VideoInfo, get_video_info};
pub use job_log::{DEFAULT_LOG_FILE, JobLog};
pub use path_validator::{
    PathError, ensure_directory_exists, resolve_directory, validate_directory_exists,
};
