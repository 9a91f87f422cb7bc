//! 影格轉影片元件
//!
//! 流程：
//! 1. 走訪目錄樹，找出葉資料夾（沒有子資料夾）
//! 2. 依檔名排序圖片，複製到暫存資料夾並重新編號
//! 3. 依優先順序協商可用的編碼器
//! 4. 逐張解碼、CLAHE 強化後寫入 MP4
//! 5. 無論成敗都刪除暫存資料夾

mod backend;
mod codec_negotiator;
mod error;
mod ffmpeg_backend;
mod frame_collator;
mod frame_enhancer;
mod job;
mod main;
mod sequence_encoder;
mod tree_walker;

pub use backend::{FrameSize, FrameWriter, OpenRequest, VideoBackend};
pub use codec_negotiator::{
    Codec, CodecAttempt, CodecCandidate, CodecNegotiator, DEFAULT_CODEC_PRIORITY,
    MPEG4_FIRST_CODEC_PRIORITY, NegotiatedWriter,
};
pub use error::{EncodeError, JobError};
pub use ffmpeg_backend::{FfmpegBackend, FfmpegCommand, FfmpegWriter};
pub use frame_collator::{
    IMAGE_EXTENSIONS, STAGING_DIR_NAME, StagingDir, collate, index_width, is_image_file,
    list_frames, stage_frames, staged_file_name,
};
pub use frame_enhancer::{DEFAULT_CLIP_LIMIT, DEFAULT_TILE_GRID, FrameEnhancer};
pub use job::{JobOutcome, JobPhase, JobStatus, OUTPUT_EXTENSION, VideoJob, output_path_for};
pub use main::{FrameVideoGenerator, build_encoder, resolve_input_path};
pub use sequence_encoder::{
    DEFAULT_FRAME_RATE, FrameProgress, PROGRESS_INTERVAL, SequenceEncoder, should_report,
};
pub use tree_walker::{
    BatchDriver, BatchObserver, BatchSummary, NodeKind, SilentObserver, classify,
    find_leaf_directories,
};
