//! 影格收集與暫存
//!
//! 列出資料夾中的圖片、依檔名排序，複製到暫存資料夾並重新命名為
//! `image_0001.<ext>` 形式。暫存資料夾由 `StagingDir` 持有，離開作用域時一定刪除。

use super::error::JobError;
use filetime::FileTime;
use log::{debug, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif"];

/// 保留名稱：葉資料夾內的暫存資料夾
pub const STAGING_DIR_NAME: &str = "tmp_img_seq";

const STAGED_PREFIX: &str = "image_";
const MIN_INDEX_WIDTH: usize = 4;

#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// 列出資料夾中的圖片檔（不遞迴），依檔名遞增排序
pub fn list_frames(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}

/// 序號位數：至少 4 位，超過 9999 張時加寬，避免檔名重複或排序錯亂
#[must_use]
pub fn index_width(count: usize) -> usize {
    count.to_string().len().max(MIN_INDEX_WIDTH)
}

/// 暫存檔名，保留原始副檔名（含大小寫）
#[must_use]
pub fn staged_file_name(index: usize, width: usize, source: &Path) -> String {
    match source.extension() {
        Some(ext) => format!(
            "{STAGED_PREFIX}{index:0width$}.{}",
            ext.to_string_lossy()
        ),
        None => format!("{STAGED_PREFIX}{index:0width$}"),
    }
}

/// 單一工作專用的暫存資料夾
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    frames: Vec<PathBuf>,
    removed: bool,
}

impl StagingDir {
    /// 在葉資料夾內建立全新的暫存資料夾；殘留的舊資料夾會先刪除
    pub fn create(leaf_dir: &Path) -> Result<Self, JobError> {
        let path = leaf_dir.join(STAGING_DIR_NAME);
        let staging_error = |source| JobError::Staging {
            path: path.clone(),
            source,
        };

        if path.exists() {
            warn!("清除殘留的暫存資料夾: {}", path.display());
            fs::remove_dir_all(&path).map_err(staging_error)?;
        }
        fs::create_dir(&path).map_err(staging_error)?;

        Ok(Self {
            path,
            frames: Vec::new(),
            removed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 依影格順序排列的暫存檔案
    #[must_use]
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 主動刪除並回報錯誤；未呼叫時由 Drop 處理
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        remove_if_exists(&self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_if_exists(&self.path) {
            warn!("無法刪除暫存資料夾 {}: {e}", self.path.display());
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

/// 依序複製影格到暫存資料夾；任何一張失敗時，已複製的部分隨暫存資料夾一併刪除
pub fn stage_frames(leaf_dir: &Path, sources: &[PathBuf]) -> Result<StagingDir, JobError> {
    let mut staging = StagingDir::create(leaf_dir)?;
    let width = index_width(sources.len());

    for (index, source) in sources.iter().enumerate() {
        let target = staging
            .path
            .join(staged_file_name(index + 1, width, source));
        copy_with_metadata(source, &target).map_err(|source_error| JobError::CopyFailure {
            from: source.clone(),
            to: target.clone(),
            source: source_error,
        })?;
        staging.frames.push(target);
    }

    debug!(
        "已暫存 {} 張影格: {}",
        staging.frames.len(),
        staging.path.display()
    );
    Ok(staging)
}

/// 複製內容與權限，並保留存取與修改時間
fn copy_with_metadata(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let metadata = fs::metadata(from)?;
    filetime::set_file_times(
        to,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
}

/// 收集並暫存葉資料夾的影格；沒有圖片時回傳 None（跳過，不是錯誤）
pub fn collate(leaf_dir: &Path) -> Result<Option<StagingDir>, JobError> {
    let sources = list_frames(leaf_dir).map_err(|source| JobError::Scan {
        path: leaf_dir.to_path_buf(),
        source,
    })?;

    if sources.is_empty() {
        return Ok(None);
    }

    stage_frames(leaf_dir, &sources).map(Some)
}
