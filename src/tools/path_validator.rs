use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 根目錄驗證失敗，整個批次不會開始處理
#[derive(Debug, Error)]
pub enum PathError {
    #[error("路徑不存在: {}", .0.display())]
    NotFound(PathBuf),
    #[error("路徑不是資料夾: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("無法解析路徑 {}: {source}", .path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn validate_directory_exists(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        return Err(PathError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(PathError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// 轉為絕對路徑後驗證（不解析符號連結）
pub fn resolve_directory(path: &Path) -> Result<PathBuf, PathError> {
    let absolute = std::path::absolute(path).map_err(|source| PathError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })?;
    validate_directory_exists(&absolute)?;
    Ok(absolute)
}

pub fn ensure_directory_exists(path: &Path) -> io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            validate_directory_exists(&missing),
            Err(PathError::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_file_is_not_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("frame.png");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            validate_directory_exists(&file),
            Err(PathError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_resolve_directory_returns_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_directory(temp_dir.path()).unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_ensure_directory_exists_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
