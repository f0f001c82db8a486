//! Private file storage for uploaded templates
//!
//! Layout: `{root}/reports/user_{user_id}/report_{report_id}/{file}`.
//! Paths handed around the application are relative to the root.

use std::path::{Component, Path, PathBuf};

use tokio::fs;

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path escapes storage root: {0}")]
    InvalidPath(String),
}

/// Private disk rooted at a directory
#[derive(Debug, Clone)]
pub struct PrivateStorage {
    root: PathBuf,
}

impl PrivateStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a report's main template and subreports
    pub fn report_dir(user_id: i64, report_id: i64) -> String {
        format!("reports/user_{user_id}/report_{report_id}")
    }

    /// Absolute path of a relative storage path.
    pub fn path(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative.is_empty() {
            return Err(StorageError::InvalidPath(relative.to_owned()));
        }
        Ok(self.root.join(rel))
    }

    /// Write `bytes` as `dir/file_name`, creating directories; returns the
    /// relative path. An existing file is replaced.
    pub async fn put(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let relative = format!("{}/{}", dir.trim_end_matches('/'), file_name);
        let path = self.path(&relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "stored file");
        Ok(relative)
    }

    /// Remove a file; a missing file is not an error.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.path(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a directory tree; a missing directory is not an error.
    pub async fn delete_dir(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.path(relative)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parent directory of a relative file path (`a/b/c.jrxml` -> `a/b`).
pub fn parent_dir(relative: &str) -> Option<&str> {
    relative.rsplit_once('/').map(|(dir, _)| dir).filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_dir_layout() {
        assert_eq!(PrivateStorage::report_dir(3, 17), "reports/user_3/report_17");
    }

    #[test]
    fn rejects_escaping_paths() {
        let storage = PrivateStorage::new("/srv/private");
        assert!(storage.path("reports/../../etc/passwd").is_err());
        assert!(storage.path("/etc/passwd").is_err());
        assert!(storage.path("").is_err());
        assert_eq!(
            storage.path("reports/user_1/report_2/a.jrxml").unwrap(),
            PathBuf::from("/srv/private/reports/user_1/report_2/a.jrxml")
        );
    }

    #[test]
    fn parent_of_relative_path() {
        assert_eq!(
            parent_dir("reports/user_1/report_2/main.jrxml"),
            Some("reports/user_1/report_2")
        );
        assert_eq!(parent_dir("main.jrxml"), None);
    }

    #[tokio::test]
    async fn put_and_delete_dir() {
        let root = tempfile::tempdir().unwrap();
        let storage = PrivateStorage::new(root.path());
        let dir = PrivateStorage::report_dir(1, 2);

        let rel = storage.put(&dir, "main.jrxml", b"<jasperReport/>").await.unwrap();
        storage.put(&dir, "sub.jrxml", b"<jasperReport/>").await.unwrap();
        assert_eq!(rel, "reports/user_1/report_2/main.jrxml");
        assert!(storage.path(&rel).unwrap().exists());

        storage.delete_dir(&dir).await.unwrap();
        assert!(!root.path().join(&dir).exists());
        // Idempotent
        storage.delete_dir(&dir).await.unwrap();
        storage.delete(&rel).await.unwrap();
    }
}
