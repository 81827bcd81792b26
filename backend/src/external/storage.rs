//! Local-disk storage for item images and attendance photos
//!
//! The database keeps bare filenames; this module owns where they live on disk
//! and under which URL they are served.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

/// Subdirectories of the storage root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDir {
    Items,
    Attendance,
    Avatars,
}

impl StorageDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageDir::Items => "items",
            StorageDir::Attendance => "attendance",
            StorageDir::Avatars => "avatars",
        }
    }
}

/// File storage client
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
    public_url: String,
}

impl FileStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `dir` and return the generated filename
    pub async fn save(
        &self,
        dir: StorageDir,
        prefix: &str,
        extension: &str,
        bytes: &[u8],
    ) -> AppResult<String> {
        let filename = format!(
            "{}{}_{}.{}",
            prefix,
            Utc::now().timestamp(),
            Uuid::new_v4().simple(),
            extension
        );
        let dir_path = self.root.join(dir.as_str());

        tokio::fs::create_dir_all(&dir_path)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create directory: {}", e)))?;
        tokio::fs::write(dir_path.join(&filename), bytes)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to write file: {}", e)))?;

        tracing::debug!(dir = dir.as_str(), %filename, size = bytes.len(), "stored file");
        Ok(filename)
    }

    /// Delete a stored file. A file that is already gone is not an error.
    ///
    /// Returns whether a file was actually removed.
    pub async fn delete_if_exists(&self, dir: StorageDir, filename: &str) -> AppResult<bool> {
        let path = self.resolve(dir, filename)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::StorageError(format!(
                "Failed to delete {}: {}",
                filename, e
            ))),
        }
    }

    /// Public URL a stored file is served from
    pub fn public_url(&self, dir: StorageDir, filename: &str) -> String {
        format!("{}/{}/{}", self.public_url, dir.as_str(), filename)
    }

    fn resolve(&self, dir: StorageDir, filename: &str) -> AppResult<PathBuf> {
        // Stored names are bare filenames; anything with a path component is rejected
        match Path::new(filename).file_name() {
            Some(name) if name == filename => Ok(self.root.join(dir.as_str()).join(name)),
            _ => Err(AppError::StorageError(format!(
                "Invalid stored filename: {}",
                filename
            ))),
        }
    }
}
