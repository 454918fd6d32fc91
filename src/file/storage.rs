//! Blob storage for uploaded file content.
//!
//! Blobs live in a sharded directory structure keyed by a UUID name:
//! ```text
//! {base_path}/
//! ├── ab/
//! │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
//! └── cd/
//!     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
//! ```
//! The stored name is what [`FileMetadata::path`](super::FileMetadata) holds.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{Result, VaultError};

/// Longest extension kept from the original filename.
const MAX_EXTENSION_LENGTH: usize = 16;

/// On-disk store for file blobs.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage, creating the base directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Save content under a fresh stored name and return that name.
    pub async fn save(&self, content: &[u8], original_name: &str) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name);
        let path = self.prepare_path(&stored_name).await?;
        fs::write(&path, content).await?;
        Ok(stored_name)
    }

    /// Create an empty blob for streaming writes.
    pub async fn create(&self, stored_name: &str) -> Result<fs::File> {
        let path = self.prepare_path(stored_name).await?;
        Ok(fs::File::create(&path).await?)
    }

    /// Load a blob's content.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(stored_name)?;
        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VaultError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob. Returns `false` if it did not exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let path = self.blob_path(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a blob exists.
    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.blob_path(stored_name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Full path of a blob: `{base_path}/{shard}/{stored_name}`.
    ///
    /// Rejects names that could escape the base directory.
    pub fn blob_path(&self, stored_name: &str) -> Result<PathBuf> {
        let valid = !stored_name.is_empty()
            && stored_name != "."
            && stored_name != ".."
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !valid {
            return Err(VaultError::Validation(format!(
                "invalid stored name: {stored_name}"
            )));
        }
        Ok(self.base_path.join(Self::shard(stored_name)).join(stored_name))
    }

    async fn prepare_path(&self, stored_name: &str) -> Result<PathBuf> {
        let path = self.blob_path(stored_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }

    /// First two characters of the stored name.
    fn shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Lowercased alphanumeric extension of `filename`, or `bin`.
    fn extension(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LENGTH
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Generate a new UUID-based stored name keeping the original extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), Self::extension(original_name))
    }
}
