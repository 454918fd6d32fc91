//! File metadata types for filevault.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Unique file ID.
    pub id: i64,
    /// Display filename.
    pub name: String,
    /// MIME type recorded at upload.
    pub mime_type: String,
    /// File size in bytes.
    pub size: i64,
    /// Owning user.
    pub user_id: i64,
    /// Containing folder (None for the drive root).
    pub folder_id: Option<i64>,
    /// Stored blob name (UUID.ext format).
    #[serde(skip_serializing)]
    pub path: String,
    /// Whether the owner starred the file.
    pub starred: bool,
    /// Whether at least one share points at the file.
    pub is_shared: bool,
    /// Whether the file sits in the trash.
    pub in_trash: bool,
    /// When the file was moved to the trash.
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the file was last viewed or downloaded.
    pub last_accessed_at: DateTime<Utc>,
    /// When the file was uploaded.
    pub created_at: DateTime<Utc>,
    /// When the file was last changed.
    pub modified_at: DateTime<Utc>,
}

/// Data for creating a new file entry.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Display filename.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub size: i64,
    /// Owning user.
    pub user_id: i64,
    /// Containing folder.
    pub folder_id: Option<i64>,
    /// Stored blob name.
    pub path: String,
}

impl NewFile {
    /// Create a new NewFile at the drive root.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
        user_id: i64,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            user_id,
            folder_id: None,
            path: path.into(),
        }
    }

    /// Place the file in a folder.
    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }
}

/// Builder for updating file metadata.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub mime_type: Option<String>,
    /// New size; the owner's usage moves by the difference.
    pub size: Option<i64>,
    pub folder_id: Option<Option<i64>>,
    pub path: Option<String>,
    pub starred: Option<bool>,
    pub is_shared: Option<bool>,
    pub in_trash: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access at `now`. Does not count as a modification.
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            last_accessed_at: Some(now),
            ..Self::default()
        }
    }

    /// Move to the trash at `now`.
    pub fn trash(now: DateTime<Utc>) -> Self {
        Self {
            in_trash: Some(true),
            deleted_at: Some(Some(now)),
            ..Self::default()
        }
    }

    /// Take out of the trash.
    pub fn restore() -> Self {
        Self {
            in_trash: Some(false),
            deleted_at: Some(None),
            ..Self::default()
        }
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the size.
    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the containing folder.
    pub fn folder_id(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    /// Set the star flag.
    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = Some(starred);
        self
    }

    /// Set the shared flag.
    pub fn is_shared(mut self, is_shared: bool) -> Self {
        self.is_shared = Some(is_shared);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.last_accessed_at.is_none() && self.is_shared.is_none() && !self.modifies()
    }

    /// Whether the update changes the file itself. Access time and the
    /// shared flag are bookkeeping.
    pub fn modifies(&self) -> bool {
        self.name.is_some()
            || self.mime_type.is_some()
            || self.size.is_some()
            || self.folder_id.is_some()
            || self.path.is_some()
            || self.starred.is_some()
            || self.in_trash.is_some()
            || self.deleted_at.is_some()
    }

    /// Merge the set fields into `file`.
    ///
    /// `modified_at` is stamped only when [`FileUpdate::modifies`] holds.
    pub fn apply(&self, file: &mut FileMetadata, now: DateTime<Utc>) {
        if let Some(ref name) = self.name {
            file.name = name.clone();
        }
        if let Some(ref mime_type) = self.mime_type {
            file.mime_type = mime_type.clone();
        }
        if let Some(size) = self.size {
            file.size = size;
        }
        if let Some(folder_id) = self.folder_id {
            file.folder_id = folder_id;
        }
        if let Some(ref path) = self.path {
            file.path = path.clone();
        }
        if let Some(starred) = self.starred {
            file.starred = starred;
        }
        if let Some(is_shared) = self.is_shared {
            file.is_shared = is_shared;
        }
        if let Some(in_trash) = self.in_trash {
            file.in_trash = in_trash;
        }
        if let Some(deleted_at) = self.deleted_at {
            file.deleted_at = deleted_at;
        }
        if let Some(last_accessed_at) = self.last_accessed_at {
            file.last_accessed_at = last_accessed_at;
        }
        if self.modifies() {
            file.modified_at = now;
        }
    }
}

/// File metadata plus the URL clients download it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithPath {
    #[serde(flatten)]
    pub file: FileMetadata,
    pub download_url: String,
}

impl From<FileMetadata> for FileWithPath {
    fn from(file: FileMetadata) -> Self {
        let download_url = format!("/api/files/{}/download", file.id);
        Self { file, download_url }
    }
}
