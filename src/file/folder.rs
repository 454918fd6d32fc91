//! Folder types for filevault.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A folder in a user's drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Owning user.
    pub user_id: i64,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    /// Whether the folder sits in the trash.
    pub in_trash: bool,
    /// When the folder was moved to the trash.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Whether the owner starred the folder.
    pub starred: bool,
    /// Whether at least one share points at the folder.
    pub is_shared: bool,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// When the folder was last changed.
    pub modified_at: DateTime<Utc>,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Owning user.
    pub user_id: i64,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a root folder owned by `user_id`.
    pub fn new(name: impl Into<String>, user_id: i64) -> Self {
        Self {
            name: name.into(),
            user_id,
            parent_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New parent folder ID.
    pub parent_id: Option<Option<i64>>,
    /// New trash flag.
    pub in_trash: Option<bool>,
    /// New trash timestamp.
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    /// New star flag.
    pub starred: Option<bool>,
    /// New shared flag.
    pub is_shared: Option<bool>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
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

    /// Set the parent folder ID.
    pub fn parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = Some(parent_id);
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
        self.is_shared.is_none() && !self.modifies()
    }

    /// Whether the update changes the folder itself; the shared flag alone does not.
    pub fn modifies(&self) -> bool {
        self.name.is_some()
            || self.parent_id.is_some()
            || self.in_trash.is_some()
            || self.deleted_at.is_some()
            || self.starred.is_some()
    }

    /// Merge the set fields into `folder`. `modified_at` moves only when
    /// [`FolderUpdate::modifies`] holds.
    pub fn apply(&self, folder: &mut Folder, now: DateTime<Utc>) {
        if let Some(ref name) = self.name {
            folder.name = name.clone();
        }
        if let Some(parent_id) = self.parent_id {
            folder.parent_id = parent_id;
        }
        if let Some(in_trash) = self.in_trash {
            folder.in_trash = in_trash;
        }
        if let Some(deleted_at) = self.deleted_at {
            folder.deleted_at = deleted_at;
        }
        if let Some(starred) = self.starred {
            folder.starred = starred;
        }
        if let Some(is_shared) = self.is_shared {
            folder.is_shared = is_shared;
        }
        if self.modifies() {
            folder.modified_at = now;
        }
    }
}

/// A folder together with the totals of the files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderWithStats {
    #[serde(flatten)]
    pub folder: Folder,
    /// Number of non-trashed files directly in the folder.
    pub file_count: i64,
    /// Sum of their sizes in bytes.
    pub total_size: i64,
}
