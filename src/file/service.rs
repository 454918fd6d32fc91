//! Drive service for filevault.
//!
//! This module provides the per-user operations behind the HTTP API:
//! - Folder create / rename / move / trash / restore / delete
//! - Upload registration with quota checks
//! - Derived views and trash purging
//! - Share creation and resolution
//! - Storage summary and reconciliation
//!
//! Every method takes the acting user's id. A record owned by someone else
//! yields `Forbidden`; a missing one yields `NotFound`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{Storage, User, UserUpdate};
use crate::{Result, VaultError};

use super::folder::{Folder, FolderUpdate, FolderWithStats, NewFolder};
use super::metadata::{FileMetadata, FileUpdate, FileWithPath, NewFile};
use super::share::{AccessType, NewShare, Share, ShareTarget, ShareWithDetails};
use super::storage::FileStorage;
use super::{views, DEFAULT_MIME_TYPE, MAX_NAME_LENGTH};

/// Validate a file or folder name and return it trimmed.
pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(VaultError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(VaultError::Validation(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if name == "." || name == ".." {
        return Err(VaultError::Validation(format!("{name} is not a valid name")));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(VaultError::Validation(
            "name must not contain slashes or control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn detect_mime_type(name: &str, declared: Option<&str>) -> String {
    declared
        .map(str::trim)
        .filter(|m| !m.is_empty() && *m != DEFAULT_MIME_TYPE)
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(name).first_raw().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

/// An upload whose content is held in memory.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub folder_id: Option<i64>,
    /// MIME type declared by the client.
    pub mime_type: Option<String>,
    pub content: Vec<u8>,
}

impl UploadRequest {
    /// Create an upload to the drive root.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            folder_id: None,
            mime_type: None,
            content,
        }
    }

    /// Upload into a folder.
    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }

    /// Set the declared MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// An upload already streamed into blob storage.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub name: String,
    pub folder_id: Option<i64>,
    pub mime_type: Option<String>,
    pub size: u64,
    /// Blob name inside [`FileStorage`].
    pub stored_name: String,
}

/// Rename, move or star a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderChanges {
    pub name: Option<String>,
    /// `Some(None)` moves to the root.
    pub parent_id: Option<Option<i64>>,
    pub starred: Option<bool>,
}

/// Rename, move or star a file.
#[derive(Debug, Clone, Default)]
pub struct FileChanges {
    pub name: Option<String>,
    /// `Some(None)` moves to the root.
    pub folder_id: Option<Option<i64>>,
    pub starred: Option<bool>,
}

/// Options for a new share link.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub target: ShareTarget,
    pub access_type: AccessType,
    pub allow_download: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl ShareRequest {
    /// Public, downloadable, never expiring.
    pub fn new(target: ShareTarget) -> Self {
        Self {
            target,
            access_type: AccessType::Public,
            allow_download: true,
            expiry_date: None,
        }
    }
}

/// Files and folders of one derived view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveView {
    pub files: Vec<FileWithPath>,
    pub folders: Vec<FolderWithStats>,
}

/// A user's quota usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSummary {
    pub used: i64,
    pub limit: i64,
    pub available: i64,
    pub percent_used: f64,
}

impl From<&User> for StorageSummary {
    fn from(user: &User) -> Self {
        let percent_used = if user.storage_limit > 0 {
            let raw = user.storage_used as f64 / user.storage_limit as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            used: user.storage_used,
            limit: user.storage_limit,
            available: user.storage_available() as i64,
            percent_used,
        }
    }
}

/// What an empty-trash run removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrashPurge {
    pub files: usize,
    pub folders: usize,
}

/// Per-user drive operations over an entity store and blob storage.
pub struct DriveService<'a> {
    store: &'a dyn Storage,
    blobs: &'a FileStorage,
}

impl<'a> DriveService<'a> {
    /// Create a new DriveService.
    pub fn new(store: &'a dyn Storage, blobs: &'a FileStorage) -> Self {
        Self { store, blobs }
    }

    async fn require_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()))
    }

    async fn owned_folder(&self, user_id: i64, folder_id: i64) -> Result<Folder> {
        let folder = self
            .store
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))?;
        if folder.user_id != user_id {
            return Err(VaultError::Forbidden(
                "folder belongs to another user".to_string(),
            ));
        }
        Ok(folder)
    }

    async fn owned_file(&self, user_id: i64, file_id: i64) -> Result<FileMetadata> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))?;
        if file.user_id != user_id {
            return Err(VaultError::Forbidden(
                "file belongs to another user".to_string(),
            ));
        }
        Ok(file)
    }

    /// Check that `folder_id` (if any) is an owned, non-trashed folder.
    async fn ensure_destination(&self, user_id: i64, folder_id: Option<i64>) -> Result<()> {
        if let Some(folder_id) = folder_id {
            let folder = self.owned_folder(user_id, folder_id).await?;
            if folder.in_trash {
                return Err(VaultError::Validation(
                    "destination folder is in the trash".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Reject a name already used by a non-trashed sibling folder.
    async fn ensure_unique_name(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<()> {
        let siblings = self.store.list_child_folders(user_id, parent_id).await?;
        let taken = siblings
            .iter()
            .any(|f| !f.in_trash && Some(f.id) != exclude && same_name(&f.name, name));
        if taken {
            return Err(VaultError::Conflict(format!(
                "a folder named \"{name}\" already exists here"
            )));
        }
        Ok(())
    }

    /// Reject moving `folder_id` under itself or one of its descendants.
    async fn ensure_not_descendant(&self, folder_id: i64, new_parent: i64) -> Result<()> {
        let mut visited = HashSet::new();
        let mut current = Some(new_parent);
        while let Some(id) = current {
            if id == folder_id {
                return Err(VaultError::Validation(
                    "cannot move a folder into itself or one of its subfolders".to_string(),
                ));
            }
            if !visited.insert(id) {
                break;
            }
            current = self.store.get_folder(id).await?.and_then(|f| f.parent_id);
        }
        Ok(())
    }

    async fn remove_blob(&self, stored_name: &str) {
        if let Err(e) = self.blobs.delete(stored_name).await {
            warn!("Failed to remove blob {}: {}", stored_name, e);
        }
    }

    // Folders

    /// Create a folder under `parent_id` (None for the root).
    pub async fn create_folder(
        &self,
        user_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder> {
        let name = validate_name(name)?;
        self.ensure_destination(user_id, parent_id).await?;
        self.ensure_unique_name(user_id, parent_id, &name, None)
            .await?;

        let mut new_folder = NewFolder::new(name, user_id);
        new_folder.parent_id = parent_id;
        self.store.create_folder(&new_folder).await
    }

    /// Get a folder with the totals of its direct files.
    pub async fn get_folder(&self, user_id: i64, folder_id: i64) -> Result<FolderWithStats> {
        let folder = self.owned_folder(user_id, folder_id).await?;
        let files = self
            .store
            .list_files_in_folder(user_id, Some(folder_id))
            .await?;
        Ok(views::with_stats(folder, &files))
    }

    /// List non-trashed child folders of `parent_id`.
    pub async fn list_folders(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<FolderWithStats>> {
        if let Some(parent_id) = parent_id {
            self.owned_folder(user_id, parent_id).await?;
        }
        let children: Vec<Folder> = self
            .store
            .list_child_folders(user_id, parent_id)
            .await?
            .into_iter()
            .filter(|f| !f.in_trash)
            .collect();
        let files = self.store.list_files_by_user(user_id).await?;
        Ok(views::folder_stats(children, &files))
    }

    /// Breadcrumb from the root down to `folder_id`, inclusive.
    pub async fn folder_path(&self, user_id: i64, folder_id: i64) -> Result<Vec<Folder>> {
        let folder = self.owned_folder(user_id, folder_id).await?;
        let mut visited = HashSet::from([folder.id]);
        let mut next = folder.parent_id;
        let mut path = vec![folder];

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.store.get_folder(parent_id).await? else {
                break;
            };
            next = parent.parent_id;
            path.push(parent);
        }

        path.reverse();
        Ok(path)
    }

    /// Rename, move or star a folder.
    pub async fn update_folder(
        &self,
        user_id: i64,
        folder_id: i64,
        changes: &FolderChanges,
    ) -> Result<Folder> {
        let folder = self.owned_folder(user_id, folder_id).await?;
        let mut update = FolderUpdate::new();

        let name = match changes.name {
            Some(ref name) => {
                let name = validate_name(name)?;
                update = update.name(name.clone());
                name
            }
            None => folder.name.clone(),
        };

        let parent_id = match changes.parent_id {
            Some(parent_id) => {
                if let Some(new_parent) = parent_id {
                    self.ensure_destination(user_id, Some(new_parent)).await?;
                    self.ensure_not_descendant(folder_id, new_parent).await?;
                }
                update = update.parent_id(parent_id);
                parent_id
            }
            None => folder.parent_id,
        };

        if changes.name.is_some() || changes.parent_id.is_some() {
            self.ensure_unique_name(user_id, parent_id, &name, Some(folder_id))
                .await?;
        }
        if let Some(starred) = changes.starred {
            update = update.starred(starred);
        }

        self.store
            .update_folder(folder_id, &update)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))
    }

    /// Move a folder to the trash.
    pub async fn trash_folder(&self, user_id: i64, folder_id: i64) -> Result<Folder> {
        self.owned_folder(user_id, folder_id).await?;
        self.store
            .update_folder(folder_id, &FolderUpdate::trash(Utc::now()))
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))
    }

    /// Take a folder out of the trash.
    ///
    /// Fails with `Conflict` if a sibling with the same name was created in
    /// the meantime.
    pub async fn restore_folder(&self, user_id: i64, folder_id: i64) -> Result<Folder> {
        let folder = self.owned_folder(user_id, folder_id).await?;
        self.ensure_unique_name(user_id, folder.parent_id, &folder.name, Some(folder_id))
            .await?;
        self.store
            .update_folder(folder_id, &FolderUpdate::restore())
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))
    }

    /// Permanently delete a folder, everything beneath it, and their blobs.
    pub async fn delete_folder(&self, user_id: i64, folder_id: i64) -> Result<()> {
        let folder = self.owned_folder(user_id, folder_id).await?;
        self.remove_folder_tree(&folder).await?;
        Ok(())
    }

    /// Returns the number of files removed.
    async fn remove_folder_tree(&self, folder: &Folder) -> Result<usize> {
        let folders = self.store.list_folders_by_user(folder.user_id).await?;
        let doomed: HashSet<i64> = views::descendant_folder_ids(&folders, folder.id)
            .into_iter()
            .collect();
        let blobs: Vec<String> = self
            .store
            .list_files_by_user(folder.user_id)
            .await?
            .into_iter()
            .filter(|f| f.folder_id.is_some_and(|id| doomed.contains(&id)))
            .map(|f| f.path)
            .collect();

        if !self.store.delete_folder(folder.id).await? {
            return Err(VaultError::NotFound("folder".to_string()));
        }
        for stored_name in &blobs {
            self.remove_blob(stored_name).await;
        }
        Ok(blobs.len())
    }

    // Files

    /// Bytes the user may still upload.
    pub async fn available_bytes(&self, user_id: i64) -> Result<u64> {
        Ok(self.require_user(user_id).await?.storage_available())
    }

    async fn ensure_quota(&self, user_id: i64, size: u64) -> Result<()> {
        let available = self.available_bytes(user_id).await?;
        if size > available {
            return Err(VaultError::StorageExceeded {
                requested: size,
                available,
            });
        }
        Ok(())
    }

    /// Save in-memory content and register it as a new file.
    pub async fn upload(&self, user_id: i64, request: UploadRequest) -> Result<FileWithPath> {
        let name = validate_name(&request.name)?;
        self.ensure_destination(user_id, request.folder_id).await?;
        self.ensure_quota(user_id, request.content.len() as u64)
            .await?;

        let stored_name = self.blobs.save(&request.content, &name).await?;
        self.register_upload(
            user_id,
            StoredUpload {
                name,
                folder_id: request.folder_id,
                mime_type: request.mime_type,
                size: request.content.len() as u64,
                stored_name,
            },
        )
        .await
    }

    /// Register a blob that is already in storage as a new file.
    ///
    /// The blob is removed if registration fails.
    pub async fn register_upload(&self, user_id: i64, upload: StoredUpload) -> Result<FileWithPath> {
        match self.try_register(user_id, &upload).await {
            Ok(file) => {
                info!(
                    "User {} uploaded {} ({} bytes) as file {}",
                    user_id, file.name, file.size, file.id
                );
                Ok(FileWithPath::from(file))
            }
            Err(e) => {
                self.remove_blob(&upload.stored_name).await;
                Err(e)
            }
        }
    }

    async fn try_register(&self, user_id: i64, upload: &StoredUpload) -> Result<FileMetadata> {
        let name = validate_name(&upload.name)?;
        self.ensure_destination(user_id, upload.folder_id).await?;
        self.ensure_quota(user_id, upload.size).await?;

        let size = i64::try_from(upload.size)
            .map_err(|_| VaultError::Validation("file is too large".to_string()))?;
        let mime_type = detect_mime_type(&name, upload.mime_type.as_deref());
        let new_file = NewFile::new(name, mime_type, size, user_id, upload.stored_name.clone())
            .in_folder(upload.folder_id);
        self.store.create_file(&new_file).await
    }

    async fn touch(&self, file: FileMetadata) -> Result<FileMetadata> {
        let id = file.id;
        Ok(self
            .store
            .update_file(id, &FileUpdate::touch(Utc::now()))
            .await?
            .unwrap_or(file))
    }

    /// Get a file, recording the access.
    pub async fn get_file(&self, user_id: i64, file_id: i64) -> Result<FileWithPath> {
        let file = self.owned_file(user_id, file_id).await?;
        Ok(FileWithPath::from(self.touch(file).await?))
    }

    /// Get a file for download, recording the access.
    pub async fn open_download(&self, user_id: i64, file_id: i64) -> Result<FileMetadata> {
        let file = self.owned_file(user_id, file_id).await?;
        self.touch(file).await
    }

    /// Read a file's content from blob storage.
    pub async fn read_content(&self, file: &FileMetadata) -> Result<Vec<u8>> {
        self.blobs.load(&file.path).await
    }

    /// List non-trashed files directly in `folder_id` (None for the root).
    pub async fn list_files(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<Vec<FileWithPath>> {
        if let Some(folder_id) = folder_id {
            self.owned_folder(user_id, folder_id).await?;
        }
        Ok(self
            .store
            .list_files_in_folder(user_id, folder_id)
            .await?
            .into_iter()
            .filter(|f| !f.in_trash)
            .map(FileWithPath::from)
            .collect())
    }

    /// Rename, move or star a file.
    pub async fn update_file(
        &self,
        user_id: i64,
        file_id: i64,
        changes: &FileChanges,
    ) -> Result<FileWithPath> {
        self.owned_file(user_id, file_id).await?;
        let mut update = FileUpdate::new();

        if let Some(ref name) = changes.name {
            update = update.name(validate_name(name)?);
        }
        if let Some(folder_id) = changes.folder_id {
            self.ensure_destination(user_id, folder_id).await?;
            update = update.folder_id(folder_id);
        }
        if let Some(starred) = changes.starred {
            update = update.starred(starred);
        }

        self.store
            .update_file(file_id, &update)
            .await?
            .map(FileWithPath::from)
            .ok_or_else(|| VaultError::NotFound("file".to_string()))
    }

    /// Move a file to the trash.
    pub async fn trash_file(&self, user_id: i64, file_id: i64) -> Result<FileWithPath> {
        self.owned_file(user_id, file_id).await?;
        self.store
            .update_file(file_id, &FileUpdate::trash(Utc::now()))
            .await?
            .map(FileWithPath::from)
            .ok_or_else(|| VaultError::NotFound("file".to_string()))
    }

    /// Take a file out of the trash.
    pub async fn restore_file(&self, user_id: i64, file_id: i64) -> Result<FileWithPath> {
        self.owned_file(user_id, file_id).await?;
        self.store
            .update_file(file_id, &FileUpdate::restore())
            .await?
            .map(FileWithPath::from)
            .ok_or_else(|| VaultError::NotFound("file".to_string()))
    }

    /// Permanently delete a file and its blob.
    pub async fn delete_file(&self, user_id: i64, file_id: i64) -> Result<()> {
        let file = self.owned_file(user_id, file_id).await?;
        if !self.store.delete_file(file_id).await? {
            return Err(VaultError::NotFound("file".to_string()));
        }
        self.remove_blob(&file.path).await;
        debug!("User {} deleted file {}", user_id, file_id);
        Ok(())
    }

    // Views

    async fn view(
        &self,
        user_id: i64,
        files: Vec<FileMetadata>,
        folders: Vec<Folder>,
        all_files: &[FileMetadata],
    ) -> Result<DriveView> {
        debug!(
            "View for user {}: {} files, {} folders",
            user_id,
            files.len(),
            folders.len()
        );
        Ok(DriveView {
            files: files.into_iter().map(FileWithPath::from).collect(),
            folders: views::folder_stats(folders, all_files),
        })
    }

    /// The user's files and folders minus anything inside a trashed folder.
    async fn live_items(&self, user_id: i64) -> Result<(Vec<FileMetadata>, Vec<Folder>)> {
        let files = self.store.list_files_by_user(user_id).await?;
        let folders = self.store.list_folders_by_user(user_id).await?;
        Ok(views::outside_trash(files, folders))
    }

    /// Recently accessed files and recently modified folders.
    pub async fn recent(&self, user_id: i64) -> Result<DriveView> {
        let now = Utc::now();
        let (files, folders) = self.live_items(user_id).await?;
        self.view(
            user_id,
            views::recent_files(&files, now),
            views::recent_folders(&folders, now),
            &files,
        )
        .await
    }

    pub async fn starred(&self, user_id: i64) -> Result<DriveView> {
        let (files, folders) = self.live_items(user_id).await?;
        self.view(
            user_id,
            views::starred_files(&files),
            views::starred_folders(&folders),
            &files,
        )
        .await
    }

    pub async fn shared(&self, user_id: i64) -> Result<DriveView> {
        let (files, folders) = self.live_items(user_id).await?;
        let shares = self.store.list_shares_by_user(user_id).await?;
        self.view(
            user_id,
            views::shared_files(&files, &shares),
            views::shared_folders(&folders, &shares),
            &files,
        )
        .await
    }

    pub async fn trash(&self, user_id: i64) -> Result<DriveView> {
        let files = self.store.list_files_by_user(user_id).await?;
        let folders = self.store.list_folders_by_user(user_id).await?;
        self.view(
            user_id,
            views::trashed_files(&files),
            views::trashed_folders(&folders),
            &files,
        )
        .await
    }

    /// Permanently delete everything in the user's trash.
    pub async fn empty_trash(&self, user_id: i64) -> Result<TrashPurge> {
        let mut purge = TrashPurge::default();

        let folders = self.store.list_folders_by_user(user_id).await?;
        for folder in views::trashed_folders(&folders) {
            // A trashed ancestor may already have taken this one with it.
            if self.store.get_folder(folder.id).await?.is_none() {
                continue;
            }
            purge.files += self.remove_folder_tree(&folder).await?;
            purge.folders += 1;
        }

        let files = self.store.list_files_by_user(user_id).await?;
        for file in views::trashed_files(&files) {
            if self.store.delete_file(file.id).await? {
                self.remove_blob(&file.path).await;
                purge.files += 1;
            }
        }

        info!(
            "User {} emptied trash: {} folders, {} files",
            user_id, purge.folders, purge.files
        );
        Ok(purge)
    }

    // Shares

    async fn set_shared_flag(&self, target: ShareTarget, is_shared: bool) -> Result<()> {
        match target {
            ShareTarget::File(id) => {
                self.store
                    .update_file(id, &FileUpdate::new().is_shared(is_shared))
                    .await?;
            }
            ShareTarget::Folder(id) => {
                self.store
                    .update_folder(id, &FolderUpdate::new().is_shared(is_shared))
                    .await?;
            }
        }
        Ok(())
    }

    /// Whether `folder_id` is a trashed folder or sits beneath one.
    async fn in_trashed_tree(&self, mut folder_id: Option<i64>) -> Result<bool> {
        let mut seen = HashSet::new();
        while let Some(id) = folder_id {
            if !seen.insert(id) {
                break;
            }
            match self.store.get_folder(id).await? {
                Some(folder) if folder.in_trash => return Ok(true),
                Some(folder) => folder_id = folder.parent_id,
                None => break,
            }
        }
        Ok(false)
    }

    /// Whether a share's target is in the trash, itself or through an
    /// ancestor folder.
    pub async fn share_target_trashed(&self, details: &ShareWithDetails) -> Result<bool> {
        let (in_trash, parent) = match (&details.file, &details.folder) {
            (Some(file), _) => (file.in_trash, file.folder_id),
            (None, Some(folder)) => (folder.in_trash, folder.parent_id),
            (None, None) => return Ok(false),
        };
        Ok(in_trash || self.in_trashed_tree(parent).await?)
    }

    /// Share an owned file or folder.
    pub async fn create_share(&self, user_id: i64, request: &ShareRequest) -> Result<Share> {
        let (in_trash, parent) = match request.target {
            ShareTarget::File(id) => {
                let file = self.owned_file(user_id, id).await?;
                (file.in_trash, file.folder_id)
            }
            ShareTarget::Folder(id) => {
                let folder = self.owned_folder(user_id, id).await?;
                (folder.in_trash, folder.parent_id)
            }
        };
        if in_trash || self.in_trashed_tree(parent).await? {
            return Err(VaultError::Validation(
                "items in the trash cannot be shared".to_string(),
            ));
        }
        if request.expiry_date.is_some_and(|expiry| expiry <= Utc::now()) {
            return Err(VaultError::Validation(
                "expiry date must be in the future".to_string(),
            ));
        }

        let new_share = NewShare::new(request.target, user_id)
            .with_access_type(request.access_type)
            .with_allow_download(request.allow_download)
            .with_expiry(request.expiry_date);
        let share = self.store.create_share(&new_share).await?;
        self.set_shared_flag(request.target, true).await?;

        info!("User {} shared {:?} as share {}", user_id, share.target, share.id);
        Ok(share)
    }

    /// Shares created by the user.
    pub async fn list_shares(&self, user_id: i64) -> Result<Vec<Share>> {
        self.store.list_shares_by_user(user_id).await
    }

    /// Revoke a share. The target loses its shared flag with its last share.
    pub async fn delete_share(&self, user_id: i64, share_id: i64) -> Result<()> {
        let share = self
            .store
            .get_share(share_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))?;
        if share.user_id != user_id {
            return Err(VaultError::Forbidden(
                "share belongs to another user".to_string(),
            ));
        }

        self.store.delete_share(share_id).await?;
        if self
            .store
            .list_shares_for_target(share.target)
            .await?
            .is_empty()
        {
            self.set_shared_flag(share.target, false).await?;
        }
        Ok(())
    }

    /// Resolve a share token. Expiry is left to the caller.
    pub async fn resolve_share(&self, token: &str) -> Result<ShareWithDetails> {
        self.store
            .get_share_by_token(token)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))
    }

    // Storage

    pub async fn storage_summary(&self, user_id: i64) -> Result<StorageSummary> {
        let user = self.require_user(user_id).await?;
        Ok(StorageSummary::from(&user))
    }

    /// Recompute `storage_used` from the user's files.
    pub async fn reconcile_storage(&self, user_id: i64) -> Result<StorageSummary> {
        let user = self.require_user(user_id).await?;
        let actual: i64 = self
            .store
            .list_files_by_user(user_id)
            .await?
            .iter()
            .map(|f| f.size)
            .sum();

        if actual != user.storage_used {
            info!(
                "Reconciled storage for user {}: {} -> {} bytes",
                user_id, user.storage_used, actual
            );
        }
        let user = self
            .store
            .update_user(user_id, &UserUpdate::new().storage_used(actual))
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()))?;
        Ok(StorageSummary::from(&user))
    }
}
