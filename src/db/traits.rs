//! Entity store abstraction.
//!
//! Every backend keeps Users, Folders, Files and Shares keyed by ids drawn
//! from a per-type counter starting at 1. Ids are never reused.
//!
//! Backends own two cross-entity rules so that they are atomic with the
//! mutation that triggers them:
//! - storage accounting: creating, resizing or deleting a file moves the
//!   owner's `storage_used` by the size difference, clamped at 0;
//! - cascades: deleting a file removes its shares; deleting a folder removes
//!   every file and folder beneath it and all shares pointing at them.
//!
//! Ownership checks live in the drive service, not here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{NewUser, User, UserUpdate};
use crate::file::{
    FileMetadata, FileUpdate, Folder, FolderUpdate, NewFile, NewFolder, NewShare, Share,
    ShareTarget, ShareWithDetails, SharedBy,
};
use crate::Result;

/// Shared handle to the configured store.
pub type SharedStorage = Arc<dyn Storage>;

/// Entity store for filevault.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    // Users

    /// Create a user. Fails with `Conflict` if the username is taken
    /// (compared case-insensitively).
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Look up a user by username, case-insensitively.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<User>>;
    /// Add `delta` bytes to the user's usage, clamping the result at 0.
    async fn adjust_storage_used(&self, user_id: i64, delta: i64) -> Result<Option<User>>;

    // Folders

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder>;
    async fn get_folder(&self, id: i64) -> Result<Option<Folder>>;
    /// All folders of a user, trashed ones included.
    async fn list_folders_by_user(&self, user_id: i64) -> Result<Vec<Folder>>;
    /// Direct children of `parent_id` (None lists root folders).
    async fn list_child_folders(&self, user_id: i64, parent_id: Option<i64>)
        -> Result<Vec<Folder>>;
    /// Shallow merge; stamps `modified_at` unless the update is empty.
    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>>;
    /// Recursively delete the folder. Returns whether it existed.
    async fn delete_folder(&self, id: i64) -> Result<bool>;

    // Files

    /// Create a file and charge its size to the owner.
    async fn create_file(&self, file: &NewFile) -> Result<FileMetadata>;
    async fn get_file(&self, id: i64) -> Result<Option<FileMetadata>>;
    async fn list_files_by_user(&self, user_id: i64) -> Result<Vec<FileMetadata>>;
    /// Files directly in `folder_id` (None lists the drive root).
    async fn list_files_in_folder(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<Vec<FileMetadata>>;
    /// Shallow merge. A size change moves the owner's usage by the difference.
    async fn update_file(&self, id: i64, update: &FileUpdate) -> Result<Option<FileMetadata>>;
    /// Delete the file and its shares, releasing its size. Returns whether
    /// it existed.
    async fn delete_file(&self, id: i64) -> Result<bool>;

    // Shares

    /// Create a share with a freshly generated token.
    async fn create_share(&self, share: &NewShare) -> Result<Share>;
    async fn get_share(&self, id: i64) -> Result<Option<Share>>;
    async fn find_share_by_token(&self, token: &str) -> Result<Option<Share>>;
    async fn list_shares_by_user(&self, user_id: i64) -> Result<Vec<Share>>;
    async fn list_shares_for_target(&self, target: ShareTarget) -> Result<Vec<Share>>;
    async fn delete_share(&self, id: i64) -> Result<bool>;

    /// Resolve a token to the share, its target and the sharer's public info.
    ///
    /// Expired shares are returned as-is; callers check
    /// [`Share::is_expired`](crate::file::Share::is_expired).
    async fn get_share_by_token(&self, token: &str) -> Result<Option<ShareWithDetails>> {
        let Some(share) = self.find_share_by_token(token).await? else {
            return Ok(None);
        };

        let (file, folder) = match share.target {
            ShareTarget::File(id) => (self.get_file(id).await?, None),
            ShareTarget::Folder(id) => (None, self.get_folder(id).await?),
        };
        let shared_by = self
            .get_user(share.user_id)
            .await?
            .as_ref()
            .map(SharedBy::from);

        Ok(Some(ShareWithDetails {
            share,
            file,
            folder,
            shared_by,
        }))
    }
}
