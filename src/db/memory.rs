//! In-process entity store.
//!
//! All four tables sit behind one `RwLock`: reads run concurrently, writes
//! are serialized, and a cascade or accounting pair is applied under a
//! single write guard. Concurrent updates to the same record are
//! last-write-wins.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{NewUser, Storage, User, UserUpdate};
use crate::file::{
    descendant_folder_ids, generate_token, FileMetadata, FileUpdate, Folder, FolderUpdate,
    NewFile, NewFolder, NewShare, Share, ShareTarget,
};
use crate::{Result, VaultError};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    folders: BTreeMap<i64, Folder>,
    files: BTreeMap<i64, FileMetadata>,
    shares: BTreeMap<i64, Share>,
    last_user_id: i64,
    last_folder_id: i64,
    last_file_id: i64,
    last_share_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn adjust_storage(&mut self, user_id: i64, delta: i64) -> Option<&User> {
        let user = self.users.get_mut(&user_id)?;
        let next = user.storage_used + delta;
        if next < 0 {
            warn!(
                "storage_used for user {} would drop to {}, clamping to 0",
                user_id, next
            );
        }
        user.storage_used = next.max(0);
        Some(user)
    }

    fn remove_shares_for(&mut self, target: ShareTarget) {
        self.shares.retain(|_, share| share.target != target);
    }

    fn remove_file(&mut self, id: i64) -> Option<FileMetadata> {
        let file = self.files.remove(&id)?;
        self.remove_shares_for(ShareTarget::File(id));
        self.adjust_storage(file.user_id, -file.size);
        Some(file)
    }
}

/// Entity store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        let wanted = user.username.to_lowercase();
        if tables
            .users
            .values()
            .any(|u| u.username.to_lowercase() == wanted)
        {
            return Err(VaultError::Conflict(format!(
                "username {} is already taken",
                user.username
            )));
        }

        let id = next_id(&mut tables.last_user_id);
        let created = User {
            id,
            username: user.username.clone(),
            password: user.password.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            storage_limit: user.storage_limit,
            storage_used: 0,
            created_at: Utc::now(),
        };
        tables.users.insert(id, created.clone());
        debug!("Created user {} ({})", id, created.username);
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(user);
        Ok(Some(user.clone()))
    }

    async fn adjust_storage_used(&self, user_id: i64, delta: i64) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.adjust_storage(user_id, delta).cloned())
    }

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.last_folder_id);
        let now = Utc::now();
        let created = Folder {
            id,
            name: folder.name.clone(),
            user_id: folder.user_id,
            parent_id: folder.parent_id,
            in_trash: false,
            deleted_at: None,
            starred: false,
            is_shared: false,
            created_at: now,
            modified_at: now,
        };
        tables.folders.insert(id, created.clone());
        debug!("Created folder {} for user {}", id, folder.user_id);
        Ok(created)
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        Ok(self.tables.read().await.folders.get(&id).cloned())
    }

    async fn list_folders_by_user(&self, user_id: i64) -> Result<Vec<Folder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .folders
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_child_folders(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<Folder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .folders
            .values()
            .filter(|f| f.user_id == user_id && f.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        let mut tables = self.tables.write().await;
        let Some(folder) = tables.folders.get_mut(&id) else {
            return Ok(None);
        };
        if !update.is_empty() {
            update.apply(folder, Utc::now());
        }
        Ok(Some(folder.clone()))
    }

    async fn delete_folder(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(owner) = tables.folders.get(&id).map(|f| f.user_id) else {
            return Ok(false);
        };

        let owned: Vec<Folder> = tables
            .folders
            .values()
            .filter(|f| f.user_id == owner)
            .cloned()
            .collect();
        let doomed = descendant_folder_ids(&owned, id);
        let doomed_set: HashSet<i64> = doomed.iter().copied().collect();

        let file_ids: Vec<i64> = tables
            .files
            .values()
            .filter(|f| f.folder_id.is_some_and(|fid| doomed_set.contains(&fid)))
            .map(|f| f.id)
            .collect();
        for file_id in &file_ids {
            tables.remove_file(*file_id);
        }
        for folder_id in doomed.iter().rev() {
            tables.folders.remove(folder_id);
            tables.remove_shares_for(ShareTarget::Folder(*folder_id));
        }

        info!(
            "Deleted folder {} with {} subfolders and {} files",
            id,
            doomed.len() - 1,
            file_ids.len()
        );
        Ok(true)
    }

    async fn create_file(&self, file: &NewFile) -> Result<FileMetadata> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.last_file_id);
        let now = Utc::now();
        let created = FileMetadata {
            id,
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            user_id: file.user_id,
            folder_id: file.folder_id,
            path: file.path.clone(),
            starred: false,
            is_shared: false,
            in_trash: false,
            deleted_at: None,
            last_accessed_at: now,
            created_at: now,
            modified_at: now,
        };
        tables.files.insert(id, created.clone());
        tables.adjust_storage(file.user_id, file.size);
        debug!(
            "Created file {} ({} bytes) for user {}",
            id, file.size, file.user_id
        );
        Ok(created)
    }

    async fn get_file(&self, id: i64) -> Result<Option<FileMetadata>> {
        Ok(self.tables.read().await.files.get(&id).cloned())
    }

    async fn list_files_by_user(&self, user_id: i64) -> Result<Vec<FileMetadata>> {
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_files_in_folder(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<Vec<FileMetadata>> {
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .values()
            .filter(|f| f.user_id == user_id && f.folder_id == folder_id)
            .cloned()
            .collect())
    }

    async fn update_file(&self, id: i64, update: &FileUpdate) -> Result<Option<FileMetadata>> {
        let mut tables = self.tables.write().await;
        let Some(file) = tables.files.get_mut(&id) else {
            return Ok(None);
        };
        let old_size = file.size;
        update.apply(file, Utc::now());
        let updated = file.clone();

        let delta = updated.size - old_size;
        if delta != 0 {
            tables.adjust_storage(updated.user_id, delta);
        }
        Ok(Some(updated))
    }

    async fn delete_file(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.remove_file(id);
        if let Some(ref file) = removed {
            debug!("Deleted file {} of user {}", id, file.user_id);
        }
        Ok(removed.is_some())
    }

    async fn create_share(&self, share: &NewShare) -> Result<Share> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.last_share_id);
        let created = Share {
            id,
            target: share.target,
            user_id: share.user_id,
            access_type: share.access_type,
            allow_download: share.allow_download,
            expiry_date: share.expiry_date,
            token: generate_token(),
            created_at: Utc::now(),
        };
        tables.shares.insert(id, created.clone());
        debug!("Created share {} for {:?}", id, share.target);
        Ok(created)
    }

    async fn get_share(&self, id: i64) -> Result<Option<Share>> {
        Ok(self.tables.read().await.shares.get(&id).cloned())
    }

    async fn find_share_by_token(&self, token: &str) -> Result<Option<Share>> {
        Ok(self
            .tables
            .read()
            .await
            .shares
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn list_shares_by_user(&self, user_id: i64) -> Result<Vec<Share>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_shares_for_target(&self, target: ShareTarget) -> Result<Vec<Share>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .values()
            .filter(|s| s.target == target)
            .cloned()
            .collect())
    }

    async fn delete_share(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.shares.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup() -> (MemoryStorage, User) {
        let store = MemoryStorage::new();
        let user = store
            .create_user(&NewUser::new("alice", "hash", "Alice", 10_000))
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_are_not_reused() {
        let (store, user) = setup().await;
        assert_eq!(user.id, 1);

        let a = store
            .create_folder(&NewFolder::new("a", user.id))
            .await
            .unwrap();
        assert_eq!(a.id, 1);
        assert!(store.delete_folder(a.id).await.unwrap());

        let b = store
            .create_folder(&NewFolder::new("b", user.id))
            .await
            .unwrap();
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_username_conflict_is_case_insensitive() {
        let (store, _) = setup().await;
        let result = store
            .create_user(&NewUser::new("ALICE", "hash", "Other", 10))
            .await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));

        let found = store.get_user_by_username("AlIcE").await.unwrap();
        assert_eq!(found.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_file_accounting() {
        let (store, user) = setup().await;

        let file = store
            .create_file(&NewFile::new("a.pdf", "application/pdf", 1000, user.id, "a.pdf"))
            .await
            .unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().storage_used, 1000);

        store
            .update_file(file.id, &FileUpdate::new().size(1500))
            .await
            .unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().storage_used, 1500);

        assert!(store.delete_file(file.id).await.unwrap());
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().storage_used, 0);
        assert!(!store.delete_file(file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_adjust_storage_clamps_at_zero() {
        let (store, user) = setup().await;
        let updated = store.adjust_storage_used(user.id, -50).await.unwrap().unwrap();
        assert_eq!(updated.storage_used, 0);
        assert!(store.adjust_storage_used(99, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_keeps_modified_at() {
        let (store, user) = setup().await;
        let file = store
            .create_file(&NewFile::new("a.txt", "text/plain", 1, user.id, "a.txt"))
            .await
            .unwrap();

        let later = Utc::now() + Duration::minutes(5);
        let touched = store
            .update_file(file.id, &FileUpdate::touch(later))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(touched.last_accessed_at, later);
        assert_eq!(touched.modified_at, file.modified_at);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let (store, _) = setup().await;
        assert!(store
            .update_folder(42, &FolderUpdate::new().name("x"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .update_file(42, &FileUpdate::new().name("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_folder_cascades() {
        let (store, user) = setup().await;
        let root = store
            .create_folder(&NewFolder::new("root", user.id))
            .await
            .unwrap();
        let child = store
            .create_folder(&NewFolder::new("child", user.id).with_parent(root.id))
            .await
            .unwrap();
        let grandchild = store
            .create_folder(&NewFolder::new("grandchild", user.id).with_parent(child.id))
            .await
            .unwrap();
        let keep = store
            .create_folder(&NewFolder::new("keep", user.id))
            .await
            .unwrap();

        let deep = store
            .create_file(
                &NewFile::new("deep.txt", "text/plain", 300, user.id, "d.txt")
                    .in_folder(Some(grandchild.id)),
            )
            .await
            .unwrap();
        let top = store
            .create_file(
                &NewFile::new("top.txt", "text/plain", 200, user.id, "t.txt")
                    .in_folder(Some(root.id)),
            )
            .await
            .unwrap();
        let kept = store
            .create_file(
                &NewFile::new("kept.txt", "text/plain", 50, user.id, "k.txt")
                    .in_folder(Some(keep.id)),
            )
            .await
            .unwrap();
        store
            .create_share(&NewShare::new(ShareTarget::File(deep.id), user.id))
            .await
            .unwrap();
        store
            .create_share(&NewShare::new(ShareTarget::Folder(child.id), user.id))
            .await
            .unwrap();

        assert!(store.delete_folder(root.id).await.unwrap());

        for id in [root.id, child.id, grandchild.id] {
            assert!(store.get_folder(id).await.unwrap().is_none());
        }
        assert!(store.get_file(deep.id).await.unwrap().is_none());
        assert!(store.get_file(top.id).await.unwrap().is_none());
        assert!(store.get_file(kept.id).await.unwrap().is_some());
        assert!(store.get_folder(keep.id).await.unwrap().is_some());
        assert!(store.list_shares_by_user(user.id).await.unwrap().is_empty());
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().storage_used, 50);

        assert!(!store.delete_folder(root.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_folder_terminates_on_cycle() {
        let (store, user) = setup().await;
        let a = store
            .create_folder(&NewFolder::new("a", user.id))
            .await
            .unwrap();
        let b = store
            .create_folder(&NewFolder::new("b", user.id).with_parent(a.id))
            .await
            .unwrap();
        store
            .update_folder(a.id, &FolderUpdate::new().parent_id(Some(b.id)))
            .await
            .unwrap();

        assert!(store.delete_folder(a.id).await.unwrap());
        assert!(store.list_folders_by_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_share_by_token_resolves_details() {
        let (store, user) = setup().await;
        let file = store
            .create_file(&NewFile::new("a.pdf", "application/pdf", 10, user.id, "a.pdf"))
            .await
            .unwrap();
        let share = store
            .create_share(
                &NewShare::new(ShareTarget::File(file.id), user.id)
                    .with_expiry(Some(Utc::now() - Duration::days(1))),
            )
            .await
            .unwrap();

        let details = store
            .get_share_by_token(&share.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.share.id, share.id);
        assert_eq!(details.file.unwrap().id, file.id);
        assert!(details.folder.is_none());
        assert_eq!(details.shared_by.unwrap().display_name, "Alice");
        assert!(details.share.is_expired(Utc::now()));

        assert!(store.get_share_by_token("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_shares_for_target() {
        let (store, user) = setup().await;
        store
            .create_share(&NewShare::new(ShareTarget::Folder(3), user.id))
            .await
            .unwrap();
        let other = store
            .create_share(&NewShare::new(ShareTarget::File(3), user.id))
            .await
            .unwrap();

        let for_file = store
            .list_shares_for_target(ShareTarget::File(3))
            .await
            .unwrap();
        assert_eq!(for_file.len(), 1);
        assert_eq!(for_file[0].id, other.id);

        assert!(store.delete_share(other.id).await.unwrap());
        assert!(!store.delete_share(other.id).await.unwrap());
    }
}
