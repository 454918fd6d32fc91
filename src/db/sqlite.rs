//! SQLite entity store built on sqlx.
//!
//! Cascading deletes and storage accounting run inside one transaction with
//! the mutation that triggers them.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::QueryBuilder;
use tracing::{debug, info, warn};

use super::schema::MIGRATIONS;
use super::{NewUser, Storage, User, UserUpdate};
use crate::file::{
    descendant_folder_ids, generate_token, AccessType, FileMetadata, FileUpdate, Folder,
    FolderUpdate, NewFile, NewFolder, NewShare, Share, ShareTarget,
};
use crate::{Result, VaultError};

const USER_COLUMNS: &str =
    "id, username, password, display_name, avatar_url, storage_limit, storage_used, created_at";

const FOLDER_COLUMNS: &str =
    "id, name, user_id, parent_id, in_trash, deleted_at, starred, is_shared, created_at, modified_at";

const FILE_COLUMNS: &str = "id, name, mime_type, size, user_id, folder_id, path, starred, \
     is_shared, in_trash, deleted_at, last_accessed_at, created_at, modified_at";

const SHARE_COLUMNS: &str = "id, file_id, folder_id, user_id, access_type, allow_download, \
     expiry_date, token, created_at";

/// Pool size for file-backed databases. WAL lets readers run beside a writer.
const FILE_POOL_SIZE: u32 = 8;

/// Raw share row; the target columns are folded into [`ShareTarget`].
#[derive(sqlx::FromRow)]
struct ShareRow {
    id: i64,
    file_id: Option<i64>,
    folder_id: Option<i64>,
    user_id: i64,
    access_type: String,
    allow_download: bool,
    expiry_date: Option<DateTime<Utc>>,
    token: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ShareRow> for Share {
    type Error = VaultError;

    fn try_from(row: ShareRow) -> Result<Self> {
        let target = ShareTarget::from_ids(row.file_id, row.folder_id)
            .map_err(|_| VaultError::Database(format!("share {} has no valid target", row.id)))?;
        let access_type = AccessType::from_str(&row.access_type).map_err(VaultError::Database)?;
        Ok(Share {
            id: row.id,
            target,
            user_id: row.user_id,
            access_type,
            allow_download: row.allow_download,
            expiry_date: row.expiry_date,
            token: row.token,
            created_at: row.created_at,
        })
    }
}

fn into_shares(rows: Vec<ShareRow>) -> Result<Vec<Share>> {
    rows.into_iter().map(Share::try_from).collect()
}

async fn fetch_user(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

async fn fetch_folder(conn: &mut SqliteConnection, id: i64) -> Result<Option<Folder>> {
    let folder =
        sqlx::query_as::<_, Folder>(&format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(folder)
}

async fn fetch_file(conn: &mut SqliteConnection, id: i64) -> Result<Option<FileMetadata>> {
    let file =
        sqlx::query_as::<_, FileMetadata>(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(file)
}

async fn fetch_share(conn: &mut SqliteConnection, id: i64) -> Result<Option<Share>> {
    let row =
        sqlx::query_as::<_, ShareRow>(&format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(Share::try_from).transpose()
}

/// Move a user's usage by `delta`, clamping at 0.
async fn adjust_storage(conn: &mut SqliteConnection, user_id: i64, delta: i64) -> Result<()> {
    let current: Option<i64> = sqlx::query_scalar("SELECT storage_used FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(current) = current else {
        return Ok(());
    };

    let next = current + delta;
    if next < 0 {
        warn!(
            "storage_used for user {} would drop to {}, clamping to 0",
            user_id, next
        );
    }
    sqlx::query("UPDATE users SET storage_used = ? WHERE id = ?")
        .bind(next.max(0))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete a file and its shares, releasing its size.
async fn remove_file(conn: &mut SqliteConnection, id: i64) -> Result<Option<FileMetadata>> {
    let Some(file) = fetch_file(conn, id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM shares WHERE file_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    adjust_storage(conn, file.user_id, -file.size).await?;
    Ok(Some(file))
}

/// Entity store persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().max_connections(FILE_POOL_SIZE);
        Self::connect(pool, options).await
    }

    /// Open a private in-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Each connection would get its own empty database; keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect(pool, options).await
    }

    async fn connect(pool: SqlitePoolOptions, options: SqliteConnectOptions) -> Result<Self> {
        let pool = pool.connect_with(options).await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the current schema version (0 for a fresh database).
    pub async fn schema_version(&self) -> Result<i64> {
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        )
        .fetch_one(&self.pool)
        .await?;
        if !table_exists {
            return Ok(0);
        }

        let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    /// Apply pending migrations, each in its own transaction.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;
        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            debug!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        info!("Database migration complete (now at version {})", MIGRATIONS.len());
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? COLLATE NOCASE)",
        )
        .bind(&user.username)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(VaultError::Conflict(format!(
                "username {} is already taken",
                user.username
            )));
        }

        let result = sqlx::query(
            "INSERT INTO users (username, password, display_name, avatar_url, storage_limit, storage_used, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.storage_limit)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        let created = fetch_user(&mut tx, id)
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()))?;
        tx.commit().await?;

        debug!("Created user {} ({})", id, created.username);
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        if update.is_empty() {
            return fetch_user(&mut conn, id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref password) = update.password {
            separated.push("password = ");
            separated.push_bind_unseparated(password.clone());
        }
        if let Some(ref display_name) = update.display_name {
            separated.push("display_name = ");
            separated.push_bind_unseparated(display_name.clone());
        }
        if let Some(ref avatar_url) = update.avatar_url {
            separated.push("avatar_url = ");
            separated.push_bind_unseparated(avatar_url.clone());
        }
        if let Some(storage_limit) = update.storage_limit {
            separated.push("storage_limit = ");
            separated.push_bind_unseparated(storage_limit);
        }
        if let Some(storage_used) = update.storage_used {
            separated.push("storage_used = ");
            separated.push_bind_unseparated(storage_used.max(0));
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_user(&mut conn, id).await
    }

    async fn adjust_storage_used(&self, user_id: i64, delta: i64) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;
        adjust_storage(&mut tx, user_id, delta).await?;
        let user = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO folders (name, user_id, parent_id, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&folder.name)
        .bind(folder.user_id)
        .bind(folder.parent_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created folder {} for user {}", id, folder.user_id);
        fetch_folder(&mut conn, id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".to_string()))
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        let mut conn = self.pool.acquire().await?;
        fetch_folder(&mut conn, id).await
    }

    async fn list_folders_by_user(&self, user_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn list_child_folders(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE user_id = ? AND parent_id IS ? ORDER BY id"
        ))
        .bind(user_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        let mut conn = self.pool.acquire().await?;
        if update.is_empty() {
            return fetch_folder(&mut conn, id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }
        if let Some(parent_id) = update.parent_id {
            separated.push("parent_id = ");
            separated.push_bind_unseparated(parent_id);
        }
        if let Some(in_trash) = update.in_trash {
            separated.push("in_trash = ");
            separated.push_bind_unseparated(in_trash);
        }
        if let Some(deleted_at) = update.deleted_at {
            separated.push("deleted_at = ");
            separated.push_bind_unseparated(deleted_at);
        }
        if let Some(starred) = update.starred {
            separated.push("starred = ");
            separated.push_bind_unseparated(starred);
        }
        if let Some(is_shared) = update.is_shared {
            separated.push("is_shared = ");
            separated.push_bind_unseparated(is_shared);
        }
        if update.modifies() {
            separated.push("modified_at = ");
            separated.push_bind_unseparated(Utc::now());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_folder(&mut conn, id).await
    }

    async fn delete_folder(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(folder) = fetch_folder(&mut tx, id).await? else {
            return Ok(false);
        };

        let owned = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE user_id = ?"
        ))
        .bind(folder.user_id)
        .fetch_all(&mut *tx)
        .await?;
        let doomed = descendant_folder_ids(&owned, id);

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT id FROM files WHERE folder_id IN (");
        let mut separated = query.separated(", ");
        for folder_id in &doomed {
            separated.push_bind(*folder_id);
        }
        separated.push_unseparated(")");
        let file_ids: Vec<i64> = query
            .build_query_scalar::<i64>()
            .fetch_all(&mut *tx)
            .await?;

        for file_id in &file_ids {
            remove_file(&mut tx, *file_id).await?;
        }

        // Detach the subtree first so deletion order cannot trip the
        // parent_id foreign key, even on a malformed loop.
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE folders SET parent_id = NULL WHERE id IN (");
        let mut separated = query.separated(", ");
        for folder_id in &doomed {
            separated.push_bind(*folder_id);
        }
        separated.push_unseparated(")");
        query.build().execute(&mut *tx).await?;

        for folder_id in &doomed {
            sqlx::query("DELETE FROM shares WHERE folder_id = ?")
                .bind(folder_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM folders WHERE id = ?")
                .bind(folder_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(
            "Deleted folder {} with {} subfolders and {} files",
            id,
            doomed.len() - 1,
            file_ids.len()
        );
        Ok(true)
    }

    async fn create_file(&self, file: &NewFile) -> Result<FileMetadata> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO files (name, mime_type, size, user_id, folder_id, path, last_accessed_at, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.name)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(file.user_id)
        .bind(file.folder_id)
        .bind(&file.path)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        adjust_storage(&mut tx, file.user_id, file.size).await?;
        let created = fetch_file(&mut tx, id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))?;
        tx.commit().await?;

        debug!(
            "Created file {} ({} bytes) for user {}",
            id, file.size, file.user_id
        );
        Ok(created)
    }

    async fn get_file(&self, id: i64) -> Result<Option<FileMetadata>> {
        let mut conn = self.pool.acquire().await?;
        fetch_file(&mut conn, id).await
    }

    async fn list_files_by_user(&self, user_id: i64) -> Result<Vec<FileMetadata>> {
        let files = sqlx::query_as::<_, FileMetadata>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn list_files_in_folder(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<Vec<FileMetadata>> {
        let files = sqlx::query_as::<_, FileMetadata>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE user_id = ? AND folder_id IS ? ORDER BY id"
        ))
        .bind(user_id)
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn update_file(&self, id: i64, update: &FileUpdate) -> Result<Option<FileMetadata>> {
        let mut tx = self.pool.begin().await?;
        let Some(existing) = fetch_file(&mut tx, id).await? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(existing));
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }
        if let Some(ref mime_type) = update.mime_type {
            separated.push("mime_type = ");
            separated.push_bind_unseparated(mime_type.clone());
        }
        if let Some(size) = update.size {
            separated.push("size = ");
            separated.push_bind_unseparated(size);
        }
        if let Some(folder_id) = update.folder_id {
            separated.push("folder_id = ");
            separated.push_bind_unseparated(folder_id);
        }
        if let Some(ref path) = update.path {
            separated.push("path = ");
            separated.push_bind_unseparated(path.clone());
        }
        if let Some(starred) = update.starred {
            separated.push("starred = ");
            separated.push_bind_unseparated(starred);
        }
        if let Some(is_shared) = update.is_shared {
            separated.push("is_shared = ");
            separated.push_bind_unseparated(is_shared);
        }
        if let Some(in_trash) = update.in_trash {
            separated.push("in_trash = ");
            separated.push_bind_unseparated(in_trash);
        }
        if let Some(deleted_at) = update.deleted_at {
            separated.push("deleted_at = ");
            separated.push_bind_unseparated(deleted_at);
        }
        if let Some(last_accessed_at) = update.last_accessed_at {
            separated.push("last_accessed_at = ");
            separated.push_bind_unseparated(last_accessed_at);
        }
        if update.modifies() {
            separated.push("modified_at = ");
            separated.push_bind_unseparated(Utc::now());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);
        query.build().execute(&mut *tx).await?;

        if let Some(size) = update.size {
            let delta = size - existing.size;
            if delta != 0 {
                adjust_storage(&mut tx, existing.user_id, delta).await?;
            }
        }

        let updated = fetch_file(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_file(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = remove_file(&mut tx, id).await?;
        tx.commit().await?;

        if let Some(ref file) = removed {
            debug!("Deleted file {} of user {}", id, file.user_id);
        }
        Ok(removed.is_some())
    }

    async fn create_share(&self, share: &NewShare) -> Result<Share> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO shares (file_id, folder_id, user_id, access_type, allow_download, expiry_date, token, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(share.target.file_id())
        .bind(share.target.folder_id())
        .bind(share.user_id)
        .bind(share.access_type.as_str())
        .bind(share.allow_download)
        .bind(share.expiry_date)
        .bind(generate_token())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created share {} for {:?}", id, share.target);
        fetch_share(&mut conn, id)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))
    }

    async fn get_share(&self, id: i64) -> Result<Option<Share>> {
        let mut conn = self.pool.acquire().await?;
        fetch_share(&mut conn, id).await
    }

    async fn find_share_by_token(&self, token: &str) -> Result<Option<Share>> {
        let row = sqlx::query_as::<_, ShareRow>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Share::try_from).transpose()
    }

    async fn list_shares_by_user(&self, user_id: i64) -> Result<Vec<Share>> {
        let rows = sqlx::query_as::<_, ShareRow>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_shares(rows)
    }

    async fn list_shares_for_target(&self, target: ShareTarget) -> Result<Vec<Share>> {
        let sql = match target {
            ShareTarget::File(_) => {
                format!("SELECT {SHARE_COLUMNS} FROM shares WHERE file_id = ? ORDER BY id")
            }
            ShareTarget::Folder(_) => {
                format!("SELECT {SHARE_COLUMNS} FROM shares WHERE folder_id = ? ORDER BY id")
            }
        };
        let id = match target {
            ShareTarget::File(id) | ShareTarget::Folder(id) => id,
        };
        let rows = sqlx::query_as::<_, ShareRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        into_shares(rows)
    }

    async fn delete_share(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    async fn setup() -> (SqliteStorage, User) {
        let store = SqliteStorage::open_in_memory().await.unwrap();
        let user = store
            .create_user(&NewUser::new("alice", "hash", "Alice", 10_000))
            .await
            .unwrap();
        (store, user)
    }

    async fn storage_used(store: &SqliteStorage, user_id: i64) -> i64 {
        store.get_user(user_id).await.unwrap().unwrap().storage_used
    }

    #[tokio::test]
    async fn test_migrations_applied() {
        let store = SqliteStorage::open_in_memory().await.unwrap();
        assert_eq!(
            store.schema_version().await.unwrap(),
            MIGRATIONS.len() as i64
        );
        store.migrate().await.unwrap();
        assert_eq!(
            store.schema_version().await.unwrap(),
            MIGRATIONS.len() as i64
        );
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("vault.db");

        {
            let store = SqliteStorage::open(&path).await.unwrap();
            store
                .create_user(&NewUser::new("bob", "hash", "Bob", 100))
                .await
                .unwrap();
            store.pool().close().await;
        }

        let store = SqliteStorage::open(&path).await.unwrap();
        let bob = store.get_user_by_username("BOB").await.unwrap().unwrap();
        assert_eq!(bob.display_name, "Bob");
    }

    #[tokio::test]
    async fn test_pool_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let on_disk = SqliteStorage::open(temp_dir.path().join("vault.db"))
            .await
            .unwrap();
        assert_eq!(on_disk.pool().options().get_max_connections(), FILE_POOL_SIZE);

        let in_memory = SqliteStorage::open_in_memory().await.unwrap();
        assert_eq!(in_memory.pool().options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn test_user_roundtrip_and_conflict() {
        let (store, user) = setup().await;
        assert_eq!(user.id, 1);
        assert_eq!(user.storage_used, 0);

        let result = store
            .create_user(&NewUser::new("Alice", "hash", "Dup", 1))
            .await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));

        let updated = store
            .update_user(
                user.id,
                &UserUpdate::new()
                    .display_name("Alice L.")
                    .avatar_url(Some("https://img/a.png".to_string())),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.display_name, "Alice L.");
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img/a.png"));
        assert!(store
            .update_user(99, &UserUpdate::new().display_name("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_folder_crud() {
        let (store, user) = setup().await;
        let root = store
            .create_folder(&NewFolder::new("Docs", user.id))
            .await
            .unwrap();
        let child = store
            .create_folder(&NewFolder::new("Taxes", user.id).with_parent(root.id))
            .await
            .unwrap();

        let roots = store.list_child_folders(user.id, None).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, root.id);

        let children = store
            .list_child_folders(user.id, Some(root.id))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        let now = Utc::now();
        let trashed = store
            .update_folder(child.id, &FolderUpdate::trash(now))
            .await
            .unwrap()
            .unwrap();
        assert!(trashed.in_trash);
        assert!(trashed.deleted_at.is_some());
        assert!(trashed.modified_at >= child.modified_at);

        let moved = store
            .update_folder(child.id, &FolderUpdate::new().parent_id(None))
            .await
            .unwrap()
            .unwrap();
        assert!(moved.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_file_accounting() {
        let (store, user) = setup().await;

        let file = store
            .create_file(&NewFile::new("a.pdf", "application/pdf", 1000, user.id, "a.pdf"))
            .await
            .unwrap();
        assert_eq!(storage_used(&store, user.id).await, 1000);

        let resized = store
            .update_file(file.id, &FileUpdate::new().size(400))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resized.size, 400);
        assert_eq!(storage_used(&store, user.id).await, 400);

        assert!(store.delete_file(file.id).await.unwrap());
        assert_eq!(storage_used(&store, user.id).await, 0);
        assert!(!store.delete_file(file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_adjust_storage_clamps_at_zero() {
        let (store, user) = setup().await;
        let updated = store
            .adjust_storage_used(user.id, -500)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.storage_used, 0);
    }

    #[tokio::test]
    async fn test_touch_keeps_modified_at() {
        let (store, user) = setup().await;
        let file = store
            .create_file(&NewFile::new("a.txt", "text/plain", 1, user.id, "a.txt"))
            .await
            .unwrap();

        let later = Utc::now() + ChronoDuration::minutes(5);
        let touched = store
            .update_file(file.id, &FileUpdate::touch(later))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(touched.last_accessed_at, later);
        assert_eq!(touched.modified_at, file.modified_at);
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
        let other = store
            .create_folder(&NewFolder::new("other", user.id))
            .await
            .unwrap();

        let inner = store
            .create_file(
                &NewFile::new("inner.txt", "text/plain", 300, user.id, "i.txt")
                    .in_folder(Some(child.id)),
            )
            .await
            .unwrap();
        store
            .create_file(
                &NewFile::new("outer.txt", "text/plain", 20, user.id, "o.txt")
                    .in_folder(Some(other.id)),
            )
            .await
            .unwrap();
        store
            .create_share(&NewShare::new(ShareTarget::File(inner.id), user.id))
            .await
            .unwrap();
        store
            .create_share(&NewShare::new(ShareTarget::Folder(root.id), user.id))
            .await
            .unwrap();

        assert!(store.delete_folder(root.id).await.unwrap());

        assert!(store.get_folder(root.id).await.unwrap().is_none());
        assert!(store.get_folder(child.id).await.unwrap().is_none());
        assert!(store.get_file(inner.id).await.unwrap().is_none());
        assert!(store.get_folder(other.id).await.unwrap().is_some());
        assert!(store.list_shares_by_user(user.id).await.unwrap().is_empty());
        assert_eq!(storage_used(&store, user.id).await, 20);
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

        assert!(store.delete_folder(b.id).await.unwrap());
        assert!(store.list_folders_by_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shares() {
        let (store, user) = setup().await;
        let folder = store
            .create_folder(&NewFolder::new("Shared", user.id))
            .await
            .unwrap();
        let expiry = Utc::now() - ChronoDuration::hours(1);
        let share = store
            .create_share(
                &NewShare::new(ShareTarget::Folder(folder.id), user.id)
                    .with_access_type(AccessType::Restricted)
                    .with_allow_download(false)
                    .with_expiry(Some(expiry)),
            )
            .await
            .unwrap();
        assert_eq!(share.token.len(), 32);
        assert_eq!(share.access_type, AccessType::Restricted);
        assert!(!share.allow_download);

        let details = store
            .get_share_by_token(&share.token)
            .await
            .unwrap()
            .unwrap();
        assert!(details.file.is_none());
        assert_eq!(details.folder.unwrap().id, folder.id);
        assert_eq!(details.shared_by.unwrap().display_name, "Alice");
        assert!(details.share.is_expired(Utc::now()));

        let for_target = store
            .list_shares_for_target(ShareTarget::Folder(folder.id))
            .await
            .unwrap();
        assert_eq!(for_target.len(), 1);
        assert!(store
            .list_shares_for_target(ShareTarget::File(folder.id))
            .await
            .unwrap()
            .is_empty());

        assert!(store.delete_share(share.id).await.unwrap());
        assert!(store.get_share(share.id).await.unwrap().is_none());
        assert!(store.find_share_by_token(&share.token).await.unwrap().is_none());
    }
}
