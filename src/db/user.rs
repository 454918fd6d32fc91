//! User model for filevault.
//!
//! A user owns folders, files and shares, and carries the storage
//! accounting fields (`storage_limit`, `storage_used`) in bytes.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// User entity representing a registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Password hash (Argon2). Never serialized.
    #[serde(skip_serializing)]
    pub password: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Avatar image URL (optional).
    pub avatar_url: Option<String>,
    /// Storage quota in bytes.
    pub storage_limit: i64,
    /// Bytes currently counted against the quota.
    pub storage_used: i64,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Bytes still available under the quota, never negative.
    pub fn storage_available(&self) -> u64 {
        (self.storage_limit - self.storage_used).max(0) as u64
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password: String,
    /// Display name.
    pub display_name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Storage quota in bytes.
    pub storage_limit: i64,
}

impl NewUser {
    /// Create a new user with the given credentials and quota.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
        storage_limit: i64,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            display_name: display_name.into(),
            avatar_url: None,
            storage_limit,
        }
    }

    /// Set the avatar URL.
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Data for updating an existing user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub storage_limit: Option<i64>,
    /// Overwrites the accounted usage. Only reconciliation should set this.
    pub storage_used: Option<i64>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the password hash.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set or clear the avatar URL.
    pub fn avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = Some(avatar_url);
        self
    }

    /// Set the storage quota.
    pub fn storage_limit(mut self, storage_limit: i64) -> Self {
        self.storage_limit = Some(storage_limit);
        self
    }

    /// Set the accounted usage.
    pub fn storage_used(mut self, storage_used: i64) -> Self {
        self.storage_used = Some(storage_used);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
            && self.storage_limit.is_none()
            && self.storage_used.is_none()
    }

    /// Merge the set fields into `user`.
    pub fn apply(&self, user: &mut User) {
        if let Some(ref password) = self.password {
            user.password = password.clone();
        }
        if let Some(ref display_name) = self.display_name {
            user.display_name = display_name.clone();
        }
        if let Some(ref avatar_url) = self.avatar_url {
            user.avatar_url = avatar_url.clone();
        }
        if let Some(storage_limit) = self.storage_limit {
            user.storage_limit = storage_limit;
        }
        if let Some(storage_used) = self.storage_used {
            user.storage_used = storage_used.max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            password: "hash".to_string(),
            display_name: "Alice".to_string(),
            avatar_url: None,
            storage_limit: 1000,
            storage_used: 250,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_user_builder() {
        let user = NewUser::new("alice", "hash", "Alice", 1024).with_avatar_url("https://a/b.png");
        assert_eq!(user.username, "alice");
        assert_eq!(user.storage_limit, 1024);
        assert_eq!(user.avatar_url.as_deref(), Some("https://a/b.png"));
    }

    #[test]
    fn test_user_update_is_empty() {
        assert!(UserUpdate::new().is_empty());
        assert!(!UserUpdate::new().display_name("Bob").is_empty());
        assert!(!UserUpdate::new().avatar_url(None).is_empty());
    }

    #[test]
    fn test_user_update_apply() {
        let mut user = sample_user();
        UserUpdate::new()
            .display_name("Alice L.")
            .avatar_url(Some("https://x/y.png".to_string()))
            .apply(&mut user);

        assert_eq!(user.display_name, "Alice L.");
        assert_eq!(user.avatar_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(user.username, "alice");
        assert_eq!(user.storage_used, 250);
    }

    #[test]
    fn test_storage_used_never_negative() {
        let mut user = sample_user();
        UserUpdate::new().storage_used(-10).apply(&mut user);
        assert_eq!(user.storage_used, 0);
    }

    #[test]
    fn test_storage_available() {
        let mut user = sample_user();
        assert_eq!(user.storage_available(), 750);
        user.storage_used = 2000;
        assert_eq!(user.storage_available(), 0);
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["displayName"], "Alice");
        assert_eq!(json["storageUsed"], 250);
    }
}
