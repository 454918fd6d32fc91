//! Account registration, login and profile updates for filevault.

use tracing::{info, warn};

use crate::auth::validation::{validate_avatar_url, validate_display_name, validate_registration};
use crate::auth::{hash_password, verify_password};
use crate::db::{NewUser, Storage, User, UserUpdate};
use crate::{Result, VaultError};

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Desired username (3-32 characters).
    pub username: String,
    /// Password (8-128 characters).
    pub password: String,
    /// Display name shown on shares.
    pub display_name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
}

impl RegistrationRequest {
    /// Create a new registration request.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Set the avatar URL.
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    /// `Some("")` clears the avatar.
    pub avatar_url: Option<String>,
}

/// Register a new user with the given storage quota.
///
/// This function:
/// 1. Validates all input fields
/// 2. Hashes the password
/// 3. Creates the user; a taken username (any case) is a `Conflict`
pub async fn register(
    store: &dyn Storage,
    request: RegistrationRequest,
    storage_limit: i64,
) -> Result<User> {
    let display_name = request.display_name.trim();
    validate_registration(&request.username, &request.password, display_name)?;
    if let Some(ref avatar_url) = request.avatar_url {
        validate_avatar_url(avatar_url)?;
    }

    let password_hash = hash_password(&request.password)?;

    let mut new_user = NewUser::new(
        &request.username,
        password_hash,
        display_name,
        storage_limit,
    );
    if let Some(avatar_url) = request.avatar_url.filter(|url| !url.is_empty()) {
        new_user = new_user.with_avatar_url(avatar_url);
    }

    let user = store.create_user(&new_user).await?;

    info!(
        username = %user.username,
        user_id = user.id,
        "New user registered"
    );

    Ok(user)
}

/// Check credentials and return the user.
///
/// An unknown username and a wrong password produce the same error.
pub async fn login(store: &dyn Storage, username: &str, password: &str) -> Result<User> {
    let invalid = || VaultError::Auth("invalid username or password".to_string());

    let Some(user) = store.get_user_by_username(username).await? else {
        return Err(invalid());
    };
    if let Err(e) = verify_password(password, &user.password) {
        warn!(username = %user.username, "Failed login attempt: {}", e);
        return Err(invalid());
    }

    info!(username = %user.username, user_id = user.id, "User logged in");
    Ok(user)
}

/// Update the acting user's display name or avatar.
pub async fn update_profile(
    store: &dyn Storage,
    user_id: i64,
    update: ProfileUpdate,
) -> Result<User> {
    let mut changes = UserUpdate::new();

    if let Some(display_name) = update.display_name {
        let display_name = display_name.trim();
        validate_display_name(display_name)?;
        changes = changes.display_name(display_name);
    }
    if let Some(avatar_url) = update.avatar_url {
        validate_avatar_url(&avatar_url)?;
        changes = changes.avatar_url((!avatar_url.is_empty()).then_some(avatar_url));
    }

    if changes.is_empty() {
        return store
            .get_user(user_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()));
    }

    store
        .update_user(user_id, &changes)
        .await?
        .ok_or_else(|| VaultError::NotFound("user".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;

    const LIMIT: i64 = 1024 * 1024;

    #[tokio::test]
    async fn test_register_success() {
        let store = MemoryStorage::new();
        let request = RegistrationRequest::new("jane", "password123", "  Jane Doe ")
            .with_avatar_url("https://example.com/jane.png");

        let user = register(&store, request, LIMIT).await.unwrap();

        assert_eq!(user.username, "jane");
        assert_eq!(user.display_name, "Jane Doe");
        assert_eq!(
            user.avatar_url.as_deref(),
            Some("https://example.com/jane.png")
        );
        assert_eq!(user.storage_limit, LIMIT);
        assert_eq!(user.storage_used, 0);
        assert!(user.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let store = MemoryStorage::new();
        register(
            &store,
            RegistrationRequest::new("jane", "password123", "Jane"),
            LIMIT,
        )
        .await
        .unwrap();

        let result = register(
            &store,
            RegistrationRequest::new("JANE", "password456", "Other Jane"),
            LIMIT,
        )
        .await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_validation_error() {
        let store = MemoryStorage::new();
        let result = register(
            &store,
            RegistrationRequest::new("jane", "short", "Jane"),
            LIMIT,
        )
        .await;
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login() {
        let store = MemoryStorage::new();
        let registered = register(
            &store,
            RegistrationRequest::new("jane", "password123", "Jane"),
            LIMIT,
        )
        .await
        .unwrap();

        let user = login(&store, "Jane", "password123").await.unwrap();
        assert_eq!(user.id, registered.id);

        assert!(matches!(
            login(&store, "jane", "wrong-password").await,
            Err(VaultError::Auth(_))
        ));
        assert!(matches!(
            login(&store, "nobody", "password123").await,
            Err(VaultError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = MemoryStorage::new();
        let user = register(
            &store,
            RegistrationRequest::new("jane", "password123", "Jane")
                .with_avatar_url("https://example.com/a.png"),
            LIMIT,
        )
        .await
        .unwrap();

        let updated = update_profile(
            &store,
            user.id,
            ProfileUpdate {
                display_name: Some("Jane D.".to_string()),
                avatar_url: Some(String::new()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.display_name, "Jane D.");
        assert!(updated.avatar_url.is_none());

        let result = update_profile(
            &store,
            user.id,
            ProfileUpdate {
                display_name: Some(" ".to_string()),
                avatar_url: None,
            },
        )
        .await;
        assert!(matches!(result, Err(VaultError::Validation(_))));

        let unchanged = update_profile(&store, user.id, ProfileUpdate::default())
            .await
            .unwrap();
        assert_eq!(unchanged.display_name, "Jane D.");
    }
}
