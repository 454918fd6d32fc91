//! Request DTOs for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use super::validation::{item_name, no_control_chars, not_empty_trimmed};
use crate::file::AccessType;

/// Deserialize a present field into `Some`, keeping JSON `null` as `Some(None)`.
///
/// Paired with `#[serde(default)]`, an absent field stays `None`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// User registration request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(
        length(min = 1, max = 64),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub display_name: String,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,
}

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Profile update request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub display_name: Option<String>,
    /// Empty string clears the avatar.
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,
}

/// Folder creation request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    #[validate(custom(function = "item_name"))]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Folder update request: rename, move (`parentId: null` for the root) or star.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderRequest {
    #[serde(default)]
    #[validate(custom(function = "item_name"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    #[serde(default)]
    pub starred: Option<bool>,
}

/// File update request: rename, move (`folderId: null` for the root) or star.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(default)]
    #[validate(custom(function = "item_name"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<i64>>,
    #[serde(default)]
    pub starred: Option<bool>,
}

/// Share creation request. Exactly one of `fileId` / `folderId` must be set.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    #[serde(default)]
    pub file_id: Option<i64>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(default = "default_allow_download")]
    pub allow_download: bool,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

fn default_allow_download() -> bool {
    true
}

/// `?parentId=` query for folder listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFoldersQuery {
    pub parent_id: Option<i64>,
}

/// `?folderId=` query for file listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub folder_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_folder_parent_tristate() {
        let absent: UpdateFolderRequest = serde_json::from_str(r#"{"starred":true}"#).unwrap();
        assert_eq!(absent.parent_id, None);
        assert_eq!(absent.starred, Some(true));

        let root: UpdateFolderRequest = serde_json::from_str(r#"{"parentId":null}"#).unwrap();
        assert_eq!(root.parent_id, Some(None));

        let moved: UpdateFolderRequest = serde_json::from_str(r#"{"parentId":7}"#).unwrap();
        assert_eq!(moved.parent_id, Some(Some(7)));
    }

    #[test]
    fn test_update_file_folder_tristate() {
        let root: UpdateFileRequest = serde_json::from_str(r#"{"folderId":null}"#).unwrap();
        assert_eq!(root.folder_id, Some(None));

        let renamed: UpdateFileRequest = serde_json::from_str(r#"{"name":"b.txt"}"#).unwrap();
        assert_eq!(renamed.folder_id, None);
        assert_eq!(renamed.name.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_create_share_defaults() {
        let req: CreateShareRequest = serde_json::from_str(r#"{"fileId":3}"#).unwrap();
        assert_eq!(req.file_id, Some(3));
        assert_eq!(req.folder_id, None);
        assert_eq!(req.access_type, AccessType::Public);
        assert!(req.allow_download);
        assert!(req.expiry_date.is_none());

        let req: CreateShareRequest = serde_json::from_str(
            r#"{"folderId":4,"accessType":"restricted","allowDownload":false,"expiryDate":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(req.access_type, AccessType::Restricted);
        assert!(!req.allow_download);
        assert!(req.expiry_date.is_some());
    }

    #[test]
    fn test_create_folder_validation() {
        let ok = CreateFolderRequest {
            name: "Docs".to_string(),
            parent_id: None,
        };
        assert!(ok.validate().is_ok());

        let blank = CreateFolderRequest {
            name: "   ".to_string(),
            parent_id: None,
        };
        assert!(blank.validate().is_err());

        let control = CreateFolderRequest {
            name: "bad\u{0000}name".to_string(),
            parent_id: None,
        };
        assert!(control.validate().is_err());
    }

    #[test]
    fn test_register_validation() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"jane","password":"password123","displayName":"Jane"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(req.avatar_url.is_none());

        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"ja","password":"short","displayName":""}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("display_name"));
    }
}
