//! Share links for filevault.
//!
//! A share points at exactly one file or one folder and is addressed by an
//! opaque random token. Expiry is not enforced here; callers compare
//! [`Share::expiry_date`] against the current time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::db::User;
use crate::file::{FileMetadata, Folder};
use crate::{Result, VaultError};

/// Length of a generated share token.
pub const SHARE_TOKEN_LENGTH: usize = 32;

/// Generate a random alphanumeric share token.
///
/// Uniqueness relies on the size of the token space; the store's unique
/// index rejects the astronomically unlikely collision.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SHARE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Who may open a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Anyone holding the token.
    #[default]
    Public,
    /// Signed-in users holding the token.
    Restricted,
}

impl AccessType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Public => "public",
            AccessType::Restricted => "restricted",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(AccessType::Public),
            "restricted" => Ok(AccessType::Restricted),
            _ => Err(format!("unknown access type: {s}")),
        }
    }
}

/// The item a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareTarget {
    File(i64),
    Folder(i64),
}

impl ShareTarget {
    /// Build a target from the two optional ids of a request or row.
    ///
    /// Exactly one of them must be set.
    pub fn from_ids(file_id: Option<i64>, folder_id: Option<i64>) -> Result<Self> {
        match (file_id, folder_id) {
            (Some(id), None) => Ok(ShareTarget::File(id)),
            (None, Some(id)) => Ok(ShareTarget::Folder(id)),
            (Some(_), Some(_)) => Err(VaultError::Validation(
                "a share targets either a file or a folder, not both".to_string(),
            )),
            (None, None) => Err(VaultError::Validation(
                "a share needs a fileId or a folderId".to_string(),
            )),
        }
    }

    pub fn file_id(&self) -> Option<i64> {
        match self {
            ShareTarget::File(id) => Some(*id),
            ShareTarget::Folder(_) => None,
        }
    }

    pub fn folder_id(&self) -> Option<i64> {
        match self {
            ShareTarget::Folder(id) => Some(*id),
            ShareTarget::File(_) => None,
        }
    }
}

impl Serialize for ShareTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ShareTarget", 2)?;
        state.serialize_field("fileId", &self.file_id())?;
        state.serialize_field("folderId", &self.folder_id())?;
        state.end()
    }
}

/// A share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    /// Unique share ID.
    pub id: i64,
    /// Shared file or folder.
    #[serde(flatten)]
    pub target: ShareTarget,
    /// Sharing user.
    pub user_id: i64,
    pub access_type: AccessType,
    pub allow_download: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Opaque token used in the share URL.
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl Share {
    /// Whether the share has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }
}

/// Data for creating a new share. The store assigns the token.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub target: ShareTarget,
    pub user_id: i64,
    pub access_type: AccessType,
    pub allow_download: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl NewShare {
    /// Create a public, downloadable, non-expiring share.
    pub fn new(target: ShareTarget, user_id: i64) -> Self {
        Self {
            target,
            user_id,
            access_type: AccessType::Public,
            allow_download: true,
            expiry_date: None,
        }
    }

    /// Set the access type.
    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    /// Set whether the target may be downloaded.
    pub fn with_allow_download(mut self, allow_download: bool) -> Self {
        self.allow_download = allow_download;
        self
    }

    /// Set the expiry date.
    pub fn with_expiry(mut self, expiry_date: Option<DateTime<Utc>>) -> Self {
        self.expiry_date = expiry_date;
        self
    }
}

/// Public display fields of the sharing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedBy {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for SharedBy {
    fn from(user: &User) -> Self {
        Self {
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// A share with its target resolved and the sharer's public info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareWithDetails {
    #[serde(flatten)]
    pub share: Share,
    pub file: Option<FileMetadata>,
    pub folder: Option<Folder>,
    /// None when the sharing account no longer exists.
    pub shared_by: Option<SharedBy>,
}
