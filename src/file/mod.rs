//! Drive module for filevault.
//!
//! This module provides the user-facing file model:
//! - Folder trees and file metadata
//! - Share links with opaque tokens
//! - Derived views (recent, starred, shared, trash)
//! - Blob storage with UUID naming
//! - The [`DriveService`] that ties them together per acting user

mod folder;
mod metadata;
mod service;
mod share;
mod storage;
mod views;

pub use folder::{Folder, FolderUpdate, FolderWithStats, NewFolder};
pub use metadata::{FileMetadata, FileUpdate, FileWithPath, NewFile};
pub use service::{
    validate_name, DriveService, DriveView, FileChanges, FolderChanges, ShareRequest,
    StorageSummary, StoredUpload, TrashPurge, UploadRequest,
};
pub use share::{
    generate_token, AccessType, NewShare, Share, ShareTarget, ShareWithDetails, SharedBy,
    SHARE_TOKEN_LENGTH,
};
pub use storage::FileStorage;
pub use views::descendant_folder_ids;

/// Maximum length for file and folder names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Window of the recent view, in days.
pub const RECENT_DAYS: i64 = 30;

/// MIME type used when none is supplied or guessable.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
