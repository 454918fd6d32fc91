//! filevault - self-hosted cloud file storage
//!
//! Folders, files, stars, trash and share links behind a REST API,
//! with per-user storage quotas.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use auth::{
    hash_password, login, register, update_profile, validate_password, verify_password,
    PasswordError, ProfileUpdate, RegistrationRequest, ValidationError,
};
pub use config::Config;
pub use db::{open_storage, MemoryStorage, NewUser, SharedStorage, Storage, User, UserUpdate};
pub use error::{Result, VaultError};
pub use file::{DriveService, FileStorage};
