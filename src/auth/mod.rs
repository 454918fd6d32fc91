//! Authentication module for filevault.
//!
//! This module provides password hashing, account validation,
//! registration, login and profile updates.

mod password;
mod registration;
pub mod validation;

pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use registration::{login, register, update_profile, ProfileUpdate, RegistrationRequest};
pub use validation::ValidationError;
