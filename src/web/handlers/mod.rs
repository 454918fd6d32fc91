//! API handlers.

pub mod auth;
pub mod file;
pub mod folder;
pub mod share;
pub mod user;
pub mod views;

pub use auth::AppState;
