//! Web API module for filevault.
//!
//! This module provides the REST API over the drive: authentication,
//! folders, files, derived views and share links.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
