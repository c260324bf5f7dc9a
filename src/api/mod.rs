//! ZenTao API client and types.
//!
//! This module provides the interface for communicating with a ZenTao
//! server over whichever of its API dialects the server supports.

mod auth;
mod bugs;
mod client;
pub mod error;
pub mod types;

pub use auth::{is_auth_fail, Credentials, Dialect};
pub use bugs::{filter_since, PLACEHOLDER_PRODUCT_NAME};
pub use client::ZentaoClient;
pub use error::ApiError;
pub use types::{Bug, Product};
