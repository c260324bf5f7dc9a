//! zentao-notify - relay new and updated ZenTao bugs to a Feishu group.
//!
//! The [`api`] module holds the multi-dialect ZenTao client; [`poller`]
//! drives polling cycles that push bug cards through [`notify`].

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod poller;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AppError, Result};
