//! QuillHub Shared Types and Utilities
//!
//! This crate contains the account model, role set, and database plumbing
//! shared by the API server and its operator tools.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
