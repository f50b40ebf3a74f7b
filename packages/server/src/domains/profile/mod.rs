//! Profile domain - reading and maintaining user records
//!
//! Shares the auth domain's models and repositories.

pub mod actions;
pub mod types;

pub use types::{DeleteUserRequest, UpdateUserRequest, UserProfile};
