//! Typed ids for every persisted or cached entity.

pub use super::id::{Id, V4, V7};

/// Marker type for identities (the `users` table).
pub struct User;

/// Marker type for the 1:1 profile row (`user_details`).
pub struct UserDetail;

/// Marker type for one-shot tokens (verification and reset tables).
pub struct OneShotToken;

/// Marker type for cache-resident sessions.
pub struct Session;

pub type UserId = Id<User>;
pub type UserDetailId = Id<UserDetail>;
pub type OneShotTokenId = Id<OneShotToken>;
/// Random so that one session id reveals nothing about another.
pub type SessionId = Id<Session, V4>;
