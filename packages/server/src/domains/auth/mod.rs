//! Auth domain - credential and session lifecycle
//!
//! Responsibilities:
//! - Password and OAuth login backed by cache-resident sessions
//! - Access/refresh token signing and verification
//! - Verification and password reset tokens with cooldown and expiry

pub mod actions;
pub mod cooldown;
pub mod jwt;
pub mod models;
pub mod repository;
pub mod session;
pub mod types;

pub use cooldown::{Cooldown, CooldownMarker};
pub use jwt::{Claims, JwtService, TokenError};
pub use repository::{AuthRepositories, AuthUnit};
pub use session::{SessionMiss, SessionRecord, SessionStore};
pub use types::Actor;
