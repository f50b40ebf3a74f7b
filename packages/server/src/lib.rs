// Auth Service - API Core
//
// Credential and session lifecycle for the user directory: password and
// OAuth login, cache-backed sessions, email verification and password reset.
//
// Domains live under domains/*, infrastructure seams under kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
