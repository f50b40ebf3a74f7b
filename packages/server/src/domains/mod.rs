// Business domains
pub mod auth;
pub mod email;
pub mod profile;
