// HTTP routes
pub mod auth;
pub mod health;
pub mod oauth;
pub mod user;

pub use auth::*;
pub use health::*;
pub use oauth::*;
pub use user::*;
