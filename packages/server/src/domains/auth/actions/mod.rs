//! Auth domain actions - the credential and session lifecycle
//!
//! Actions are plain async functions over [`ServerDeps`](crate::kernel::ServerDeps),
//! called from the HTTP routes and directly from tests.

mod forgot_password;
mod grant;
mod inactive_account;
mod login;
mod logout;
mod oauth_login;
mod refresh_token;
mod register;
mod reset_password;
mod send_verification;
mod tokens;
mod verify_account;

pub use forgot_password::forgot_password;
pub use inactive_account::inactive_account;
pub use login::login;
pub use logout::logout;
pub use oauth_login::{oauth_login, FEDERATED_BIRTH_DATE};
pub use refresh_token::refresh_token;
pub use register::{register, register_from_admin};
pub use reset_password::reset_password;
pub use send_verification::send_verification;
pub use verify_account::verify_account;
