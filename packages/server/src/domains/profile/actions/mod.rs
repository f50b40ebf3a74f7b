mod mutations;
mod queries;

pub use mutations::{delete_user, update_user};
pub use queries::{get_me, get_user, list_users};
