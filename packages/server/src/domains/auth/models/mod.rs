mod one_shot_token;
mod user;
mod user_detail;
mod user_query;

pub use one_shot_token::{OneShotToken, TokenKind};
pub use user::User;
pub use user_detail::UserDetail;
pub use user_query::{FieldValue, UserField, UserFilter, UserQuery, UserSort};
