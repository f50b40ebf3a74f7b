//! Repository seams for the auth and profile domains.
//!
//! Every method runs on whatever the unit of work is: a plain connection or an
//! open transaction (see [`crate::kernel::transactor`]). Implementations wrap
//! storage failures once, into `ServerError`, and map uniqueness violations
//! to their semantic kinds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{OneShotToken, TokenKind, User, UserDetail, UserQuery};
use crate::common::{AppResult, ListRequest, UserId};
use crate::kernel::UnitOfWork;

#[async_trait]
pub trait UserRepository: Send {
    async fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>>;

    async fn find_user_by_id(&mut self, id: UserId) -> AppResult<Option<User>>;

    /// `EmailAlreadyExists` when a live identity already owns the email.
    async fn insert_user(&mut self, user: &User) -> AppResult<User>;

    /// `NotFound` when no live row matched.
    async fn update_user(&mut self, user: &User) -> AppResult<()>;

    async fn update_password(
        &mut self,
        id: UserId,
        password_hash: &str,
        updated_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// One page of live users matching `query`, in its order.
    async fn list_users(&mut self, query: &UserQuery, page: &ListRequest) -> AppResult<Vec<User>>;

    async fn count_users(&mut self, query: &UserQuery) -> AppResult<u64>;
}

#[async_trait]
pub trait UserDetailRepository: Send {
    async fn find_detail_by_user_id(&mut self, user_id: UserId) -> AppResult<Option<UserDetail>>;

    async fn find_detail_by_phone(&mut self, phone: &str) -> AppResult<Option<UserDetail>>;

    async fn find_details_for(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserDetail>>;

    /// `PhoneAlreadyExists` when a live detail already owns the phone number.
    async fn insert_detail(&mut self, detail: &UserDetail) -> AppResult<UserDetail>;

    /// `NotFound` when no live row matched.
    async fn update_detail(&mut self, detail: &UserDetail) -> AppResult<()>;
}

/// Verification and reset tokens share one repository, keyed by [`TokenKind`].
#[async_trait]
pub trait OneShotTokenRepository: Send {
    /// Matches on the exact value *and* the owning identity.
    async fn find_live_token(
        &mut self,
        kind: TokenKind,
        token: Uuid,
        user_id: UserId,
    ) -> AppResult<Option<OneShotToken>>;

    /// Callers clear prior live tokens first; nothing here enforces it.
    async fn save_token(&mut self, kind: TokenKind, token: &OneShotToken) -> AppResult<OneShotToken>;

    /// Soft-delete all live tokens of `kind` for the identity.
    async fn invalidate_tokens(
        &mut self,
        kind: TokenKind,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Everything a lifecycle flow can touch inside one unit of work.
pub trait AuthRepositories:
    UserRepository + UserDetailRepository + OneShotTokenRepository + UnitOfWork
{
}

impl<T> AuthRepositories for T where
    T: UserRepository + UserDetailRepository + OneShotTokenRepository + UnitOfWork
{
}

/// The unit type threaded through every flow.
pub type AuthUnit = dyn AuthRepositories;
