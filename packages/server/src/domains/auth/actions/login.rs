//! Password login

use tracing::info;

use super::grant::open_session;
use crate::common::{AppError, AppResult};
use crate::domains::auth::models::User;
use crate::domains::auth::repository::UserRepository;
use crate::domains::auth::types::{LoginRequest, SessionGrant};
use crate::kernel::ServerDeps;

/// Authenticate with email and password and open a new session.
///
/// Reads only, followed by a single cache write, so no transaction is opened.
pub async fn login(request: LoginRequest, deps: &ServerDeps) -> AppResult<SessionGrant> {
    let user = {
        let mut conn = deps.transactor.connect().await?;
        conn.find_user_by_email(&request.email)
            .await?
            .filter(User::has_password)
            .ok_or(AppError::EmailNotFound)?
    };

    if !deps
        .password_hasher
        .verify(&request.password, &user.password_hash)
        .await
    {
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AppError::AccountNotValid);
    }
    if !user.is_verified {
        return Err(AppError::Unverified);
    }

    let grant = open_session(user, deps).await?;
    info!(
        user_id = %grant.user.id,
        session_id = %grant.session.session_id,
        "user logged in"
    );
    Ok(grant)
}
