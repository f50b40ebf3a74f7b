//! Consume a reset token and set a new password

use tracing::info;

use super::tokens::decode_link;
use crate::common::{AppError, AppResult};
use crate::domains::auth::models::TokenKind;
use crate::domains::auth::repository::{OneShotTokenRepository, UserRepository};
use crate::domains::auth::types::{validate_password, ResetPasswordRequest};
use crate::kernel::ServerDeps;

/// Existing sessions are left alone; only the stored hash changes.
pub async fn reset_password(request: ResetPasswordRequest, deps: &ServerDeps) -> AppResult<()> {
    validate_password(&request.password)?;
    let (email, token) = decode_link(&request.email, &request.token)?;
    let kind = TokenKind::Reset;

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let user = unit
            .find_user_by_email(&email)
            .await?
            .filter(|u| !u.is_oauth)
            .ok_or(AppError::EmailNotFound)?;

        let stored = unit
            .find_live_token(kind, token, user.id)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        let now = deps.clock.now();
        if stored.is_expired(now, deps.policy.reset.expire) {
            return Err(AppError::TokenExpired);
        }

        let password_hash = deps
            .password_hasher
            .hash(&request.password)
            .await
            .map_err(AppError::server)?;
        unit.update_password(user.id, &password_hash, user.id, now)
            .await?;
        unit.invalidate_tokens(kind, user.id, now).await?;
        Ok(user)
    }
    .await;
    let user = scope.finish(result).await?;

    info!(user_id = %user.id, "password reset");
    Ok(())
}
