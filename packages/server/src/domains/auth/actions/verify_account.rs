//! Consume a verification token

use tracing::info;

use super::tokens::decode_link;
use crate::common::{AppError, AppResult};
use crate::domains::auth::models::TokenKind;
use crate::domains::auth::repository::{
    OneShotTokenRepository, UserDetailRepository, UserRepository,
};
use crate::domains::auth::types::VerifyAccountRequest;
use crate::kernel::ServerDeps;

/// Mark the account verified and burn every live verification token.
///
/// Any failure rolls back, so an expired or mismatched token never flips
/// the verified flag.
pub async fn verify_account(request: VerifyAccountRequest, deps: &ServerDeps) -> AppResult<()> {
    let (email, token) = decode_link(&request.email, &request.token)?;
    let kind = TokenKind::Verification;

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let mut user = unit
            .find_user_by_email(&email)
            .await?
            .filter(|u| !u.is_oauth)
            .ok_or(AppError::AccountNotValid)?;
        if user.is_verified {
            return Err(AppError::AlreadyVerified);
        }
        if unit.find_detail_by_user_id(user.id).await?.is_none() {
            return Err(AppError::DetailNotFound);
        }

        let stored = unit
            .find_live_token(kind, token, user.id)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        let now = deps.clock.now();
        if stored.is_expired(now, deps.policy.verification.expire) {
            return Err(AppError::TokenExpired);
        }

        user.is_verified = true;
        user.updated_at = now;
        user.updated_by = Some(user.id);
        unit.update_user(&user).await?;
        unit.invalidate_tokens(kind, user.id, now).await?;
        Ok(user)
    }
    .await;
    let user = scope.finish(result).await?;

    info!(user_id = %user.id, "account verified");
    Ok(())
}
