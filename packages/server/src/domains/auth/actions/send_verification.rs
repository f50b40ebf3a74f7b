//! Send (or re-send) the account verification email

use tracing::info;

use super::tokens::reissue_token;
use crate::common::{AppError, AppResult};
use crate::domains::auth::models::TokenKind;
use crate::domains::auth::repository::{UserDetailRepository, UserRepository};
use crate::kernel::ServerDeps;

/// Issue a fresh verification token and queue the email carrying it.
///
/// The cooldown is checked before any relational I/O. A failed enqueue is
/// reported as a server error; the committed token is not rolled back.
pub async fn send_verification(email: &str, deps: &ServerDeps) -> AppResult<()> {
    let kind = TokenKind::Verification;
    let window = deps.policy.verification;
    let cooldown = deps.cooldown();
    cooldown
        .check(email, kind, window.cooldown, deps.clock.now())
        .await?;

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let user = unit
            .find_user_by_email(email)
            .await?
            .filter(|u| !u.is_oauth)
            .ok_or(AppError::EmailNotFound)?;
        if user.is_verified {
            return Err(AppError::AlreadyVerified);
        }
        if unit.find_detail_by_user_id(user.id).await?.is_none() {
            return Err(AppError::DetailNotFound);
        }

        reissue_token(kind, user.id, Some(unit), deps).await
    }
    .await;
    let token = scope.finish(result).await?;

    cooldown.mark(email, kind, &token, window.cooldown).await?;
    let job_id = deps
        .email_gateway()
        .queue_verification_email(email, token.token)
        .await?;

    info!(user_id = %token.user_id, job_id = %job_id, "verification email queued");
    Ok(())
}
