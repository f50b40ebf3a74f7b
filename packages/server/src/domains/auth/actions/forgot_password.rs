use tracing::info;

use super::tokens::reissue_token;
use crate::common::{AppError, AppResult};
use crate::domains::auth::models::TokenKind;
use crate::domains::auth::repository::UserRepository;
use crate::kernel::ServerDeps;

/// Issue a reset token and queue the reset email.
///
/// Same ordering as verification: cooldown first, then the atomic reissue,
/// then the cooldown marker and the enqueue.
pub async fn forgot_password(email: &str, deps: &ServerDeps) -> AppResult<()> {
    let kind = TokenKind::Reset;
    let window = deps.policy.reset;
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

        reissue_token(kind, user.id, Some(unit), deps).await
    }
    .await;
    let token = scope.finish(result).await?;

    cooldown.mark(email, kind, &token, window.cooldown).await?;
    let job_id = deps
        .email_gateway()
        .queue_forgot_password_email(email, token.token)
        .await?;

    info!(user_id = %token.user_id, job_id = %job_id, "password reset email queued");
    Ok(())
}
