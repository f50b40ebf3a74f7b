//! One-shot token issuance shared by registration, verification and reset.

use uuid::Uuid;

use crate::common::encoding::decode_url;
use crate::common::{AppError, AppResult, UserId};
use crate::domains::auth::models::{OneShotToken, TokenKind};
use crate::domains::auth::repository::{AuthUnit, OneShotTokenRepository};
use crate::kernel::ServerDeps;

/// Replace every live token of `kind` for the identity with a fresh one.
///
/// Joins `parent` when it is already transactional, otherwise runs in its
/// own atomic block. Either way the invalidation and the insert commit together.
pub(crate) async fn reissue_token(
    kind: TokenKind,
    user_id: UserId,
    parent: Option<&mut AuthUnit>,
    deps: &ServerDeps,
) -> AppResult<OneShotToken> {
    let mut scope = deps.transactor.atomic(parent).await?;
    let result = async {
        let now = deps.clock.now();
        let unit = scope.unit();
        unit.invalidate_tokens(kind, user_id, now).await?;
        unit.save_token(kind, &OneShotToken::issue(user_id, now)).await
    }
    .await;
    scope.finish(result).await
}

/// Decode the `(email, token)` pair from an emailed link.
pub(crate) fn decode_link(email: &str, token: &str) -> AppResult<(String, Uuid)> {
    let email = decode_url(email).ok_or(AppError::TokenInvalid)?;
    let token = decode_url(token)
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .ok_or(AppError::TokenInvalid)?;
    Ok((email, token))
}
