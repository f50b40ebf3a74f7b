use tracing::info;

use super::logout::logout;
use crate::common::{AppError, AppResult};
use crate::domains::auth::repository::UserRepository;
use crate::domains::auth::types::{Actor, InactiveAccountRequest};
use crate::kernel::ServerDeps;

/// Deactivate an account. Nothing in this crate reactivates it.
///
/// An admin deactivating themself is also logged out of the current session.
pub async fn inactive_account(
    request: InactiveAccountRequest,
    actor: &Actor,
    deps: &ServerDeps,
) -> AppResult<()> {
    actor.require_admin()?;

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let mut user = unit
            .find_user_by_id(request.user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        user.is_active = false;
        user.updated_at = deps.clock.now();
        user.updated_by = Some(actor.user_id);
        unit.update_user(&user).await
    }
    .await;
    scope.finish(result).await?;

    info!(user_id = %request.user_id, admin_id = %actor.user_id, "account deactivated");

    if request.user_id == actor.user_id {
        logout(actor.session_id, deps).await?;
    }
    Ok(())
}
