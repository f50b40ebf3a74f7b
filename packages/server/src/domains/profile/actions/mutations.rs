//! Profile mutation actions

use tracing::info;

use crate::common::{AppError, AppResult, UserId};
use crate::domains::auth::repository::{UserDetailRepository, UserRepository};
use crate::domains::auth::types::Actor;
use crate::domains::profile::types::{DeleteUserRequest, UpdateUserRequest, UserProfile};
use crate::kernel::ServerDeps;

/// Update a user's detail row and, for admins, the account flags.
///
/// Users may only edit themselves. Admins may edit anyone except another admin.
pub async fn update_user(
    user_id: UserId,
    request: UpdateUserRequest,
    actor: &Actor,
    deps: &ServerDeps,
) -> AppResult<UserProfile> {
    if user_id != actor.user_id {
        actor.require_admin()?;
    }
    if request.full_name.trim().is_empty() {
        return Err(AppError::InvalidRequest("full name is required".into()));
    }
    let phone_number = request
        .phone_number
        .clone()
        .filter(|phone| !phone.trim().is_empty());

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let mut user = unit
            .find_user_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        let mut detail = unit
            .find_detail_by_user_id(user_id)
            .await?
            .ok_or(AppError::DetailNotFound)?;

        if let Some(phone) = phone_number.as_deref() {
            if let Some(owner) = unit.find_detail_by_phone(phone).await? {
                if owner.user_id != user_id {
                    return Err(AppError::PhoneAlreadyExists);
                }
            }
        }

        if user.role.is_admin() && user.id != actor.user_id {
            return Err(AppError::PermissionDenied);
        }

        let now = deps.clock.now();
        if actor.role.is_admin() {
            user.role = request.role.unwrap_or(user.role);
            user.is_verified = request.is_verified.unwrap_or(user.is_verified);
            user.is_active = request.is_active.unwrap_or(user.is_active);
            user.updated_at = now;
            user.updated_by = Some(actor.user_id);
            unit.update_user(&user).await?;
        }

        detail.full_name = request.full_name.trim().to_string();
        detail.sex = request.sex;
        detail.phone_number = phone_number.clone();
        if let Some(image_url) = request.image_url.clone() {
            detail.image_url = image_url;
        }
        detail.updated_at = now;
        detail.updated_by = Some(actor.user_id);
        unit.update_detail(&detail).await?;

        Ok(UserProfile {
            user,
            detail: Some(detail),
        })
    }
    .await;
    let profile = scope.finish(result).await?;

    info!(user_id = %user_id, updated_by = %actor.user_id, "user updated");
    Ok(profile)
}

/// Soft-delete an identity and its detail. Admin only; never another admin
/// and never oneself.
pub async fn delete_user(
    user_id: UserId,
    request: DeleteUserRequest,
    actor: &Actor,
    deps: &ServerDeps,
) -> AppResult<()> {
    actor.require_admin()?;
    if user_id == actor.user_id {
        return Err(AppError::PermissionDenied);
    }

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        let mut user = unit
            .find_user_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if user.role.is_admin() {
            return Err(AppError::PermissionDenied);
        }
        let detail = unit.find_detail_by_user_id(user_id).await?;

        let now = deps.clock.now();
        let reason = Some(request.reason.clone());

        if let Some(mut detail) = detail {
            detail.updated_at = now;
            detail.updated_by = Some(actor.user_id);
            detail.deleted_at = Some(now);
            detail.deleted_by = Some(actor.user_id);
            detail.deleted_reason = reason.clone();
            unit.update_detail(&detail).await?;
        }

        user.updated_at = now;
        user.updated_by = Some(actor.user_id);
        user.deleted_at = Some(now);
        user.deleted_by = Some(actor.user_id);
        user.deleted_reason = reason;
        unit.update_user(&user).await
    }
    .await;
    scope.finish(result).await?;

    info!(user_id = %user_id, deleted_by = %actor.user_id, "user deleted");
    Ok(())
}
