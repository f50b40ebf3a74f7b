//! Account registration
//!
//! Self-service registration creates an unverified `User` and issues the
//! first verification token in the same transaction. Admins register
//! pre-verified accounts with a role of their choosing and no email.

use tracing::{info, warn};

use super::tokens::reissue_token;
use crate::common::{AppError, AppResult, Role, UserId};
use crate::domains::auth::models::{OneShotToken, TokenKind, User, UserDetail};
use crate::domains::auth::repository::{AuthUnit, UserDetailRepository, UserRepository};
use crate::domains::auth::types::{Actor, AdminRegisterRequest, RegisterRequest, RegisteredUser};
use crate::kernel::ServerDeps;

/// Who is creating the account.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Registrant {
    SelfService,
    Admin { admin_id: UserId, role: Role },
}

/// Self-service sign up.
///
/// The cooldown marker and the email enqueue happen after commit. If the
/// enqueue fails the account still exists; the caller can ask for another
/// verification email once the cooldown passes.
pub async fn register(request: RegisterRequest, deps: &ServerDeps) -> AppResult<RegisteredUser> {
    request.validate()?;

    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let (user, detail) =
            create_account(&request, Registrant::SelfService, Some(scope.unit()), deps).await?;
        let token =
            reissue_token(TokenKind::Verification, user.id, Some(scope.unit()), deps).await?;
        Ok::<_, AppError>((user, detail, token))
    }
    .await;
    let (user, detail, token) = scope.finish(result).await?;

    info!(user_id = %user.id, "user registered");
    let verification_queued = announce_verification(&user, &token, deps).await;

    Ok(RegisteredUser {
        user,
        detail,
        verification_queued,
    })
}

/// Registration performed by an administrator. The account is verified
/// at creation and records the admin as its creator.
pub async fn register_from_admin(
    request: AdminRegisterRequest,
    actor: &Actor,
    deps: &ServerDeps,
) -> AppResult<RegisteredUser> {
    actor.require_admin()?;
    request.user.validate()?;

    let registrant = Registrant::Admin {
        admin_id: actor.user_id,
        role: request.role,
    };
    let (user, detail) = create_account(&request.user, registrant, None, deps).await?;

    info!(user_id = %user.id, admin_id = %actor.user_id, role = ?user.role, "user registered by admin");
    Ok(RegisteredUser {
        user,
        detail,
        verification_queued: false,
    })
}

/// Insert the identity and its detail row atomically.
pub(crate) async fn create_account(
    request: &RegisterRequest,
    registrant: Registrant,
    parent: Option<&mut AuthUnit>,
    deps: &ServerDeps,
) -> AppResult<(User, UserDetail)> {
    let mut scope = deps.transactor.atomic(parent).await?;
    let result = async {
        let unit = scope.unit();
        if unit.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::EmailAlreadyExists);
        }

        let password_hash = deps
            .password_hasher
            .hash(&request.password)
            .await
            .map_err(AppError::server)?;

        let now = deps.clock.now();
        let mut user = User::new(request.email.clone(), password_hash, now);
        if let Registrant::Admin { admin_id, role } = registrant {
            user.role = role;
            user.is_verified = true;
            user.created_by = admin_id;
        }
        let user = unit.insert_user(&user).await?;

        let image_url = request
            .image_url
            .clone()
            .unwrap_or_else(|| deps.policy.default_profile_image.clone());
        let mut detail = UserDetail::new(
            user.id,
            request.full_name.trim(),
            request.sex,
            request.birth_date,
            image_url,
            user.created_by,
            now,
        );
        detail.phone_number = request
            .phone_number
            .clone()
            .filter(|phone| !phone.trim().is_empty());
        let detail = unit.insert_detail(&detail).await?;

        Ok::<_, AppError>((user, detail))
    }
    .await;
    scope.finish(result).await
}

/// Post-commit side of issuance: cooldown marker, then the email job.
/// Returns whether the email was queued.
async fn announce_verification(user: &User, token: &OneShotToken, deps: &ServerDeps) -> bool {
    let window = deps.policy.verification.cooldown;
    if let Err(e) = deps
        .cooldown()
        .mark(&user.email, TokenKind::Verification, token, window)
        .await
    {
        warn!(user_id = %user.id, error = %e, "failed to write verification cooldown");
    }

    match deps
        .email_gateway()
        .queue_verification_email(&user.email, token.token)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "verification email not queued after registration");
            false
        }
    }
}
