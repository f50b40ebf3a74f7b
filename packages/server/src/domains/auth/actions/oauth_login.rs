//! Login through an external identity provider
//!
//! The client completes the provider handshake and hands over the ID token.
//! Only the identity that token proves is trusted.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::grant::open_session;
use crate::common::{AppError, AppResult, Sex};
use crate::domains::auth::models::{User, UserDetail};
use crate::domains::auth::repository::{UserDetailRepository, UserRepository};
use crate::domains::auth::types::{OAuthLoginRequest, SessionGrant};
use crate::kernel::{IdentityError, ServerDeps, VerifiedIdentity};

/// Placeholder birth date for federated accounts; providers do not share one.
pub const FEDERATED_BIRTH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2000, 12, 30) {
    Some(date) => date,
    None => panic!("invalid federated birth date"),
};

/// Verify the ID token, find or create its federated account, then open a session.
///
/// An email already owned by a password account is refused rather than linked.
pub async fn oauth_login(request: OAuthLoginRequest, deps: &ServerDeps) -> AppResult<SessionGrant> {
    let profile = match deps.identity_verifier.verify(&request.id_token).await {
        Ok(identity) => identity,
        Err(IdentityError::Rejected(reason)) => {
            warn!(%reason, "id token rejected");
            return Err(AppError::TokenInvalid);
        }
        Err(IdentityError::Unavailable(e)) => return Err(AppError::ServerError(e)),
    };
    federated_login(profile, deps).await
}

async fn federated_login(profile: VerifiedIdentity, deps: &ServerDeps) -> AppResult<SessionGrant> {
    let mut scope = deps.transactor.atomic(None).await?;
    let result = async {
        let unit = scope.unit();
        if let Some(existing) = unit.find_user_by_email(&profile.email).await? {
            if !existing.is_oauth {
                return Err(AppError::EmailAlreadyExists);
            }
            return Ok((existing, false));
        }

        let now = deps.clock.now();
        let user = unit
            .insert_user(&User::federated(profile.email.clone(), now))
            .await?;

        let detail = UserDetail::new(
            user.id,
            profile.name.trim(),
            Sex::Other,
            FEDERATED_BIRTH_DATE,
            deps.policy.default_profile_image.clone(),
            user.id,
            now,
        );
        unit.insert_detail(&detail).await?;
        Ok((user, true))
    }
    .await;
    let (user, created) = scope.finish(result).await?;

    if !user.is_active {
        return Err(AppError::AccountNotValid);
    }

    let grant = open_session(user, deps).await?;
    info!(
        user_id = %grant.user.id,
        session_id = %grant.session.session_id,
        subject = %profile.subject,
        created,
        "oauth login"
    );
    Ok(grant)
}
