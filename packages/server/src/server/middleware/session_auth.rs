use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::common::{AppError, AppResult};
use crate::domains::auth::repository::UserRepository;
use crate::domains::auth::{Actor, TokenError};
use crate::kernel::ServerDeps;
use crate::server::app::AppState;
use crate::server::cookie::extract_session_id;

/// Session authentication middleware
///
/// Resolves the `session_id` cookie to its session record, checks the
/// stored access token and adds the [`Actor`] to request extensions.
/// Requests without a trustworthy session are rejected here; handlers
/// behind this layer can rely on `Extension<Actor>`.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let actor = authenticate(request.headers(), &state.deps).await?;
    debug!(user_id = %actor.user_id, role = ?actor.role, "authenticated request");

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// `Forbidden` for a missing, unknown or tampered session, or one whose
/// account has since been deactivated or deleted. `TokenExpired` when only
/// the access token has run out (the client should refresh).
pub async fn authenticate(headers: &HeaderMap, deps: &ServerDeps) -> AppResult<Actor> {
    let session_id = extract_session_id(headers).ok_or(AppError::Forbidden)?;
    let record = deps.sessions().load(session_id).await?;
    if record.access_token.is_empty() {
        return Err(AppError::Forbidden);
    }

    let claims = deps
        .jwt_service
        .parse(&record.access_token, deps.clock.now())
        .map_err(|e| match e {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid(_) => AppError::Forbidden,
        })?;
    if claims.jti != record.jti || claims.user_id != Some(record.user_id) {
        return Err(AppError::Forbidden);
    }

    let user = {
        let mut conn = deps.transactor.connect().await?;
        conn.find_user_by_id(record.user_id).await?
    };
    if !user.is_some_and(|u| u.is_active) {
        if let Err(e) = deps.sessions().delete(session_id).await {
            warn!(session_id = %session_id, error = %e, "failed to drop session of closed account");
        }
        return Err(AppError::Forbidden);
    }

    Ok(Actor {
        user_id: record.user_id,
        role: record.role,
        session_id,
    })
}
