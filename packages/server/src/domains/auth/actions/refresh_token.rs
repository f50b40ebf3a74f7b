//! Sliding renewal of an existing session

use tracing::{info, warn};

use super::grant::mint_record;
use crate::common::{AppError, AppResult, SessionId};
use crate::domains::auth::repository::UserRepository;
use crate::domains::auth::types::SessionGrant;
use crate::kernel::ServerDeps;

/// Re-sign the session's token pair under a new jti.
///
/// The session id and the original login time are kept; the record is
/// overwritten with a fresh TTL. Concurrent refreshes race and the last
/// write wins.
pub async fn refresh_token(session_id: SessionId, deps: &ServerDeps) -> AppResult<SessionGrant> {
    let sessions = deps.sessions();
    let current = sessions.load(session_id).await?;
    if current.refresh_token.is_empty() {
        return Err(AppError::Forbidden);
    }

    let now = deps.clock.now();
    if let Err(e) = deps.jwt_service.parse(&current.refresh_token, now) {
        warn!(session_id = %session_id, error = %e, "refresh token rejected, dropping session");
        if let Err(e) = sessions.delete(session_id).await {
            warn!(session_id = %session_id, error = %e, "failed to drop expired session");
        }
        return Err(AppError::SessionExpired);
    }

    let user = {
        let mut conn = deps.transactor.connect().await?;
        conn.find_user_by_id(current.user_id).await?
    };
    let Some(user) = user.filter(|u| u.is_active) else {
        return Err(AppError::Forbidden);
    };

    let session = mint_record(&user, session_id, current.login_at, now, deps)?;
    sessions.create(&session).await?;

    info!(user_id = %user.id, session_id = %session_id, "session refreshed");
    Ok(SessionGrant { user, session })
}
