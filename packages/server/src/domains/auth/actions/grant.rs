//! Minting of access/refresh pairs and the session records that hold them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::{AppError, AppResult, SessionId};
use crate::domains::auth::models::User;
use crate::domains::auth::session::SessionRecord;
use crate::domains::auth::types::SessionGrant;
use crate::kernel::ServerDeps;

/// Sign a fresh pair under a new jti. `login_at` is carried over as given.
pub(crate) fn mint_record(
    user: &User,
    session_id: SessionId,
    login_at: i64,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> AppResult<SessionRecord> {
    let jti = Uuid::new_v4().to_string();
    let access_token = deps
        .jwt_service
        .sign(user.id, user.role, &jti, now)
        .map_err(AppError::server)?;
    let refresh_token = deps
        .jwt_service
        .sign_refresh(now)
        .map_err(AppError::server)?;

    Ok(SessionRecord {
        user_id: user.id,
        role: user.role,
        session_id,
        jti,
        access_token,
        refresh_token,
        login_at,
    })
}

/// Start a brand new session for `user`. Every call gets its own session id.
pub(crate) async fn open_session(user: User, deps: &ServerDeps) -> AppResult<SessionGrant> {
    let now = deps.clock.now();
    let session = mint_record(&user, SessionId::new(), now.timestamp_millis(), now, deps)?;
    deps.sessions().create(&session).await?;
    Ok(SessionGrant { user, session })
}
