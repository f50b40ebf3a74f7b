use tracing::info;

use crate::common::{AppResult, SessionId};
use crate::kernel::ServerDeps;

/// Drop the session record. Logging out twice is not an error.
pub async fn logout(session_id: SessionId, deps: &ServerDeps) -> AppResult<()> {
    deps.sessions().delete(session_id).await?;
    info!(session_id = %session_id, "session closed");
    Ok(())
}
