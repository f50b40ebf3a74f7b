//! Cache-backed session records.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{AppError, AppResult, Role, SessionId, UserId};
use crate::kernel::BaseCache;

const SESSION_PREFIX: &str = "session_id";

/// Everything needed to authorize and renew one login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub role: Role,
    pub session_id: SessionId,
    pub jti: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch millis of the original login; survives refreshes.
    pub login_at: i64,
}

/// Why a session could not be read. Callers treat both as untrusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMiss {
    Absent,
    Corrupt,
}

#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn BaseCache>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn BaseCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn key(session_id: SessionId) -> String {
        format!("{SESSION_PREFIX}:{session_id}")
    }

    /// Unconditional upsert; the TTL restarts on every write.
    pub async fn create(&self, record: &SessionRecord) -> AppResult<()> {
        let value = serde_json::to_string(record).map_err(AppError::server)?;
        self.cache
            .set(&Self::key(record.session_id), value, self.ttl)
            .await
            .map_err(AppError::server)
    }

    /// `Ok(Err(miss))` when the key is absent or its contents do not decode.
    pub async fn read(
        &self,
        session_id: SessionId,
    ) -> AppResult<Result<SessionRecord, SessionMiss>> {
        let key = Self::key(session_id);
        let Some(raw) = self.cache.get(&key).await.map_err(AppError::server)? else {
            return Ok(Err(SessionMiss::Absent));
        };

        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Ok(Ok(record)),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "corrupt session record");
                Ok(Err(SessionMiss::Corrupt))
            }
        }
    }

    /// Like [`read`](Self::read), with both miss shapes collapsed into `Forbidden`.
    pub async fn load(&self, session_id: SessionId) -> AppResult<SessionRecord> {
        self.read(session_id).await?.map_err(|_| AppError::Forbidden)
    }

    /// Idempotent.
    pub async fn delete(&self, session_id: SessionId) -> AppResult<()> {
        self.cache
            .delete(&Self::key(session_id))
            .await
            .map_err(AppError::server)
    }
}
