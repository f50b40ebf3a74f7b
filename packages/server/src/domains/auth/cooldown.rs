//! Per-email cooldown for one-shot token issuance.
//!
//! A marker mirroring the issued token lives in the cache for the cooldown
//! window. It is checked before any relational I/O.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::models::{OneShotToken, TokenKind};
use crate::common::{AppError, AppResult, UserId};
use crate::kernel::BaseCache;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownMarker {
    pub user_id: UserId,
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Cooldown {
    cache: Arc<dyn BaseCache>,
}

impl Cooldown {
    pub fn new(cache: Arc<dyn BaseCache>) -> Self {
        Self { cache }
    }

    pub fn key(email: &str, kind: TokenKind) -> String {
        format!("{email}:{}", kind.as_str())
    }

    /// `TokenAlreadyExists` while a marker younger than `window` exists.
    pub async fn check(
        &self,
        email: &str,
        kind: TokenKind,
        window: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let key = Self::key(email, kind);
        let Some(raw) = self.cache.get(&key).await.map_err(AppError::server)? else {
            return Ok(());
        };

        let marker = match serde_json::from_str::<CooldownMarker>(&raw) {
            Ok(marker) => marker,
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable cooldown marker");
                return Ok(());
            }
        };

        // A marker from the future (clock skew) still counts as cooling down.
        let age = now.signed_duration_since(marker.created_at);
        match age.to_std() {
            Ok(age) if age >= window => Ok(()),
            _ => Err(AppError::TokenAlreadyExists),
        }
    }

    pub async fn mark(
        &self,
        email: &str,
        kind: TokenKind,
        token: &OneShotToken,
        window: Duration,
    ) -> AppResult<()> {
        let marker = CooldownMarker {
            user_id: token.user_id,
            token: token.token,
            created_at: token.created_at,
        };
        let value = serde_json::to_string(&marker).map_err(AppError::server)?;
        self.cache
            .set(&Self::key(email, kind), value, window)
            .await
            .map_err(AppError::server)
    }
}
