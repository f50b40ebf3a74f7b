use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::common::{OneShotTokenId, UserId};

/// The two single-use token flows. Same shape, separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Verification,
    Reset,
}

impl TokenKind {
    pub fn table(self) -> &'static str {
        match self {
            TokenKind::Verification => "verification_tokens",
            TokenKind::Reset => "reset_tokens",
        }
    }

    /// Suffix of the per-email cooldown key.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Verification => "verification",
            TokenKind::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OneShotToken {
    pub id: OneShotTokenId,
    pub user_id: UserId,
    /// Random v4 value; 122 bits of entropy.
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OneShotToken {
    pub fn issue(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: OneShotTokenId::new(),
            user_id,
            token: Uuid::new_v4(),
            created_at: now,
        }
    }

    /// Valid while `now <= created_at + window`.
    pub fn is_expired(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        match self.created_at.checked_add_signed(window) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl OneShotToken {
    /// Live token matching both the value and its owner.
    pub async fn find_live(
        kind: TokenKind,
        token: Uuid,
        user_id: UserId,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT id, user_id, token, created_at
            FROM {}
            WHERE token = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
            kind.table()
        ))
        .bind(token)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn insert(&self, kind: TokenKind, conn: &mut PgConnection) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO {} (id, user_id, token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, user_id, token, created_at
            "#,
            kind.table()
        ))
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.token)
        .bind(self.created_at)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    /// Soft-delete every live token of `kind` owned by `user_id`.
    pub async fn invalidate_all(
        kind: TokenKind,
        user_id: UserId,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET deleted_at = $2, updated_at = $2
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
            kind.table()
        ))
        .bind(user_id)
        .bind(at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
