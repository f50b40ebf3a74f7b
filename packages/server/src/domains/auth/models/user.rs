use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::UserQuery;
use crate::common::{Role, UserId};

/// Identity row. Federated (OAuth) accounts carry an empty password hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_oauth: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub deleted_by: Option<UserId>,
    #[serde(skip_serializing)]
    pub deleted_reason: Option<String>,
}

impl User {
    /// Fresh, self-created, unverified account with role `User`.
    pub fn new(email: impl Into<String>, password_hash: String, now: DateTime<Utc>) -> Self {
        let id = UserId::new();
        Self {
            id,
            email: email.into(),
            password_hash,
            role: Role::User,
            is_verified: false,
            is_oauth: false,
            is_active: true,
            created_at: now,
            created_by: id,
            updated_at: now,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            deleted_reason: None,
        }
    }

    /// Account created through an identity provider: verified, no password.
    pub fn federated(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_verified: true,
            is_oauth: true,
            ..Self::new(email, String::new(), now)
        }
    }

    /// Federated accounts never authenticate with a local password.
    pub fn has_password(&self) -> bool {
        !self.is_oauth && !self.password_hash.is_empty()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

const USER_COLUMNS: &str = "id, email, password_hash, role, is_verified, is_oauth, is_active, \
     created_at, created_by, updated_at, updated_by, deleted_at, deleted_by, deleted_reason";

const QUALIFIED_USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.role, u.is_verified, \
     u.is_oauth, u.is_active, u.created_at, u.created_by, u.updated_at, u.updated_by, \
     u.deleted_at, u.deleted_by, u.deleted_reason";

/// At most one live detail per user, so the join never duplicates rows.
const LIVE_DETAIL_JOIN: &str =
    "LEFT JOIN user_details ud ON ud.user_id = u.id AND ud.deleted_at IS NULL";

impl User {
    /// Exact, case-sensitive match against live rows.
    pub async fn find_by_email(email: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(id: UserId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    /// Insert; a duplicate live email trips `users_email_live_idx`.
    pub async fn insert(&self, conn: &mut PgConnection) -> Result<Self> {
        let user = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO users (
                id, email, password_hash, role, is_verified, is_oauth, is_active,
                created_at, created_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(self.role)
        .bind(self.is_verified)
        .bind(self.is_oauth)
        .bind(self.is_active)
        .bind(self.created_at)
        .bind(self.created_by)
        .bind(self.updated_at)
        .fetch_one(conn)
        .await?;
        Ok(user)
    }

    /// Persist state flags, audit stamps and soft-delete columns.
    /// Returns false when no live row matched.
    pub async fn update(&self, conn: &mut PgConnection) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = $2,
                is_verified = $3,
                is_active = $4,
                updated_at = $5,
                updated_by = $6,
                deleted_at = $7,
                deleted_by = $8,
                deleted_reason = $9
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(self.id)
        .bind(self.role)
        .bind(self.is_verified)
        .bind(self.is_active)
        .bind(self.updated_at)
        .bind(self.updated_by)
        .bind(self.deleted_at)
        .bind(self.deleted_by)
        .bind(&self.deleted_reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(
        id: UserId,
        password_hash: &str,
        updated_by: UserId,
        updated_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_by = $3, updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(updated_by)
        .bind(updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of live users matching `query`. Filters may reference the
    /// live detail row through the `ud` alias.
    pub async fn list_live(
        query: &UserQuery,
        offset: i64,
        limit: i64,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {QUALIFIED_USER_COLUMNS} FROM users u {LIVE_DETAIL_JOIN} WHERE u.deleted_at IS NULL"
        ));
        query.push_where(&mut qb);
        query.push_order_by(&mut qb);
        qb.push(" OFFSET ").push_bind(offset);
        qb.push(" LIMIT ").push_bind(limit);

        let users = qb.build_query_as::<Self>().fetch_all(conn).await?;
        Ok(users)
    }

    pub async fn count_live(query: &UserQuery, conn: &mut PgConnection) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM users u {LIVE_DETAIL_JOIN} WHERE u.deleted_at IS NULL"
        ));
        query.push_where(&mut qb);

        let count = qb.build_query_scalar::<i64>().fetch_one(conn).await?;
        Ok(count.max(0) as u64)
    }

    pub fn ids(users: &[Self]) -> Vec<Uuid> {
        users.iter().map(|u| u.id.into_uuid()).collect()
    }
}
