use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::common::{Sex, UserDetailId, UserId};

/// Profile row, 1:1 with [`super::User`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserDetail {
    pub id: UserDetailId,
    pub user_id: UserId,
    pub full_name: String,
    pub sex: Sex,
    pub phone_number: Option<String>,
    pub image_url: String,
    pub birth_date: NaiveDate,
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

impl UserDetail {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        full_name: impl Into<String>,
        sex: Sex,
        birth_date: NaiveDate,
        image_url: impl Into<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserDetailId::new(),
            user_id,
            full_name: full_name.into(),
            sex,
            phone_number: None,
            image_url: image_url.into(),
            birth_date,
            created_at: now,
            created_by,
            updated_at: now,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            deleted_reason: None,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

const DETAIL_COLUMNS: &str = "id, user_id, full_name, sex, phone_number, image_url, birth_date, \
     created_at, created_by, updated_at, updated_by, deleted_at, deleted_by, deleted_reason";

impl UserDetail {
    pub async fn find_by_user_id(user_id: UserId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let detail = sqlx::query_as::<_, Self>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM user_details WHERE user_id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(detail)
    }

    pub async fn find_by_phone(phone: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let detail = sqlx::query_as::<_, Self>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM user_details WHERE phone_number = $1 AND deleted_at IS NULL"
        ))
        .bind(phone)
        .fetch_optional(conn)
        .await?;
        Ok(detail)
    }

    pub async fn find_by_user_ids(user_ids: &[Uuid], conn: &mut PgConnection) -> Result<Vec<Self>> {
        let details = sqlx::query_as::<_, Self>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM user_details WHERE user_id = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(user_ids)
        .fetch_all(conn)
        .await?;
        Ok(details)
    }

    /// Insert; a duplicate live phone number trips `user_details_phone_live_idx`.
    pub async fn insert(&self, conn: &mut PgConnection) -> Result<Self> {
        let detail = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO user_details (
                id, user_id, full_name, sex, phone_number, image_url, birth_date,
                created_at, created_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {DETAIL_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.user_id)
        .bind(&self.full_name)
        .bind(self.sex)
        .bind(&self.phone_number)
        .bind(&self.image_url)
        .bind(self.birth_date)
        .bind(self.created_at)
        .bind(self.created_by)
        .bind(self.updated_at)
        .fetch_one(conn)
        .await?;
        Ok(detail)
    }

    pub async fn update(&self, conn: &mut PgConnection) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_details
            SET full_name = $2,
                sex = $3,
                phone_number = $4,
                image_url = $5,
                updated_at = $6,
                updated_by = $7,
                deleted_at = $8,
                deleted_by = $9,
                deleted_reason = $10
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(self.id)
        .bind(&self.full_name)
        .bind(self.sex)
        .bind(&self.phone_number)
        .bind(&self.image_url)
        .bind(self.updated_at)
        .bind(self.updated_by)
        .bind(self.deleted_at)
        .bind(self.deleted_by)
        .bind(&self.deleted_reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
