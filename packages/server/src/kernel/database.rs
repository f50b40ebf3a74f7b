//! Postgres units of work.
//!
//! `PgUnit` owns either a pooled connection or an open transaction and
//! implements the domain repositories by delegating to the model queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::time::Instant;
use uuid::Uuid;

use super::query_log::QueryLogger;
use super::transactor::{Database, UnitOfWork};
use crate::common::{AppError, AppResult, ListRequest, UserId};
use crate::domains::auth::models::{OneShotToken, TokenKind, User, UserDetail, UserQuery};
use crate::domains::auth::repository::{
    AuthUnit, OneShotTokenRepository, UserDetailRepository, UserRepository,
};

const EMAIL_UNIQUE_INDEX: &str = "users_email_live_idx";
const PHONE_UNIQUE_INDEX: &str = "user_details_phone_live_idx";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    query_log: QueryLogger,
}

impl PgDatabase {
    pub fn new(pool: PgPool, query_log: QueryLogger) -> Self {
        Self { pool, query_log }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Unit = AuthUnit;

    async fn begin(&self) -> AppResult<Box<AuthUnit>> {
        let tx = self.pool.begin().await.map_err(AppError::server)?;
        Ok(Box::new(PgUnit {
            handle: Handle::Transaction(tx),
            query_log: self.query_log.clone(),
        }))
    }

    async fn connect(&self) -> AppResult<Box<AuthUnit>> {
        let conn = self.pool.acquire().await.map_err(AppError::server)?;
        Ok(Box::new(PgUnit {
            handle: Handle::Connection(conn),
            query_log: self.query_log.clone(),
        }))
    }
}

enum Handle {
    Connection(PoolConnection<Postgres>),
    Transaction(Transaction<'static, Postgres>),
}

pub struct PgUnit {
    handle: Handle,
    query_log: QueryLogger,
}

impl PgUnit {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.handle {
            Handle::Connection(conn) => &mut **conn,
            Handle::Transaction(tx) => &mut **tx,
        }
    }
}

/// Time a model call and report it to the query logger.
macro_rules! observed {
    ($unit:expr, $label:literal, $call:expr) => {{
        let started = Instant::now();
        let result = $call;
        $unit
            .query_log
            .record($label, started.elapsed(), result.is_err());
        result
    }};
}

/// Unique index violations become their semantic kinds; everything else is a server error.
fn map_write_error(err: anyhow::Error) -> AppError {
    if let Some(sqlx::Error::Database(db_err)) = err.downcast_ref::<sqlx::Error>() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(EMAIL_UNIQUE_INDEX) => return AppError::EmailAlreadyExists,
                Some(PHONE_UNIQUE_INDEX) => return AppError::PhoneAlreadyExists,
                _ => {}
            }
        }
    }
    AppError::server(err)
}

fn found(updated: bool, entity: &'static str) -> AppResult<()> {
    if updated {
        Ok(())
    } else {
        Err(AppError::NotFound(entity))
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    fn in_transaction(&self) -> bool {
        matches!(self.handle, Handle::Transaction(_))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        match self.handle {
            Handle::Transaction(tx) => tx.commit().await.map_err(AppError::server),
            Handle::Connection(_) => Ok(()),
        }
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        match self.handle {
            Handle::Transaction(tx) => tx.rollback().await.map_err(AppError::server),
            Handle::Connection(_) => Ok(()),
        }
    }
}

#[async_trait]
impl UserRepository for PgUnit {
    async fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        observed!(self, "users.find_by_email", User::find_by_email(email, self.conn()).await)
            .map_err(AppError::server)
    }

    async fn find_user_by_id(&mut self, id: UserId) -> AppResult<Option<User>> {
        observed!(self, "users.find_by_id", User::find_by_id(id, self.conn()).await)
            .map_err(AppError::server)
    }

    async fn insert_user(&mut self, user: &User) -> AppResult<User> {
        observed!(self, "users.insert", user.insert(self.conn()).await).map_err(map_write_error)
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        let updated = observed!(self, "users.update", user.update(self.conn()).await)
            .map_err(AppError::server)?;
        found(updated, "user")
    }

    async fn update_password(
        &mut self,
        id: UserId,
        password_hash: &str,
        updated_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let updated = observed!(
            self,
            "users.update_password",
            User::update_password(id, password_hash, updated_by, at, self.conn()).await
        )
        .map_err(AppError::server)?;
        found(updated, "user")
    }

    async fn list_users(&mut self, query: &UserQuery, page: &ListRequest) -> AppResult<Vec<User>> {
        observed!(
            self,
            "users.list_live",
            User::list_live(query, page.offset(), page.limit(), self.conn()).await
        )
        .map_err(AppError::server)
    }

    async fn count_users(&mut self, query: &UserQuery) -> AppResult<u64> {
        observed!(
            self,
            "users.count_live",
            User::count_live(query, self.conn()).await
        )
        .map_err(AppError::server)
    }
}

#[async_trait]
impl UserDetailRepository for PgUnit {
    async fn find_detail_by_user_id(&mut self, user_id: UserId) -> AppResult<Option<UserDetail>> {
        observed!(
            self,
            "user_details.find_by_user_id",
            UserDetail::find_by_user_id(user_id, self.conn()).await
        )
        .map_err(AppError::server)
    }

    async fn find_detail_by_phone(&mut self, phone: &str) -> AppResult<Option<UserDetail>> {
        observed!(
            self,
            "user_details.find_by_phone",
            UserDetail::find_by_phone(phone, self.conn()).await
        )
        .map_err(AppError::server)
    }

    async fn find_details_for(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserDetail>> {
        observed!(
            self,
            "user_details.find_by_user_ids",
            UserDetail::find_by_user_ids(user_ids, self.conn()).await
        )
        .map_err(AppError::server)
    }

    async fn insert_detail(&mut self, detail: &UserDetail) -> AppResult<UserDetail> {
        observed!(self, "user_details.insert", detail.insert(self.conn()).await)
            .map_err(map_write_error)
    }

    async fn update_detail(&mut self, detail: &UserDetail) -> AppResult<()> {
        let updated = observed!(self, "user_details.update", detail.update(self.conn()).await)
            .map_err(map_write_error)?;
        found(updated, "user detail")
    }
}

#[async_trait]
impl OneShotTokenRepository for PgUnit {
    async fn find_live_token(
        &mut self,
        kind: TokenKind,
        token: Uuid,
        user_id: UserId,
    ) -> AppResult<Option<OneShotToken>> {
        observed!(
            self,
            "one_shot_tokens.find_live",
            OneShotToken::find_live(kind, token, user_id, self.conn()).await
        )
        .map_err(AppError::server)
    }

    async fn save_token(&mut self, kind: TokenKind, token: &OneShotToken) -> AppResult<OneShotToken> {
        observed!(self, "one_shot_tokens.insert", token.insert(kind, self.conn()).await)
            .map_err(AppError::server)
    }

    async fn invalidate_tokens(
        &mut self,
        kind: TokenKind,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        observed!(
            self,
            "one_shot_tokens.invalidate_all",
            OneShotToken::invalidate_all(kind, user_id, at, self.conn()).await
        )
        .map_err(AppError::server)
    }
}
