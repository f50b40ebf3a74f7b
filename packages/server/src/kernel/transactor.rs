//! Atomic blocks over an explicit unit-of-work handle.
//!
//! A unit of work is either a plain pooled connection (every statement
//! autocommits) or an open transaction. Repository methods are implemented on
//! the unit itself, so whoever holds `&mut Unit` decides which transaction a
//! statement runs in. Nothing is carried in ambient state.
//!
//! ```ignore
//! let mut scope = transactor.atomic(parent).await?;
//! let result = do_writes(scope.unit()).await;
//! scope.finish(result).await
//! ```
//!
//! `atomic(Some(unit))` joins `unit` when it is already transactional, so
//! helpers can open their own atomic block without knowing whether a caller
//! already did. Only the outermost (owning) scope commits or rolls back.

use async_trait::async_trait;
use std::sync::Arc;

use crate::common::AppResult;

#[async_trait]
pub trait UnitOfWork: Send {
    fn in_transaction(&self) -> bool;

    /// No-op for a plain connection.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// No-op for a plain connection.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait Database: Send + Sync {
    type Unit: UnitOfWork + ?Sized;

    /// Check out a connection and open a transaction on it.
    async fn begin(&self) -> AppResult<Box<Self::Unit>>;

    /// Check out a connection without a transaction.
    async fn connect(&self) -> AppResult<Box<Self::Unit>>;
}

pub struct Transactor<U: UnitOfWork + ?Sized + 'static> {
    db: Arc<dyn Database<Unit = U>>,
}

impl<U: UnitOfWork + ?Sized + 'static> Clone for Transactor<U> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<U: UnitOfWork + ?Sized + 'static> Transactor<U> {
    pub fn new(db: Arc<dyn Database<Unit = U>>) -> Self {
        Self { db }
    }

    /// Open an atomic scope, joining `parent` if it is already inside a transaction.
    pub async fn atomic<'a>(&self, parent: Option<&'a mut U>) -> AppResult<Atomic<'a, U>> {
        match parent {
            Some(unit) if unit.in_transaction() => Ok(Atomic::Joined(unit)),
            _ => Ok(Atomic::Owned(self.db.begin().await?)),
        }
    }

    /// Plain connection for reads that need no transaction.
    pub async fn connect(&self) -> AppResult<Box<U>> {
        self.db.connect().await
    }
}

pub enum Atomic<'a, U: UnitOfWork + ?Sized> {
    /// Runs inside a caller's transaction; the caller commits.
    Joined(&'a mut U),
    /// Owns the transaction it opened.
    Owned(Box<U>),
}

impl<'a, U: UnitOfWork + ?Sized> Atomic<'a, U> {
    pub fn unit(&mut self) -> &mut U {
        match self {
            Atomic::Joined(unit) => &mut **unit,
            Atomic::Owned(unit) => &mut **unit,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Atomic::Owned(_))
    }

    /// Commit on `Ok`, roll back on `Err`. A failed rollback is logged and
    /// the original error is returned unchanged.
    pub async fn finish<T>(self, result: AppResult<T>) -> AppResult<T> {
        let unit = match self {
            Atomic::Joined(_) => return result,
            Atomic::Owned(unit) => unit,
        };

        match result {
            Ok(value) => {
                unit.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::error!(
                        error = %rollback_err,
                        original_error = %err,
                        "transaction rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}
