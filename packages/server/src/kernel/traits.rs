// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Lifecycle rules live in the domains and reach infrastructure through these seams.
//
// Naming convention: Base* for trait names (e.g., BaseCache, BaseJobQueue)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// Cache Trait (Infrastructure - TTL key/value store)
// =============================================================================

#[async_trait]
pub trait BaseCache: Send + Sync {
    /// Unconditional upsert; the entry disappears after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

// =============================================================================
// Password Hashing Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BasePasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<String>;

    /// False for an empty or unparseable hash.
    async fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

// =============================================================================
// Clock Trait (Infrastructure)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Job Queue Trait (Infrastructure - durable background work)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Per-attempt execution timeout enforced by the worker.
    pub timeout: Duration,
    pub max_retries: i32,
}

#[async_trait]
pub trait BaseJobQueue: Send + Sync {
    /// Persist a job for a worker to pick up; returns the job id.
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid>;
}

// =============================================================================
// Email Delivery Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait BaseEmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

// =============================================================================
// Identity Provider Trait (Infrastructure - OIDC ID token checks)
// =============================================================================

/// Identity asserted by a provider-signed ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The token is not a valid assertion for this client.
    #[error("id token rejected: {0}")]
    Rejected(String),

    /// The provider's signing keys could not be obtained.
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

#[async_trait]
pub trait BaseIdentityVerifier: Send + Sync {
    /// Check signature, issuer, audience, expiry and email verification.
    async fn verify(&self, id_token: &str) -> std::result::Result<VerifiedIdentity, IdentityError>;
}
