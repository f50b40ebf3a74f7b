//! Server dependencies for the domains (using traits for testability)
//!
//! This module provides the central dependency container used by every
//! lifecycle flow. All external services use trait abstractions so tests can
//! swap in the fakes from [`super::test_dependencies`].

use std::sync::Arc;

use crate::config::AuthPolicy;
use crate::domains::auth::repository::AuthUnit;
use crate::domains::auth::{Cooldown, JwtService, SessionStore};
use crate::domains::email::EmailGateway;
use crate::kernel::{
    BaseCache, BaseClock, BaseIdentityVerifier, BaseJobQueue, BasePasswordHasher, Transactor,
};

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub transactor: Transactor<AuthUnit>,
    pub cache: Arc<dyn BaseCache>,
    pub password_hasher: Arc<dyn BasePasswordHasher>,
    pub clock: Arc<dyn BaseClock>,
    pub job_queue: Arc<dyn BaseJobQueue>,
    pub identity_verifier: Arc<dyn BaseIdentityVerifier>,
    /// JWT service for token creation
    pub jwt_service: Arc<JwtService>,
    pub policy: AuthPolicy,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        transactor: Transactor<AuthUnit>,
        cache: Arc<dyn BaseCache>,
        password_hasher: Arc<dyn BasePasswordHasher>,
        clock: Arc<dyn BaseClock>,
        job_queue: Arc<dyn BaseJobQueue>,
        identity_verifier: Arc<dyn BaseIdentityVerifier>,
        jwt_service: Arc<JwtService>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            transactor,
            cache,
            password_hasher,
            clock,
            job_queue,
            identity_verifier,
            jwt_service,
            policy,
        }
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.cache.clone(), self.policy.session_ttl)
    }

    pub fn cooldown(&self) -> Cooldown {
        Cooldown::new(self.cache.clone())
    }

    pub fn email_gateway(&self) -> EmailGateway {
        EmailGateway::new(self.job_queue.clone(), self.policy.enqueue_timeout)
    }
}
