// TestDependencies - in-memory implementations for testing
//
// Provides fakes for every infrastructure seam so lifecycle flows can run
// without Postgres, Redis or a mail provider.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::transactor::{Database, Transactor, UnitOfWork};
use super::{
    Argon2PasswordHasher, BaseCache, BaseClock, BaseEmailSender, BaseIdentityVerifier,
    BaseJobQueue, EnqueueOptions, IdentityError, OutboundEmail, ServerDeps, VerifiedIdentity,
};
use crate::common::{AppError, AppResult, ListRequest, UserId};
use crate::config::{AuthPolicy, JwtConfig, TokenWindow};
use crate::domains::auth::models::{OneShotToken, TokenKind, User, UserDetail, UserQuery};
use crate::domains::auth::repository::{
    AuthUnit, OneShotTokenRepository, UserDetailRepository, UserRepository,
};
use crate::domains::auth::JwtService;

// =============================================================================
// Mock Clock
// =============================================================================

pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap())
    }
}

impl BaseClock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// In-Memory Cache
// =============================================================================

/// TTL cache whose expiry follows the injected clock.
pub struct InMemoryCache {
    clock: Arc<dyn BaseClock>,
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    failing: AtomicBool,
    failing_deletes: AtomicBool,
}

impl InMemoryCache {
    pub fn new(clock: Arc<dyn BaseClock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            failing_deletes: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the cache were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only deletes; reads and writes keep working.
    pub fn set_failing_deletes(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > now)
    }

    /// Overwrite a raw value in place, keeping its TTL.
    pub fn corrupt(&self, key: &str, raw: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(key) {
            entry.0 = raw.to_string();
        }
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("cache unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl BaseCache for InMemoryCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.check()?;
        let expires_at = self.clock.now() + chrono::Duration::from_std(ttl)?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let live = entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone());
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("cache delete timed out"));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// =============================================================================
// Spy Job Queue
// =============================================================================

#[derive(Debug, Clone)]
pub struct EnqueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub options: EnqueueOptions,
}

/// Records every enqueue; can be told to fail or stall.
#[derive(Default)]
pub struct SpyJobQueue {
    jobs: Mutex<Vec<EnqueuedJob>>,
    failing: AtomicBool,
    stall: Mutex<Option<Duration>>,
}

impl SpyJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long inside every enqueue.
    pub fn set_stall(&self, stall: Option<Duration>) {
        *self.stall.lock().unwrap() = stall;
    }

    pub fn jobs(&self) -> Vec<EnqueuedJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn jobs_of(&self, job_type: &str) -> Vec<EnqueuedJob> {
        self.jobs()
            .into_iter()
            .filter(|job| job.job_type == job_type)
            .collect()
    }

    pub fn last(&self) -> Option<EnqueuedJob> {
        self.jobs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl BaseJobQueue for SpyJobQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid> {
        let stall = *self.stall.lock().unwrap();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("job queue unavailable"));
        }

        let id = Uuid::now_v7();
        self.jobs.lock().unwrap().push(EnqueuedJob {
            id,
            job_type: job_type.to_string(),
            payload,
            options,
        });
        Ok(id)
    }
}

// =============================================================================
// Recording Email Sender
// =============================================================================

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseEmailSender for RecordingEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mail provider returned 503"));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// =============================================================================
// Stub Identity Provider
// =============================================================================

/// Accepts only the ID tokens it has issued itself.
#[derive(Default)]
pub struct StubIdentityProvider {
    issued: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl StubIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an opaque ID token vouching for `email`.
    pub fn issue(&self, email: &str, name: &str) -> String {
        let token = format!("idtoken-{}", Uuid::new_v4().simple());
        let identity = VerifiedIdentity {
            subject: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
        };
        self.issued.lock().unwrap().insert(token.clone(), identity);
        token
    }
}

#[async_trait]
impl BaseIdentityVerifier for StubIdentityProvider {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.issued
            .lock()
            .unwrap()
            .get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown id token".into()))
    }
}

// =============================================================================
// In-Memory Database
// =============================================================================

#[derive(Debug, Clone)]
struct StoredToken {
    token: OneShotToken,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    details: Vec<UserDetail>,
    tokens: HashMap<TokenKind, Vec<StoredToken>>,
}

#[derive(Default)]
struct Faults {
    fail_token_writes: AtomicBool,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Serialises transactions behind one lock; a transaction restores its
/// snapshot on rollback or when dropped without commit.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<AsyncMutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_token_writes(&self, fail: bool) {
        self.faults.fail_token_writes.store(fail, Ordering::SeqCst);
    }

    pub fn commits(&self) -> usize {
        self.faults.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.faults.rollbacks.load(Ordering::SeqCst)
    }

    /// Every row, including soft-deleted ones.
    pub async fn all_users(&self) -> Vec<User> {
        self.state.lock().await.users.clone()
    }

    pub async fn all_details(&self) -> Vec<UserDetail> {
        self.state.lock().await.details.clone()
    }

    /// Live tokens of `kind` owned by `user_id`.
    pub async fn live_tokens(&self, kind: TokenKind, user_id: UserId) -> Vec<OneShotToken> {
        self.state
            .lock()
            .await
            .tokens
            .get(&kind)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter(|t| t.deleted_at.is_none() && t.token.user_id == user_id)
                    .map(|t| t.token.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rewrite a stored token's creation time.
    pub async fn backdate_tokens(&self, kind: TokenKind, user_id: UserId, by: chrono::Duration) {
        let mut state = self.state.lock().await;
        for stored in state.tokens.entry(kind).or_default() {
            if stored.token.user_id == user_id {
                stored.token.created_at -= by;
            }
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Unit = AuthUnit;

    async fn begin(&self) -> AppResult<Box<AuthUnit>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryUnit {
            mode: Mode::Transaction {
                guard,
                snapshot: Some(snapshot),
            },
            state: self.state.clone(),
            faults: self.faults.clone(),
        }))
    }

    async fn connect(&self) -> AppResult<Box<AuthUnit>> {
        Ok(Box::new(MemoryUnit {
            mode: Mode::Autocommit,
            state: self.state.clone(),
            faults: self.faults.clone(),
        }))
    }
}

enum Mode {
    Autocommit,
    Transaction {
        guard: OwnedMutexGuard<MemoryState>,
        /// `None` once committed.
        snapshot: Option<MemoryState>,
    },
}

pub struct MemoryUnit {
    mode: Mode,
    state: Arc<AsyncMutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl MemoryUnit {
    async fn with_state<R>(&mut self, f: impl FnOnce(&mut MemoryState) -> R + Send) -> R {
        match &mut self.mode {
            Mode::Transaction { guard, .. } => f(guard),
            Mode::Autocommit => {
                let mut state = self.state.lock().await;
                f(&mut state)
            }
        }
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        if let Mode::Transaction { guard, snapshot } = &mut self.mode {
            if let Some(snapshot) = snapshot.take() {
                **guard = snapshot;
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    fn in_transaction(&self) -> bool {
        matches!(self.mode, Mode::Transaction { .. })
    }

    async fn commit(mut self: Box<Self>) -> AppResult<()> {
        if let Mode::Transaction { snapshot, .. } = &mut self.mode {
            snapshot.take();
            self.faults.commits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        if self.in_transaction() {
            self.faults.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        // Drop restores the snapshot.
        Ok(())
    }
}

fn is_live_user(user: &User) -> bool {
    user.deleted_at.is_none()
}

/// Live users joined with their live detail, as the SQL listing sees them.
fn matching_users<'a>(
    state: &'a MemoryState,
    query: &UserQuery,
) -> Vec<(&'a User, Option<&'a UserDetail>)> {
    state
        .users
        .iter()
        .filter(|u| is_live_user(u))
        .map(|u| {
            let detail = state
                .details
                .iter()
                .find(|d| d.user_id == u.id && d.deleted_at.is_none());
            (u, detail)
        })
        .filter(|(u, d)| query.matches(u, *d))
        .collect()
}

fn phone_taken(state: &MemoryState, detail: &UserDetail) -> bool {
    let Some(phone) = &detail.phone_number else {
        return false;
    };
    state.details.iter().any(|other| {
        other.deleted_at.is_none()
            && other.id != detail.id
            && other.phone_number.as_deref() == Some(phone.as_str())
    })
}

#[async_trait]
impl UserRepository for MemoryUnit {
    async fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        let email = email.to_string();
        Ok(self
            .with_state(move |state| {
                state
                    .users
                    .iter()
                    .find(|u| is_live_user(u) && u.email == email)
                    .cloned()
            })
            .await)
    }

    async fn find_user_by_id(&mut self, id: UserId) -> AppResult<Option<User>> {
        Ok(self
            .with_state(move |state| {
                state
                    .users
                    .iter()
                    .find(|u| is_live_user(u) && u.id == id)
                    .cloned()
            })
            .await)
    }

    async fn insert_user(&mut self, user: &User) -> AppResult<User> {
        let user = user.clone();
        self.with_state(move |state| {
            if state
                .users
                .iter()
                .any(|u| is_live_user(u) && u.email == user.email)
            {
                return Err(AppError::EmailAlreadyExists);
            }
            state.users.push(user.clone());
            Ok(user)
        })
        .await
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        let user = user.clone();
        self.with_state(move |state| {
            let slot = state
                .users
                .iter_mut()
                .find(|u| is_live_user(u) && u.id == user.id)
                .ok_or(AppError::NotFound("user"))?;
            let password_hash = std::mem::take(&mut slot.password_hash);
            *slot = User {
                password_hash,
                ..user
            };
            Ok(())
        })
        .await
    }

    async fn update_password(
        &mut self,
        id: UserId,
        password_hash: &str,
        updated_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let password_hash = password_hash.to_string();
        self.with_state(move |state| {
            let slot = state
                .users
                .iter_mut()
                .find(|u| is_live_user(u) && u.id == id)
                .ok_or(AppError::NotFound("user"))?;
            slot.password_hash = password_hash;
            slot.updated_by = Some(updated_by);
            slot.updated_at = at;
            Ok(())
        })
        .await
    }

    async fn list_users(&mut self, query: &UserQuery, page: &ListRequest) -> AppResult<Vec<User>> {
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let query = query.clone();
        Ok(self
            .with_state(move |state| {
                let mut rows = matching_users(state, &query);
                rows.sort_by(|a, b| query.compare((a.0, a.1), (b.0, b.1)));
                rows.into_iter()
                    .skip(offset)
                    .take(limit)
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .await)
    }

    async fn count_users(&mut self, query: &UserQuery) -> AppResult<u64> {
        let query = query.clone();
        Ok(self
            .with_state(move |state| matching_users(state, &query).len() as u64)
            .await)
    }
}

#[async_trait]
impl UserDetailRepository for MemoryUnit {
    async fn find_detail_by_user_id(&mut self, user_id: UserId) -> AppResult<Option<UserDetail>> {
        Ok(self
            .with_state(move |state| {
                state
                    .details
                    .iter()
                    .find(|d| d.deleted_at.is_none() && d.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn find_detail_by_phone(&mut self, phone: &str) -> AppResult<Option<UserDetail>> {
        let phone = phone.to_string();
        Ok(self
            .with_state(move |state| {
                state
                    .details
                    .iter()
                    .find(|d| d.deleted_at.is_none() && d.phone_number.as_deref() == Some(phone.as_str()))
                    .cloned()
            })
            .await)
    }

    async fn find_details_for(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserDetail>> {
        let user_ids = user_ids.to_vec();
        Ok(self
            .with_state(move |state| {
                state
                    .details
                    .iter()
                    .filter(|d| d.deleted_at.is_none() && user_ids.contains(d.user_id.as_uuid()))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn insert_detail(&mut self, detail: &UserDetail) -> AppResult<UserDetail> {
        let detail = detail.clone();
        self.with_state(move |state| {
            if phone_taken(state, &detail) {
                return Err(AppError::PhoneAlreadyExists);
            }
            state.details.push(detail.clone());
            Ok(detail)
        })
        .await
    }

    async fn update_detail(&mut self, detail: &UserDetail) -> AppResult<()> {
        let detail = detail.clone();
        self.with_state(move |state| {
            if phone_taken(state, &detail) {
                return Err(AppError::PhoneAlreadyExists);
            }
            let slot = state
                .details
                .iter_mut()
                .find(|d| d.deleted_at.is_none() && d.id == detail.id)
                .ok_or(AppError::NotFound("user detail"))?;
            *slot = detail;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl OneShotTokenRepository for MemoryUnit {
    async fn find_live_token(
        &mut self,
        kind: TokenKind,
        token: Uuid,
        user_id: UserId,
    ) -> AppResult<Option<OneShotToken>> {
        Ok(self
            .with_state(move |state| {
                state.tokens.get(&kind).and_then(|tokens| {
                    tokens
                        .iter()
                        .find(|t| {
                            t.deleted_at.is_none()
                                && t.token.token == token
                                && t.token.user_id == user_id
                        })
                        .map(|t| t.token.clone())
                })
            })
            .await)
    }

    async fn save_token(&mut self, kind: TokenKind, token: &OneShotToken) -> AppResult<OneShotToken> {
        if self.faults.fail_token_writes.load(Ordering::SeqCst) {
            return Err(AppError::server(anyhow!("token table unavailable")));
        }
        let token = token.clone();
        Ok(self
            .with_state(move |state| {
                state.tokens.entry(kind).or_default().push(StoredToken {
                    token: token.clone(),
                    deleted_at: None,
                });
                token
            })
            .await)
    }

    async fn invalidate_tokens(
        &mut self,
        kind: TokenKind,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self
            .with_state(move |state| {
                let mut affected = 0;
                for stored in state.tokens.entry(kind).or_default() {
                    if stored.deleted_at.is_none() && stored.token.user_id == user_id {
                        stored.deleted_at = Some(at);
                        affected += 1;
                    }
                }
                affected
            })
            .await)
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

pub const TEST_JWT_SECRET: &str = "test-secret-key-with-enough-entropy";
pub const TEST_JWT_ISSUER: &str = "authservice-test";

#[derive(Clone)]
pub struct TestDependencies {
    pub db: Arc<MemoryDatabase>,
    pub cache: Arc<InMemoryCache>,
    pub clock: Arc<MockClock>,
    pub job_queue: Arc<SpyJobQueue>,
    pub email_sender: Arc<RecordingEmailSender>,
    pub identity: Arc<StubIdentityProvider>,
    pub jwt: JwtConfig,
    pub policy: AuthPolicy,
}

impl TestDependencies {
    pub fn new() -> Self {
        let clock = Arc::new(MockClock::default());
        Self {
            db: Arc::new(MemoryDatabase::new()),
            cache: Arc::new(InMemoryCache::new(clock.clone())),
            clock,
            job_queue: Arc::new(SpyJobQueue::new()),
            email_sender: Arc::new(RecordingEmailSender::new()),
            identity: Arc::new(StubIdentityProvider::new()),
            jwt: JwtConfig {
                secret: TEST_JWT_SECRET.to_string(),
                issuer: TEST_JWT_ISSUER.to_string(),
                allowed_algs: vec![Algorithm::HS256],
                access_ttl: chrono::Duration::minutes(15),
                refresh_ttl: chrono::Duration::hours(24),
            },
            policy: AuthPolicy {
                session_ttl: Duration::from_secs(24 * 3600),
                verification: TokenWindow {
                    cooldown: Duration::from_secs(60),
                    expire: chrono::Duration::minutes(30),
                },
                reset: TokenWindow {
                    cooldown: Duration::from_secs(60),
                    expire: chrono::Duration::minutes(15),
                },
                enqueue_timeout: Duration::from_millis(200),
                default_profile_image: "https://cdn.example.com/default-avatar.png".to_string(),
            },
        }
    }

    /// Adjust lifecycle policy before building deps
    pub fn policy(mut self, f: impl FnOnce(&mut AuthPolicy)) -> Self {
        f(&mut self.policy);
        self
    }

    /// Convert into ServerDeps for testing
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            Transactor::new(self.db.clone()),
            self.cache.clone(),
            // Minimal cost parameters; hashing speed is irrelevant here.
            Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap_or_default()),
            self.clock.clone(),
            self.job_queue.clone(),
            self.identity.clone(),
            Arc::new(JwtService::new(&self.jwt)),
            self.policy.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Transactor;

    #[tokio::test]
    async fn test_cache_entries_expire_with_the_clock() {
        let clock = Arc::new(MockClock::default());
        let cache = InMemoryCache::new(clock.clone());
        cache.set("k", "v".into(), Duration::from_secs(10)).await.unwrap();

        clock.advance(chrono::Duration::seconds(9));
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let db = MemoryDatabase::new();
        let transactor: Transactor<AuthUnit> = Transactor::new(Arc::new(db.clone()));
        let now = Utc::now();

        let mut scope = transactor.atomic(None).await.unwrap();
        scope
            .unit()
            .insert_user(&User::new("a@example.com", "h".into(), now))
            .await
            .unwrap();
        let result: AppResult<()> = scope.finish(Err(AppError::TokenInvalid)).await;
        assert!(result.is_err());

        assert!(db.all_users().await.is_empty());
        assert_eq!(db.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let db = MemoryDatabase::new();
        {
            let mut unit = db.begin().await.unwrap();
            unit.insert_user(&User::new("a@example.com", "h".into(), Utc::now()))
                .await
                .unwrap();
        }
        assert!(db.all_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_live_email_is_unique() {
        let db = MemoryDatabase::new();
        let mut unit = db.connect().await.unwrap();
        let now = Utc::now();

        unit.insert_user(&User::new("a@example.com", "h".into(), now))
            .await
            .unwrap();
        let again = unit
            .insert_user(&User::new("a@example.com", "h".into(), now))
            .await;
        assert!(matches!(again, Err(AppError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_update_user_keeps_password_hash() {
        let db = MemoryDatabase::new();
        let mut unit = db.connect().await.unwrap();
        let user = User::new("a@example.com", "original".into(), Utc::now());
        unit.insert_user(&user).await.unwrap();

        let mut changed = user.clone();
        changed.password_hash = String::new();
        changed.is_active = false;
        unit.update_user(&changed).await.unwrap();

        let stored = unit.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "original");
        assert!(!stored.is_active);
    }
}
