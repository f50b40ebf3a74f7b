//! Test harnesses for integration testing.
//!
//! [`TestHarness`] runs the lifecycle against the in-memory fakes and is
//! what most tests use. [`InfraHarness`] runs against real Postgres and
//! Redis containers that are started once and shared by every test.

use anyhow::{Context, Result};
use auth_core::common::Role;
use auth_core::domains::auth::actions::{login, oauth_login, register_from_admin};
use auth_core::domains::auth::models::User;
use auth_core::domains::auth::types::{OAuthLoginRequest, SessionGrant};
use auth_core::domains::auth::JwtService;
use auth_core::domains::email::EmailPayload;
use auth_core::kernel::jobs::PostgresJobQueue;
use auth_core::kernel::test_dependencies::TestDependencies;
use auth_core::kernel::{
    Argon2PasswordHasher, PgDatabase, QueryLogger, RedisCache, ServerDeps, SystemClock, Transactor,
};
use sqlx::PgPool;
use std::sync::Arc;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

use super::fixtures::{admin_register_request, login_request, system_admin, PASSWORD};

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-memory harness
// =============================================================================

/// Fresh fakes per test. `deps` exposes the knobs (clock, fault switches,
/// recorded jobs); `server` is what the actions receive.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let user = ctx.verified_user("a@example.com").await;
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub server: ServerDeps,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        init_tracing();
        Self::with(TestDependencies::new())
    }

    async fn teardown(self) {}
}

impl TestHarness {
    pub fn with(deps: TestDependencies) -> Self {
        let server = deps.server_deps();
        Self { deps, server }
    }

    /// A verified, active account with role `User` and password [`PASSWORD`].
    pub async fn verified_user(&self, email: &str) -> User {
        self.account(email, Role::User).await
    }

    pub async fn account(&self, email: &str, role: Role) -> User {
        register_from_admin(admin_register_request(email, role), &system_admin(), &self.server)
            .await
            .expect("seed account")
            .user
    }

    /// ID token the stub provider will vouch for.
    pub fn id_token(&self, email: &str, name: &str) -> OAuthLoginRequest {
        OAuthLoginRequest {
            id_token: self.deps.identity.issue(email, name),
        }
    }

    /// Sign in through the identity provider, provisioning on first use.
    pub async fn federated_login(&self, email: &str) -> SessionGrant {
        oauth_login(self.id_token(email, "Fed User"), &self.server)
            .await
            .expect("oauth login")
    }

    pub async fn login_as(&self, email: &str) -> SessionGrant {
        login(login_request(email, PASSWORD), &self.server)
            .await
            .expect("login")
    }

    /// Payload of the most recent email job of `job_type`.
    pub fn last_email(&self, job_type: &str) -> EmailPayload {
        let job = self
            .deps
            .job_queue
            .jobs_of(job_type)
            .pop()
            .expect("no email job queued");
        serde_json::from_value(job.payload).expect("email payload")
    }
}

// =============================================================================
// Container harness
// =============================================================================

/// Shared test infrastructure that persists across all tests.
/// Containers are started once and reused, migrations run once.
struct SharedTestInfra {
    db_url: String,
    redis_url: String,
    // Keep containers alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
    _redis: ContainerAsync<Redis>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let redis = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let redis_host = redis.get_host().await?;
        let redis_port = redis.get_host_port_ipv4(6379).await?;
        let redis_url = format!("redis://{}:{}", redis_host, redis_port);

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            redis_url,
            _postgres: postgres,
            _redis: redis,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Production adapters over the shared containers.
///
/// Tests share one database, so each test should use its own emails.
pub struct InfraHarness {
    pub db_pool: PgPool,
    pub server: ServerDeps,
}

impl AsyncTestContext for InfraHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl InfraHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;
        let cache = RedisCache::connect(&infra.redis_url)
            .await
            .context("Failed to connect to test redis")?;

        let defaults = TestDependencies::new();
        let server = ServerDeps::new(
            Transactor::new(Arc::new(PgDatabase::new(
                db_pool.clone(),
                QueryLogger::disabled(),
            ))),
            Arc::new(cache),
            Arc::new(Argon2PasswordHasher::with_params(8, 1, 1)?),
            Arc::new(SystemClock),
            Arc::new(PostgresJobQueue::new(db_pool.clone())),
            defaults.identity.clone(),
            Arc::new(JwtService::new(&defaults.jwt)),
            defaults.policy,
        );

        Ok(Self { db_pool, server })
    }
}
