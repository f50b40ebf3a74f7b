// Main entry point for the auth API server

use std::sync::Arc;

use anyhow::{Context, Result};
use auth_core::domains::auth::JwtService;
use auth_core::domains::email::{
    BrevoEmailSender, EmailTaskProcessor, LogEmailSender, TYPE_EMAIL_FORGOT_PASSWORD,
    TYPE_EMAIL_VERIFICATION,
};
use auth_core::kernel::jobs::{JobHandler, JobWorker, PostgresJobQueue};
use auth_core::kernel::{
    Argon2PasswordHasher, BaseEmailSender, JwksIdentityVerifier, PgDatabase, QueryLogger,
    RedisCache, ServerDeps, SystemClock, Transactor,
};
use auth_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auth_core=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting auth service API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Connect to cache
    let cache = Arc::new(
        RedisCache::connect(&config.redis_url)
            .await
            .context("Failed to connect to Redis")?,
    );
    tracing::info!("Redis connected");

    let query_log = QueryLogger::spawn(&config.database);
    let database = Arc::new(PgDatabase::new(pool.clone(), query_log));
    let job_queue = Arc::new(PostgresJobQueue::new(pool.clone()));

    if config.oauth.client_id.is_none() {
        tracing::warn!("OAUTH_CLIENT_ID not set, federated login is disabled");
    }

    let deps = ServerDeps::new(
        Transactor::new(database),
        cache,
        Arc::new(Argon2PasswordHasher::new()),
        Arc::new(SystemClock),
        job_queue.clone(),
        Arc::new(
            JwksIdentityVerifier::new(config.oauth.clone())
                .context("Failed to create identity verifier")?,
        ),
        Arc::new(JwtService::new(&config.jwt)),
        config.auth.clone(),
    );

    // Email worker
    let email_sender: Arc<dyn BaseEmailSender> = match &config.email.brevo_api_key {
        Some(key) => Arc::new(
            BrevoEmailSender::new(key.clone(), &config.email)
                .context("Failed to create Brevo client")?,
        ),
        None => {
            tracing::warn!("BREVO_API_KEY not set, emails will only be logged");
            Arc::new(LogEmailSender)
        }
    };
    let processor: Arc<dyn JobHandler> = Arc::new(EmailTaskProcessor::new(
        email_sender,
        config.email.client_url.clone(),
    ));
    let worker = JobWorker::new(job_queue)
        .register(TYPE_EMAIL_VERIFICATION, processor.clone())
        .register(TYPE_EMAIL_FORGOT_PASSWORD, processor);

    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = worker.run(shutdown).await {
                tracing::error!(error = %e, "Job worker exited with error");
            }
        }
    });

    // Build application
    let app = build_app(deps, config.cookie_secure);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Job worker task panicked");
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
