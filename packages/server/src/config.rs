use anyhow::{Context, Result};
use dotenvy::dotenv;
use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub auth: AuthPolicy,
    pub email: EmailConfig,
    pub database: DatabaseConfig,
    pub oauth: OAuthConfig,
    pub cookie_secure: bool,
}

/// Signing material and token lifetimes for the access/refresh pair.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub allowed_algs: Vec<Algorithm>,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
}

/// Timing windows for one kind of one-shot token.
#[derive(Debug, Clone, Copy)]
pub struct TokenWindow {
    /// Minimum spacing between two issuances for the same email.
    pub cooldown: Duration,
    /// Lifetime of an issued token, counted from its creation time.
    pub expire: chrono::Duration,
}

/// Lifecycle knobs consumed by the auth and profile domains.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub session_ttl: Duration,
    pub verification: TokenWindow,
    pub reset: TokenWindow,
    /// Upper bound on a single email enqueue, independent of the request deadline.
    pub enqueue_timeout: Duration,
    pub default_profile_image: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Base URL of the client app; verification and reset links point here.
    pub client_url: String,
    pub brevo_api_key: Option<String>,
    pub sender_address: String,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub debug: bool,
    pub slow_query: Duration,
    pub query_log_buffer: usize,
}

/// OpenID Connect provider whose ID tokens `/oauth/login` accepts.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Expected `aud`. Federated login is refused while unset.
    pub client_id: Option<String>,
    pub issuers: Vec<String>,
    pub jwks_uri: String,
    pub jwks_ttl: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            issuers: vec![
                "https://accounts.google.com".to_string(),
                "accounts.google.com".to_string(),
            ],
            jwks_uri: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
            jwks_ttl: Duration::from_secs(600),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            port: parse_env("PORT", 8080)?,
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?,
                issuer: env::var("JWT_ISSUER").context("JWT_ISSUER must be set")?,
                allowed_algs: parse_algorithms(
                    &env::var("JWT_ALLOWED_ALGS").unwrap_or_else(|_| "HS256".to_string()),
                )?,
                access_ttl: minutes("JWT_TOKEN_DURATION", 15)?,
                refresh_ttl: minutes("JWT_REFRESH_DURATION", 1440)?,
            },
            auth: AuthPolicy {
                session_ttl: Duration::from_secs(parse_env::<u64>("SESSION_TTL_HOURS", 24)? * 3600),
                verification: TokenWindow {
                    cooldown: Duration::from_secs(parse_env("VERIFICATION_TOKEN_COOLDOWN_SECS", 60)?),
                    expire: seconds("VERIFICATION_TOKEN_EXPIRE_SECS", 1800)?,
                },
                reset: TokenWindow {
                    cooldown: Duration::from_secs(parse_env("RESET_TOKEN_COOLDOWN_SECS", 60)?),
                    expire: seconds("RESET_TOKEN_EXPIRE_SECS", 900)?,
                },
                enqueue_timeout: Duration::from_millis(parse_env("EMAIL_ENQUEUE_TIMEOUT_MS", 2000)?),
                default_profile_image: env::var("APP_DEFAULT_IMAGE_USER_PROFILE")
                    .unwrap_or_default(),
            },
            email: EmailConfig {
                client_url: env::var("CLIENT_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                brevo_api_key: env::var("BREVO_API_KEY").ok().filter(|k| !k.is_empty()),
                sender_address: env::var("EMAIL_SENDER_ADDRESS")
                    .unwrap_or_else(|_| "no-reply@localhost".to_string()),
                sender_name: env::var("EMAIL_SENDER_NAME")
                    .unwrap_or_else(|_| "authservice".to_string()),
            },
            database: DatabaseConfig {
                max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
                debug: parse_env("DB_DEBUG", false)?,
                slow_query: Duration::from_millis(parse_env("DB_SLOW_QUERY_MS", 200)?),
                query_log_buffer: parse_env("QUERY_LOG_BUFFER", 1024)?,
            },
            oauth: oauth_from_env()?,
            cookie_secure: parse_env("COOKIE_SECURE", false)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn oauth_from_env() -> Result<OAuthConfig> {
    let defaults = OAuthConfig::default();
    let issuers = match env::var("OAUTH_ISSUERS") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => defaults.issuers,
    };
    anyhow::ensure!(!issuers.is_empty(), "OAUTH_ISSUERS must name at least one issuer");

    Ok(OAuthConfig {
        client_id: env::var("OAUTH_CLIENT_ID").ok().filter(|id| !id.is_empty()),
        issuers,
        jwks_uri: env::var("OAUTH_JWKS_URI").unwrap_or(defaults.jwks_uri),
        jwks_ttl: Duration::from_secs(parse_env("OAUTH_JWKS_TTL_SECS", 600)?),
    })
}

fn minutes(key: &str, default: i64) -> Result<chrono::Duration> {
    let value = parse_env(key, default)?;
    chrono::Duration::try_minutes(value).with_context(|| format!("{key} is out of range"))
}

fn seconds(key: &str, default: i64) -> Result<chrono::Duration> {
    let value = parse_env(key, default)?;
    chrono::Duration::try_seconds(value).with_context(|| format!("{key} is out of range"))
}

/// Parse a comma separated list such as `HS256,HS384`.
pub fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>> {
    let algs = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Algorithm::from_str(s).with_context(|| format!("unknown JWT algorithm {s:?}")))
        .collect::<Result<Vec<_>>>()?;

    anyhow::ensure!(!algs.is_empty(), "JWT_ALLOWED_ALGS must name at least one algorithm");
    Ok(algs)
}
