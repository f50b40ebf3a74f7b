use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::BaseCache;
use crate::server::app::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const PING_KEY: &str = "health:ping";

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: ComponentHealth,
    cache: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn from_check<E: std::fmt::Display>(result: Result<Result<(), E>, tokio::time::error::Elapsed>) -> Self {
        match result {
            Ok(Ok(())) => Self {
                status: "ok".to_string(),
                error: None,
            },
            Ok(Err(e)) => Self {
                status: "error".to_string(),
                error: Some(e.to_string()),
            },
            Err(_) => Self {
                status: "error".to_string(),
                error: Some(format!("timeout (>{}s)", CHECK_TIMEOUT.as_secs())),
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Health check endpoint
///
/// Checks:
/// - Database connectivity (a connection can be checked out)
/// - Cache responsiveness (a read round-trip)
///
/// Returns 200 OK if all systems are healthy, 503 Service Unavailable otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = ComponentHealth::from_check(
        tokio::time::timeout(CHECK_TIMEOUT, async {
            state.deps.transactor.connect().await.map(|_| ())
        })
        .await,
    );
    let cache = ComponentHealth::from_check(
        tokio::time::timeout(CHECK_TIMEOUT, async {
            state.deps.cache.get(PING_KEY).await.map(|_| ())
        })
        .await,
    );

    let is_healthy = database.is_ok() && cache.is_ok();
    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            database,
            cache,
        }),
    )
}
