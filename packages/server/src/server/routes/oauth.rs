use axum::{extract::State, http::StatusCode, response::Response, Json};

use super::auth::session_response;
use crate::common::AppResult;
use crate::domains::auth::actions;
use crate::domains::auth::types::OAuthLoginRequest;
use crate::server::app::AppState;

/// Exchanges a provider ID token for a session.
pub async fn oauth_login_handler(
    State(state): State<AppState>,
    Json(request): Json<OAuthLoginRequest>,
) -> AppResult<Response> {
    let grant = actions::oauth_login(request, &state.deps).await?;
    session_response(&state, &grant, StatusCode::OK)
}
