//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::session_auth_middleware;
use crate::server::routes::{
    delete_user_handler, forgot_password_handler, get_me_handler, get_user_handler,
    health_handler, inactive_account_handler, list_users_handler, login_handler, logout_handler,
    oauth_login_handler, refresh_handler, register_from_admin_handler, register_handler,
    reset_password_handler, send_verification_handler, update_user_handler,
    verify_account_handler,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    /// Adds `Secure` to the session cookie.
    pub cookie_secure: bool,
}

/// Build the Axum application router
///
/// Routes behind the session layer receive the caller as `Extension<Actor>`.
/// Refresh and logout only need the cookie and stay outside it.
pub fn build_app(deps: ServerDeps, cookie_secure: bool) -> Router {
    let state = AppState {
        deps: Arc::new(deps),
        cookie_secure,
    };

    let public = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/send-verification", post(send_verification_handler))
        .route("/auth/verify-account", post(verify_account_handler))
        .route("/auth/forgot-password", post(forgot_password_handler))
        .route("/auth/reset-password", post(reset_password_handler))
        .route("/oauth/login", post(oauth_login_handler))
        .route("/health", get(health_handler));

    let authenticated = Router::new()
        .route("/auth/register/from-admin", post(register_from_admin_handler))
        .route("/auth/inactive-account", patch(inactive_account_handler))
        .route("/user", get(list_users_handler))
        .route("/user/me", get(get_me_handler))
        .route(
            "/user/:user_id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    // CORS configuration - the client app sends the session cookie
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE]);

    public
        .merge(authenticated)
        .layer(cors)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
