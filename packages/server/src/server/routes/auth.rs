//! `/auth/*` endpoints

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::common::{AppError, AppResult};
use crate::domains::auth::actions;
use crate::domains::auth::types::{
    AdminRegisterRequest, EmailRequest, InactiveAccountRequest, LoginRequest, RegisterRequest,
    RegisteredUser, ResetPasswordRequest, SessionGrant, SessionResponse, VerifyAccountRequest,
};
use crate::domains::auth::Actor;
use crate::server::app::AppState;
use crate::server::cookie::{clear_session_cookie, extract_session_id, session_cookie};
use crate::server::response::ApiResponse;

/// Body plus the `Set-Cookie` carrying the session id.
pub(crate) fn session_response(
    state: &AppState,
    grant: &SessionGrant,
    status: StatusCode,
) -> AppResult<Response> {
    let cookie = session_cookie(
        grant.session.session_id,
        state.deps.policy.session_ttl.as_secs(),
        state.cookie_secure,
    );
    let cookie = HeaderValue::from_str(&cookie).map_err(AppError::server)?;

    let mut response = (status, ApiResponse::ok(SessionResponse::from(grant))).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Response> {
    let grant = actions::login(request, &state.deps).await?;
    session_response(&state, &grant, StatusCode::OK)
}

pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, ApiResponse<RegisteredUser>)> {
    let registered = actions::register(request, &state.deps).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(registered)))
}

pub async fn register_from_admin_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<AdminRegisterRequest>,
) -> AppResult<(StatusCode, ApiResponse<RegisteredUser>)> {
    let registered = actions::register_from_admin(request, &actor, &state.deps).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(registered)))
}

/// Only the cookie is needed; the access token may already have expired.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let session_id = extract_session_id(&headers).ok_or(AppError::Forbidden)?;
    let grant = actions::refresh_token(session_id, &state.deps).await?;
    session_response(&state, &grant, StatusCode::OK)
}

/// Always clears the cookie, with or without a live session behind it.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(session_id) = extract_session_id(&headers) {
        actions::logout(session_id, &state.deps).await?;
    }
    let mut response = ApiResponse::plain("logged out").into_response();
    response
        .headers_mut()
        .insert(SET_COOKIE, clear_session_cookie());
    Ok(response)
}

pub async fn send_verification_handler(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> AppResult<(StatusCode, ApiResponse<()>)> {
    actions::send_verification(&request.email, &state.deps).await?;
    Ok((StatusCode::CREATED, ApiResponse::plain("verification email sent")))
}

pub async fn verify_account_handler(
    State(state): State<AppState>,
    Json(request): Json<VerifyAccountRequest>,
) -> AppResult<ApiResponse<()>> {
    actions::verify_account(request, &state.deps).await?;
    Ok(ApiResponse::plain("account verified"))
}

pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> AppResult<(StatusCode, ApiResponse<()>)> {
    actions::forgot_password(&request.email, &state.deps).await?;
    Ok((StatusCode::CREATED, ApiResponse::plain("reset password email sent")))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    actions::reset_password(request, &state.deps).await?;
    Ok(ApiResponse::plain("password updated"))
}

pub async fn inactive_account_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<InactiveAccountRequest>,
) -> AppResult<Response> {
    let deactivated_self = request.user_id == actor.user_id;
    actions::inactive_account(request, &actor, &state.deps).await?;

    let mut response = ApiResponse::plain("account deactivated").into_response();
    if deactivated_self {
        response
            .headers_mut()
            .insert(SET_COOKIE, clear_session_cookie());
    }
    Ok(response)
}
