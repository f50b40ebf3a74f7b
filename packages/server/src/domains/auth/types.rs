//! Auth domain data types
//!
//! Request values accepted by the lifecycle actions and the results they return.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::{User, UserDetail};
use super::session::SessionRecord;
use crate::common::{AppError, AppResult, Role, SessionId, Sex, UserId};

pub const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated caller, as established from its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub session_id: SessionId,
}

impl Actor {
    pub fn require_admin(&self) -> AppResult<()> {
        if !self.role.is_admin() {
            return Err(AppError::PermissionDenied);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub sex: Sex,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.full_name.trim().is_empty() {
            return Err(AppError::InvalidRequest("full name is required".into()));
        }
        Ok(())
    }
}

/// Registration performed by an administrator on someone else's behalf.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminRegisterRequest {
    #[serde(flatten)]
    pub user: RegisterRequest,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Both values arrive base64url encoded, exactly as they appear in the email link.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyAccountRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InactiveAccountRequest {
    pub user_id: UserId,
}

/// ID token obtained by the client from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthLoginRequest {
    pub id_token: String,
}

/// Outcome of a successful login, OAuth login or refresh.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub user: User,
    pub session: SessionRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub user: User,
    pub detail: UserDetail,
    /// False when the post-commit email enqueue failed or was not needed.
    pub verification_queued: bool,
}

/// Body returned to the client after login and refresh. The session id
/// travels in a cookie and is not repeated here.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub access_token: String,
    pub login_at: i64,
}

impl From<&SessionGrant> for SessionResponse {
    fn from(grant: &SessionGrant) -> Self {
        Self {
            user_id: grant.user.id,
            email: grant.user.email.clone(),
            role: grant.session.role,
            access_token: grant.session.access_token.clone(),
            login_at: grant.session.login_at,
        }
    }
}

fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid {
        return Err(AppError::InvalidRequest("invalid email address".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
