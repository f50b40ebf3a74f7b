use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Failure kinds surfaced by the lifecycle engine and profile domain.
///
/// Semantic kinds are raised directly where the rule is checked. Storage,
/// cache, hashing, signing and queue failures are wrapped once in
/// `ServerError` at the seam where they occur.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("data not found : {0}")]
    NotFound(&'static str),

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("email does not exist")]
    EmailNotFound,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is not verified")]
    Unverified,

    #[error("account is already verified")]
    AlreadyVerified,

    #[error("account is not valid")]
    AccountNotValid,

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("token already sent, please wait before requesting another")]
    TokenAlreadyExists,

    #[error("user detail does not exist")]
    DetailNotFound,

    #[error("forbidden access")]
    Forbidden,

    #[error("session expired")]
    SessionExpired,

    #[error("you do not have permission to access this resource")]
    PermissionDenied,

    #[error("phone number already exists")]
    PhoneAlreadyExists,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("internal server error")]
    ServerError(#[source] anyhow::Error),
}

impl AppError {
    pub fn server(err: impl Into<anyhow::Error>) -> Self {
        AppError::ServerError(err.into())
    }

    /// Stable HTTP status for each kind.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) | AppError::EmailNotFound | AppError::DetailNotFound => 404,
            AppError::EmailAlreadyExists
            | AppError::AlreadyVerified
            | AppError::PhoneAlreadyExists => 409,
            AppError::InvalidCredentials | AppError::SessionExpired => 401,
            AppError::Unverified | AppError::Forbidden | AppError::PermissionDenied => 403,
            AppError::AccountNotValid
            | AppError::TokenInvalid
            | AppError::TokenExpired
            | AppError::InvalidRequest(_) => 400,
            AppError::TokenAlreadyExists => 429,
            AppError::ServerError(_) => 500,
        }
    }

    /// The boundary must drop the client's session cookie for these.
    pub fn clears_session(&self) -> bool {
        matches!(self, AppError::Forbidden | AppError::SessionExpired)
    }
}
