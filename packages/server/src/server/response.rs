//! JSON envelope shared by every endpoint, plus the error mapping.

use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use super::cookie::clear_session_cookie;
use crate::common::AppError;

/// `{ "message": ..., "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            AppError::ServerError(source) => error!(error = ?source, "request failed"),
            other if status.is_client_error() => warn!(error = %other, status = status.as_u16(), "request rejected"),
            _ => {}
        }

        let body = ApiResponse::<()>::plain(self.to_string());
        let mut response = (status, Json(body)).into_response();
        if self.clears_session() {
            response
                .headers_mut()
                .insert(SET_COOKIE, clear_session_cookie());
        }
        response
    }
}
