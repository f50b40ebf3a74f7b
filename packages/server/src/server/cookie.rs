//! The `session_id` cookie that carries the opaque session id between requests.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

use crate::common::SessionId;

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Cookie value for a live session. `max_age_secs` should match the session TTL.
pub fn session_cookie(session_id: SessionId, max_age_secs: u64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={session_id}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    )
}

/// Expire the cookie immediately.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_id=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// `None` when the cookie is missing or does not hold a valid id.
pub fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .find_map(|part| {
            part.trim()
                .strip_prefix(SESSION_COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_session_among_other_cookies() {
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session_id={id}; lang=en")).unwrap(),
        );
        assert_eq!(extract_session_id(&headers), Some(id));
    }

    #[test]
    fn test_ignores_similarly_named_and_malformed_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session_id_old=abc; session_id=nope"));
        assert_eq!(extract_session_id(&headers), None);
        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_flags() {
        let id = SessionId::new();
        let cookie = session_cookie(id, 86400, true);
        assert!(cookie.starts_with(&format!("session_id={id};")));
        assert!(cookie.contains("HttpOnly; Secure"));
        assert!(cookie.ends_with("Max-Age=86400"));
        assert!(!session_cookie(id, 60, false).contains("Secure"));
    }
}
