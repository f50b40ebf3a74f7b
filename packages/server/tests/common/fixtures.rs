//! Request builders and well-known values shared by the integration tests.

use auth_core::common::encoding::encode_url;
use auth_core::common::{Role, SessionId, Sex, UserId};
use auth_core::domains::auth::types::{
    AdminRegisterRequest, LoginRequest, RegisterRequest, SessionGrant,
};
use auth_core::domains::auth::Actor;
use auth_core::domains::email::EmailPayload;
use chrono::NaiveDate;

pub const PASSWORD: &str = "correct-horse-battery";
pub const NEW_PASSWORD: &str = "staple-lantern-ocean";

pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        full_name: "Ada Lovelace".to_string(),
        sex: Sex::Female,
        birth_date: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
        phone_number: None,
        image_url: None,
    }
}

pub fn admin_register_request(email: &str, role: Role) -> AdminRegisterRequest {
    AdminRegisterRequest {
        user: register_request(email),
        role,
    }
}

pub fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// An admin with no backing account, for seeding data.
pub fn system_admin() -> Actor {
    Actor {
        user_id: UserId::new(),
        role: Role::Admin,
        session_id: SessionId::new(),
    }
}

pub fn actor_of(grant: &SessionGrant) -> Actor {
    Actor {
        user_id: grant.user.id,
        role: grant.user.role,
        session_id: grant.session.session_id,
    }
}

/// The `(email, token)` link parameters an email job would carry.
pub fn link_params(payload: &EmailPayload) -> (String, String) {
    (encode_url(&payload.email), encode_url(&payload.token))
}
