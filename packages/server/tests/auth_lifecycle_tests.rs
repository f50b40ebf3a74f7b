//! Integration tests for the credential and session lifecycle.
//!
//! Runs every auth action against the in-memory database, cache, clock
//! and job queue from `TestDependencies`.

mod common;

use auth_core::common::{AppError, Role};
use auth_core::domains::auth::actions::{
    forgot_password, inactive_account, login, logout, oauth_login, refresh_token, register,
    register_from_admin, reset_password, send_verification, verify_account, FEDERATED_BIRTH_DATE,
};
use auth_core::domains::auth::models::TokenKind;
use auth_core::domains::auth::types::{
    InactiveAccountRequest, OAuthLoginRequest, ResetPasswordRequest, VerifyAccountRequest,
};
use auth_core::domains::auth::{Cooldown, SessionStore};
use auth_core::domains::email::{TYPE_EMAIL_FORGOT_PASSWORD, TYPE_EMAIL_VERIFICATION};
use auth_core::kernel::test_dependencies::TestDependencies;
use auth_core::kernel::BaseClock;
use chrono::Duration;
use common::{
    actor_of, admin_register_request, link_params, login_request, register_request,
    system_admin, TestHarness, NEW_PASSWORD, PASSWORD,
};
use test_context::test_context;

// ============================================================================
// Registration
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn register_creates_unverified_account_and_queues_verification(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();

    assert!(registered.verification_queued);
    assert!(!registered.user.is_verified);
    assert!(registered.user.is_active);
    assert_eq!(registered.user.role, Role::User);
    assert_eq!(registered.user.created_by, registered.user.id);
    assert_eq!(registered.detail.user_id, registered.user.id);
    assert_eq!(registered.detail.image_url, ctx.deps.policy.default_profile_image);

    let tokens = ctx
        .deps
        .db
        .live_tokens(TokenKind::Verification, registered.user.id)
        .await;
    assert_eq!(tokens.len(), 1);

    let email = ctx.last_email(TYPE_EMAIL_VERIFICATION);
    assert_eq!(email.email, "ada@example.com");
    assert_eq!(email.token, tokens[0].token.to_string());

    assert!(ctx
        .deps
        .cache
        .contains(&Cooldown::key("ada@example.com", TokenKind::Verification)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn register_rejects_live_duplicate_email(ctx: &TestHarness) {
    register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();

    let again = register(register_request("ada@example.com"), &ctx.server).await;
    assert!(matches!(again, Err(AppError::EmailAlreadyExists)));
    assert_eq!(ctx.deps.db.all_users().await.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn email_matching_is_case_sensitive(ctx: &TestHarness) {
    register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    register(register_request("Ada@example.com"), &ctx.server)
        .await
        .unwrap();

    assert_eq!(ctx.deps.db.all_users().await.len(), 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_registrations_for_one_email_create_one_account(ctx: &TestHarness) {
    let (first, second) = tokio::join!(
        register(register_request("race@example.com"), &ctx.server),
        register(register_request("race@example.com"), &ctx.server),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::EmailAlreadyExists))));
    assert_eq!(ctx.deps.db.all_users().await.len(), 1);
    assert_eq!(ctx.deps.db.all_details().await.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn register_rolls_back_everything_when_token_write_fails(ctx: &TestHarness) {
    ctx.deps.db.set_fail_token_writes(true);

    let result = register(register_request("ada@example.com"), &ctx.server).await;

    assert!(matches!(result, Err(AppError::ServerError(_))));
    assert!(ctx.deps.db.all_users().await.is_empty());
    assert!(ctx.deps.db.all_details().await.is_empty());
    assert!(ctx.deps.job_queue.jobs().is_empty());
    assert_eq!(ctx.deps.db.rollbacks(), 1);
    assert_eq!(ctx.deps.db.commits(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn register_keeps_account_when_enqueue_fails(ctx: &TestHarness) {
    ctx.deps.job_queue.set_failing(true);

    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();

    assert!(!registered.verification_queued);
    assert_eq!(ctx.deps.db.all_users().await.len(), 1);
    assert_eq!(
        ctx.deps
            .db
            .live_tokens(TokenKind::Verification, registered.user.id)
            .await
            .len(),
        1
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn register_validates_input(ctx: &TestHarness) {
    let mut short = register_request("ada@example.com");
    short.password = "short".to_string();
    assert!(matches!(
        register(short, &ctx.server).await,
        Err(AppError::InvalidRequest(_))
    ));

    let mut nameless = register_request("ada@example.com");
    nameless.full_name = "   ".to_string();
    assert!(matches!(
        register(nameless, &ctx.server).await,
        Err(AppError::InvalidRequest(_))
    ));

    assert!(ctx.deps.db.all_users().await.is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn admin_registration_is_verified_and_sends_no_email(ctx: &TestHarness) {
    let admin = system_admin();
    let registered = register_from_admin(
        admin_register_request("staff@example.com", Role::Admin),
        &admin,
        &ctx.server,
    )
    .await
    .unwrap();

    assert!(registered.user.is_verified);
    assert_eq!(registered.user.role, Role::Admin);
    assert_eq!(registered.user.created_by, admin.user_id);
    assert!(!registered.verification_queued);
    assert!(ctx.deps.job_queue.jobs().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn admin_registration_requires_admin(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    let result = register_from_admin(
        admin_register_request("other@example.com", Role::User),
        &actor_of(&grant),
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::PermissionDenied)));
}

// ============================================================================
// Login
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn login_opens_a_cache_backed_session(ctx: &TestHarness) {
    let user = ctx.verified_user("ada@example.com").await;

    let grant = login(login_request("ada@example.com", PASSWORD), &ctx.server)
        .await
        .unwrap();

    assert_eq!(grant.user.id, user.id);
    assert_eq!(grant.session.user_id, user.id);
    assert_eq!(grant.session.login_at, ctx.deps.clock.now().timestamp_millis());

    let stored = ctx
        .server
        .sessions()
        .load(grant.session.session_id)
        .await
        .unwrap();
    assert_eq!(stored, grant.session);

    let claims = ctx
        .server
        .jwt_service
        .parse(&grant.session.access_token, ctx.deps.clock.now())
        .unwrap();
    assert_eq!(claims.jti, grant.session.jti);
    assert_eq!(claims.user_id, Some(user.id));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn each_login_is_a_separate_session(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;

    let first = ctx.login_as("ada@example.com").await;
    let second = ctx.login_as("ada@example.com").await;

    assert_ne!(first.session.session_id, second.session.session_id);
    assert_ne!(first.session.jti, second.session.jti);
    assert!(ctx.server.sessions().load(first.session.session_id).await.is_ok());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn login_failures_are_distinguished(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    register(register_request("new@example.com"), &ctx.server)
        .await
        .unwrap();

    assert!(matches!(
        login(login_request("nobody@example.com", PASSWORD), &ctx.server).await,
        Err(AppError::EmailNotFound)
    ));
    assert!(matches!(
        login(login_request("ada@example.com", "wrong-password"), &ctx.server).await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(matches!(
        login(login_request("new@example.com", PASSWORD), &ctx.server).await,
        Err(AppError::Unverified)
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn login_refuses_deactivated_account(ctx: &TestHarness) {
    let user = ctx.verified_user("ada@example.com").await;
    inactive_account(
        InactiveAccountRequest { user_id: user.id },
        &system_admin(),
        &ctx.server,
    )
    .await
    .unwrap();

    assert!(matches!(
        login(login_request("ada@example.com", PASSWORD), &ctx.server).await,
        Err(AppError::AccountNotValid)
    ));
}

// ============================================================================
// Refresh and logout
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn refresh_rotates_tokens_and_keeps_the_session(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    ctx.deps.clock.advance(Duration::minutes(5));
    let refreshed = refresh_token(grant.session.session_id, &ctx.server)
        .await
        .unwrap();

    assert_eq!(refreshed.session.session_id, grant.session.session_id);
    assert_eq!(refreshed.session.login_at, grant.session.login_at);
    assert_ne!(refreshed.session.jti, grant.session.jti);
    assert_ne!(refreshed.session.access_token, grant.session.access_token);

    let stored = ctx
        .server
        .sessions()
        .load(grant.session.session_id)
        .await
        .unwrap();
    assert_eq!(stored.jti, refreshed.session.jti);
}

#[tokio::test]
async fn refresh_with_expired_refresh_token_ends_the_session() {
    // Cache entry outlives the refresh token so the token check is reached.
    let ctx = TestHarness::with(
        TestDependencies::new().policy(|p| p.session_ttl = std::time::Duration::from_secs(72 * 3600)),
    );
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    ctx.deps.clock.advance(Duration::hours(25));
    let result = refresh_token(grant.session.session_id, &ctx.server).await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
    assert!(!ctx
        .deps
        .cache
        .contains(&SessionStore::key(grant.session.session_id)));
}

#[tokio::test]
async fn expired_refresh_reports_session_expired_even_if_cleanup_fails() {
    let ctx = TestHarness::with(
        TestDependencies::new().policy(|p| p.session_ttl = std::time::Duration::from_secs(72 * 3600)),
    );
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    ctx.deps.clock.advance(Duration::hours(25));
    ctx.deps.cache.set_failing_deletes(true);
    let result = refresh_token(grant.session.session_id, &ctx.server).await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn refresh_refuses_unknown_or_corrupt_sessions(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;
    let session_id = grant.session.session_id;

    ctx.deps
        .cache
        .corrupt(&SessionStore::key(session_id), "{not json");
    assert!(matches!(
        refresh_token(session_id, &ctx.server).await,
        Err(AppError::Forbidden)
    ));

    logout(session_id, &ctx.server).await.unwrap();
    assert!(matches!(
        refresh_token(session_id, &ctx.server).await,
        Err(AppError::Forbidden)
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn refresh_refuses_deactivated_account(ctx: &TestHarness) {
    let user = ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    inactive_account(
        InactiveAccountRequest { user_id: user.id },
        &system_admin(),
        &ctx.server,
    )
    .await
    .unwrap();

    assert!(matches!(
        refresh_token(grant.session.session_id, &ctx.server).await,
        Err(AppError::Forbidden)
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn logout_is_idempotent(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    logout(grant.session.session_id, &ctx.server).await.unwrap();
    logout(grant.session.session_id, &ctx.server).await.unwrap();

    assert!(matches!(
        ctx.server.sessions().load(grant.session.session_id).await,
        Err(AppError::Forbidden)
    ));
}

// ============================================================================
// Email verification
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn verification_link_verifies_the_account_once(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    verify_account(
        VerifyAccountRequest {
            email: email.clone(),
            token: token.clone(),
        },
        &ctx.server,
    )
    .await
    .unwrap();

    let user = ctx
        .deps
        .db
        .all_users()
        .await
        .into_iter()
        .find(|u| u.id == registered.user.id)
        .unwrap();
    assert!(user.is_verified);
    assert!(ctx
        .deps
        .db
        .live_tokens(TokenKind::Verification, user.id)
        .await
        .is_empty());

    let replay = verify_account(VerifyAccountRequest { email, token }, &ctx.server).await;
    assert!(matches!(replay, Err(AppError::AlreadyVerified)));

    ctx.login_as("ada@example.com").await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn register_resend_verify_then_login(ctx: &TestHarness) {
    let mut request = register_request("alice@example.com");
    request.password = "P@ssw0rd1".to_string();
    register(request, &ctx.server).await.unwrap();

    ctx.deps.clock.advance(Duration::seconds(61));
    send_verification("alice@example.com", &ctx.server)
        .await
        .unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    verify_account(
        VerifyAccountRequest {
            email: email.clone(),
            token: token.clone(),
        },
        &ctx.server,
    )
    .await
    .unwrap();
    let grant = login(login_request("alice@example.com", "P@ssw0rd1"), &ctx.server)
        .await
        .unwrap();
    assert!(grant.user.is_verified);

    let replay = verify_account(VerifyAccountRequest { email, token }, &ctx.server).await;
    assert!(matches!(replay, Err(AppError::AlreadyVerified)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn superseded_verification_token_is_invalid_while_unverified(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, first_token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    ctx.deps.clock.advance(Duration::seconds(61));
    send_verification("ada@example.com", &ctx.server)
        .await
        .unwrap();

    for _ in 0..2 {
        let replay = verify_account(
            VerifyAccountRequest {
                email: email.clone(),
                token: first_token.clone(),
            },
            &ctx.server,
        )
        .await;
        assert!(matches!(replay, Err(AppError::TokenInvalid)));
    }

    let user = ctx.deps.db.all_users().await.pop().unwrap();
    assert!(!user.is_verified);
    assert_eq!(
        ctx.deps
            .db
            .live_tokens(TokenKind::Verification, registered.user.id)
            .await
            .len(),
        1
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verified_account_is_reported_before_the_token_is_checked(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;

    let result = verify_account(
        VerifyAccountRequest {
            email: auth_core::common::encoding::encode_url("ada@example.com"),
            token: auth_core::common::encoding::encode_url(&uuid::Uuid::new_v4().to_string()),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::AlreadyVerified)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verification_token_expires(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    ctx.deps
        .db
        .backdate_tokens(TokenKind::Verification, registered.user.id, Duration::minutes(31))
        .await;

    let result = verify_account(VerifyAccountRequest { email, token }, &ctx.server).await;
    assert!(matches!(result, Err(AppError::TokenExpired)));
    assert!(!ctx.deps.db.all_users().await[0].is_verified);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verification_token_is_valid_up_to_its_deadline(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    ctx.deps
        .db
        .backdate_tokens(TokenKind::Verification, registered.user.id, Duration::minutes(30))
        .await;

    verify_account(VerifyAccountRequest { email, token }, &ctx.server)
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn resending_verification_waits_for_cooldown_and_replaces_the_token(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, stale_token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    assert!(matches!(
        send_verification("ada@example.com", &ctx.server).await,
        Err(AppError::TokenAlreadyExists)
    ));

    ctx.deps.clock.advance(Duration::seconds(61));
    send_verification("ada@example.com", &ctx.server)
        .await
        .unwrap();

    assert_eq!(ctx.deps.job_queue.jobs_of(TYPE_EMAIL_VERIFICATION).len(), 2);
    let live = ctx
        .deps
        .db
        .live_tokens(TokenKind::Verification, registered.user.id)
        .await;
    assert_eq!(live.len(), 1);

    let stale = verify_account(
        VerifyAccountRequest {
            email: email.clone(),
            token: stale_token,
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(stale, Err(AppError::TokenInvalid)));

    let (_, fresh_token) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));
    verify_account(
        VerifyAccountRequest {
            email,
            token: fresh_token,
        },
        &ctx.server,
    )
    .await
    .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn send_verification_rejects_ineligible_accounts(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    ctx.federated_login("fed@example.com").await;

    assert!(matches!(
        send_verification("nobody@example.com", &ctx.server).await,
        Err(AppError::EmailNotFound)
    ));
    assert!(matches!(
        send_verification("fed@example.com", &ctx.server).await,
        Err(AppError::EmailNotFound)
    ));
    assert!(matches!(
        send_verification("ada@example.com", &ctx.server).await,
        Err(AppError::AlreadyVerified)
    ));
    assert!(ctx.deps.job_queue.jobs().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn corrupt_cooldown_marker_does_not_block_resend(ctx: &TestHarness) {
    register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    ctx.deps.cache.corrupt(
        &Cooldown::key("ada@example.com", TokenKind::Verification),
        "garbage",
    );

    send_verification("ada@example.com", &ctx.server)
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn send_verification_reports_enqueue_failure(ctx: &TestHarness) {
    let registered = register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    ctx.deps.clock.advance(Duration::seconds(61));
    ctx.deps.job_queue.set_failing(true);

    let result = send_verification("ada@example.com", &ctx.server).await;

    assert!(matches!(result, Err(AppError::ServerError(_))));
    // The new token is committed before the enqueue is attempted.
    assert_eq!(
        ctx.deps
            .db
            .live_tokens(TokenKind::Verification, registered.user.id)
            .await
            .len(),
        1
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn malformed_links_are_rejected(ctx: &TestHarness) {
    register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();
    let (email, _) = link_params(&ctx.last_email(TYPE_EMAIL_VERIFICATION));

    let result = verify_account(
        VerifyAccountRequest {
            email,
            token: "%%not-base64".to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::TokenInvalid)));
}

// ============================================================================
// Password reset
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn forgot_and_reset_password_replaces_the_credential(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;

    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_FORGOT_PASSWORD));

    reset_password(
        ResetPasswordRequest {
            email: email.clone(),
            token: token.clone(),
            password: NEW_PASSWORD.to_string(),
        },
        &ctx.server,
    )
    .await
    .unwrap();

    assert!(matches!(
        login(login_request("ada@example.com", PASSWORD), &ctx.server).await,
        Err(AppError::InvalidCredentials)
    ));
    login(login_request("ada@example.com", NEW_PASSWORD), &ctx.server)
        .await
        .unwrap();

    let replay = reset_password(
        ResetPasswordRequest {
            email,
            token,
            password: "third-password-123".to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(replay, Err(AppError::TokenInvalid)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reset_with_tampered_token_keeps_the_old_password(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;
    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    let (email, _) = link_params(&ctx.last_email(TYPE_EMAIL_FORGOT_PASSWORD));
    let tampered = auth_core::common::encoding::encode_url(&uuid::Uuid::new_v4().to_string());

    let result = reset_password(
        ResetPasswordRequest {
            email,
            token: tampered,
            password: NEW_PASSWORD.to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::TokenInvalid)));
    ctx.login_as("ada@example.com").await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reset_token_expires(ctx: &TestHarness) {
    let user = ctx.verified_user("ada@example.com").await;
    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_FORGOT_PASSWORD));

    ctx.deps
        .db
        .backdate_tokens(TokenKind::Reset, user.id, Duration::minutes(16))
        .await;

    let result = reset_password(
        ResetPasswordRequest {
            email,
            token,
            password: NEW_PASSWORD.to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::TokenExpired)));
    ctx.login_as("ada@example.com").await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reset_rejects_short_password_before_touching_tokens(ctx: &TestHarness) {
    let user = ctx.verified_user("ada@example.com").await;
    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    let (email, token) = link_params(&ctx.last_email(TYPE_EMAIL_FORGOT_PASSWORD));

    let result = reset_password(
        ResetPasswordRequest {
            email,
            token,
            password: "short".to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    assert_eq!(
        ctx.deps.db.live_tokens(TokenKind::Reset, user.id).await.len(),
        1
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn forgot_password_has_its_own_cooldown(ctx: &TestHarness) {
    register(register_request("ada@example.com"), &ctx.server)
        .await
        .unwrap();

    // The verification cooldown from registration does not block a reset.
    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    assert!(matches!(
        forgot_password("ada@example.com", &ctx.server).await,
        Err(AppError::TokenAlreadyExists)
    ));

    ctx.deps.clock.advance(Duration::seconds(61));
    forgot_password("ada@example.com", &ctx.server).await.unwrap();
    assert_eq!(ctx.deps.job_queue.jobs_of(TYPE_EMAIL_FORGOT_PASSWORD).len(), 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn forgot_password_ignores_federated_accounts(ctx: &TestHarness) {
    ctx.federated_login("fed@example.com").await;

    assert!(matches!(
        forgot_password("fed@example.com", &ctx.server).await,
        Err(AppError::EmailNotFound)
    ));
}

// ============================================================================
// OAuth
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn oauth_login_provisions_then_reuses_a_federated_account(ctx: &TestHarness) {
    let first = oauth_login(ctx.id_token("fed@example.com", "Fed User"), &ctx.server)
        .await
        .unwrap();
    assert!(first.user.is_oauth);
    assert!(first.user.is_verified);
    assert!(first.user.password_hash.is_empty());

    let detail = ctx.deps.db.all_details().await.pop().unwrap();
    assert_eq!(detail.full_name, "Fed User");
    assert_eq!(detail.birth_date, FEDERATED_BIRTH_DATE);

    let second = oauth_login(ctx.id_token("fed@example.com", "Fed User"), &ctx.server)
        .await
        .unwrap();
    assert_eq!(second.user.id, first.user.id);
    assert_ne!(second.session.session_id, first.session.session_id);
    assert_eq!(ctx.deps.db.all_users().await.len(), 1);

    assert!(matches!(
        login(login_request("fed@example.com", ""), &ctx.server).await,
        Err(AppError::EmailNotFound)
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn oauth_login_does_not_take_over_password_accounts(ctx: &TestHarness) {
    ctx.verified_user("ada@example.com").await;

    let result = oauth_login(ctx.id_token("ada@example.com", "Impostor"), &ctx.server).await;
    assert!(matches!(result, Err(AppError::EmailAlreadyExists)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn oauth_login_rejects_tokens_the_provider_did_not_issue(ctx: &TestHarness) {
    let victim = ctx.federated_login("victim@example.com").await;

    let result = oauth_login(
        OAuthLoginRequest {
            id_token: r#"{"email":"victim@example.com","name":"attacker"}"#.to_string(),
        },
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::TokenInvalid)));

    assert_eq!(ctx.deps.db.all_users().await.len(), 1);
    assert_eq!(victim.user.email, "victim@example.com");
}

// ============================================================================
// Deactivation
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn only_admins_deactivate_accounts(ctx: &TestHarness) {
    let target = ctx.verified_user("target@example.com").await;
    ctx.verified_user("ada@example.com").await;
    let grant = ctx.login_as("ada@example.com").await;

    let result = inactive_account(
        InactiveAccountRequest { user_id: target.id },
        &actor_of(&grant),
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::PermissionDenied)));
    ctx.login_as("target@example.com").await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn admin_deactivating_themself_is_logged_out(ctx: &TestHarness) {
    let admin = ctx.account("root@example.com", Role::Admin).await;
    let grant = ctx.login_as("root@example.com").await;

    inactive_account(
        InactiveAccountRequest { user_id: admin.id },
        &actor_of(&grant),
        &ctx.server,
    )
    .await
    .unwrap();

    assert!(!ctx
        .deps
        .cache
        .contains(&SessionStore::key(grant.session.session_id)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn deactivating_unknown_user_is_not_found(ctx: &TestHarness) {
    let result = inactive_account(
        InactiveAccountRequest {
            user_id: auth_core::common::UserId::new(),
        },
        &system_admin(),
        &ctx.server,
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound("user"))));
}
