use chrono::Duration;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Barrier;

use account_tokens::auth::{
    is_well_formed_token, AuthDependencies, AuthService, BcryptPasswordHasher, SecureTokenGenerator,
};
use account_tokens::clock::{Clock, ManualClock};
use account_tokens::configuration::{JwtSettings, TokenSettings};
use account_tokens::error::{AppError, AuthError};
use account_tokens::notifier::{RecordingNotifier, TemplateKind};
use account_tokens::store::{CredentialStore, InMemoryCredentialStore};

const EMAIL: &str = "ana@example.com";
const PASSWORD: &str = "Initial-Pass-1";

pub struct TestService {
    pub service: Arc<AuthService>,
    pub store: Arc<InMemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestService {
    fn verification_token(&self) -> String {
        self.notifier
            .last_token(TemplateKind::EmailVerification, EMAIL)
            .expect("No verification email recorded")
    }

    fn reset_token(&self) -> String {
        self.notifier
            .last_token(TemplateKind::PasswordReset, EMAIL)
            .expect("No reset email recorded")
    }

    async fn register(&self) {
        self.service
            .register(EMAIL, PASSWORD, "Ana Perez")
            .await
            .expect("Failed to register");
    }

    async fn register_verified(&self) {
        self.register().await;
        self.service
            .verify_email(&self.verification_token())
            .await
            .expect("Failed to verify");
    }
}

fn spawn_service() -> TestService {
    let store = Arc::new(InMemoryCredentialStore::new());
    let clock = Arc::new(ManualClock::default());
    let notifier = Arc::new(RecordingNotifier::new());

    let deps = AuthDependencies {
        store: store.clone(),
        hasher: Arc::new(BcryptPasswordHasher::new(4)),
        generator: Arc::new(SecureTokenGenerator),
        clock: clock.clone(),
        notifier: notifier.clone(),
    };
    let jwt = JwtSettings {
        secret: "test-secret-key-at-least-32-characters-long".to_string(),
        access_token_expiry: 86_400,
        refresh_token_expiry: 2_592_000,
        issuer: "test".to_string(),
    };
    let service = AuthService::new(deps, "http://localhost:8000", TokenSettings::default(), jwt)
        .expect("Failed to build service");

    TestService {
        service: Arc::new(service),
        store,
        clock,
        notifier,
    }
}

fn assert_auth_err<T: std::fmt::Debug>(result: Result<T, AppError>, expected: AuthError) {
    let err = result.expect_err("Expected an error");
    assert_eq!(err.auth_kind(), Some(expected), "got {:?}", err);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifications_of_one_token_succeed_exactly_once() {
    let app = spawn_service();
    app.register().await;
    let token = app.verification_token();

    let barrier = Arc::new(Barrier::new(3));
    let attempts = (0..3).map(|_| {
        let service = app.service.clone();
        let barrier = barrier.clone();
        let token = token.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            service.verify_email(&token).await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for failure in results.into_iter().filter(|r| r.is_err()) {
        assert_auth_err(failure, AuthError::InvalidOrExpiredToken);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resets_of_one_token_succeed_exactly_once() {
    let app = spawn_service();
    app.register_verified().await;
    app.service.forgot_password(EMAIL).await.unwrap();
    let token = app.reset_token();

    let barrier = Arc::new(Barrier::new(3));
    let attempts = (0..3).map(|i| {
        let service = app.service.clone();
        let barrier = barrier.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let password = format!("Replacement-Pass-{}", i);
            barrier.wait().await;
            let result = service.reset_password(&token, &password).await;
            (password, result)
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    for (_, result) in results.iter().filter(|(_, r)| r.is_err()) {
        assert_eq!(
            result.as_ref().unwrap_err().auth_kind(),
            Some(AuthError::InvalidOrExpiredToken)
        );
    }

    // Only the winner's password took effect
    let winning_password = &winners[0].0;
    assert!(app.service.login(EMAIL, winning_password).await.is_ok());
    assert_auth_err(app.service.login(EMAIL, PASSWORD).await, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn expired_verification_token_is_rejected_on_exact_match() {
    let app = spawn_service();
    app.register().await;
    let token = app.verification_token();

    app.clock.advance(Duration::hours(24));

    assert_auth_err(app.service.verify_email(&token).await, AuthError::InvalidOrExpiredToken);
    let account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    assert!(!account.email_verified);
}

#[tokio::test]
async fn expired_reset_token_is_rejected_on_exact_match() {
    let app = spawn_service();
    app.register_verified().await;
    app.service.forgot_password(EMAIL).await.unwrap();
    let token = app.reset_token();

    app.clock.advance(Duration::minutes(61));

    assert_auth_err(
        app.service.reset_password(&token, "Replacement-Pass-1").await,
        AuthError::InvalidOrExpiredToken,
    );
    assert!(app.service.login(EMAIL, PASSWORD).await.is_ok());
}

#[tokio::test]
async fn token_just_before_expiry_is_still_accepted() {
    let app = spawn_service();
    app.register().await;
    let token = app.verification_token();

    app.clock.advance(Duration::hours(24) - Duration::seconds(1));

    assert!(app.service.verify_email(&token).await.is_ok());
}

#[tokio::test]
async fn resending_verification_kills_the_previous_token() {
    let app = spawn_service();
    app.register().await;
    let first = app.verification_token();

    app.service.resend_verification(EMAIL).await.unwrap();
    let second = app.verification_token();
    assert_ne!(first, second);

    assert_auth_err(app.service.verify_email(&first).await, AuthError::InvalidOrExpiredToken);
    assert!(app.service.verify_email(&second).await.is_ok());
}

#[tokio::test]
async fn resend_for_verified_or_unknown_account_is_refused() {
    let app = spawn_service();
    app.register_verified().await;

    assert_auth_err(app.service.resend_verification(EMAIL).await, AuthError::AlreadyVerified);
    assert_auth_err(
        app.service.resend_verification("nobody@example.com").await,
        AuthError::AccountNotFound,
    );
}

#[tokio::test]
async fn second_reset_request_waits_for_consumption() {
    let app = spawn_service();
    app.register_verified().await;

    app.service.forgot_password(EMAIL).await.unwrap();
    let first = app.reset_token();
    assert_auth_err(app.service.forgot_password(EMAIL).await, AuthError::TokenAlreadyActive);

    app.service.reset_password(&first, "Replacement-Pass-1").await.unwrap();

    app.service.forgot_password(EMAIL).await.unwrap();
    assert_ne!(app.reset_token(), first);
}

#[tokio::test]
async fn second_reset_request_waits_for_expiry() {
    let app = spawn_service();
    app.register_verified().await;

    app.service.forgot_password(EMAIL).await.unwrap();
    let first = app.reset_token();

    app.clock.advance(Duration::minutes(59));
    assert_auth_err(app.service.forgot_password(EMAIL).await, AuthError::TokenAlreadyActive);

    app.clock.advance(Duration::minutes(1));
    app.service.forgot_password(EMAIL).await.unwrap();
    let second = app.reset_token();
    assert_ne!(first, second);
    assert!(app.service.reset_password(&second, "Replacement-Pass-1").await.is_ok());
}

#[tokio::test]
async fn unverified_account_cannot_request_reset() {
    let app = spawn_service();
    app.register().await;

    assert_auth_err(app.service.forgot_password(EMAIL).await, AuthError::AccountNotEligible);
    assert!(app.notifier.last(TemplateKind::PasswordReset, EMAIL).is_none());
}

#[tokio::test]
async fn unknown_email_reset_request_is_silent() {
    let app = spawn_service();

    app.service.forgot_password("nobody@example.com").await.unwrap();
    assert!(app.notifier.deliveries().is_empty());
}

#[tokio::test]
async fn verifying_twice_fails_the_second_time() {
    let app = spawn_service();
    app.register().await;
    let token = app.verification_token();
    assert!(is_well_formed_token(&token));

    let account = app.service.verify_email(&token).await.unwrap();
    assert!(account.email_verified);

    assert_auth_err(app.service.verify_email(&token).await, AuthError::InvalidOrExpiredToken);
}

#[tokio::test]
async fn malformed_tokens_are_rejected_by_format() {
    let app = spawn_service();

    assert_auth_err(app.service.verify_email("not-a-token").await, AuthError::InvalidTokenFormat);
    assert_auth_err(
        app.service.reset_password("short", "Replacement-Pass-1").await,
        AuthError::InvalidTokenFormat,
    );
    // Well formed but never issued
    assert_auth_err(
        app.service.verify_email(&"0".repeat(64)).await,
        AuthError::InvalidOrExpiredToken,
    );
}

#[tokio::test]
async fn login_requires_verified_email() {
    let app = spawn_service();
    app.register().await;

    assert_auth_err(app.service.login(EMAIL, PASSWORD).await, AuthError::EmailNotVerified);
    assert_auth_err(
        app.service.login(EMAIL, "Wrong-Pass-123").await,
        AuthError::InvalidCredentials,
    );

    app.service.verify_email(&app.verification_token()).await.unwrap();

    let pair = app.service.login(EMAIL, PASSWORD).await.unwrap();
    assert_ne!(pair.access_token, pair.refresh_token);
    assert_eq!(pair.expires_in, 86_400);
    assert_eq!(pair.token_type, "Bearer");

    let account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    assert_eq!(account.last_login, Some(app.clock.now()));
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() {
    let app = spawn_service();
    app.register_verified().await;

    let mut account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    account.active = false;
    app.store.put_account(account).unwrap();

    assert_auth_err(app.service.login(EMAIL, PASSWORD).await, AuthError::AccountInactive);
}

#[tokio::test]
async fn delivery_failure_does_not_undo_issuance() {
    let app = spawn_service();
    app.notifier.set_failing(true);

    app.register().await;

    let account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    assert!(account.has_live_verification_token(app.clock.now()));
    let token = account.email_token.clone().unwrap();

    app.notifier.set_failing(false);
    assert!(app.service.verify_email(&token).await.is_ok());
}

#[tokio::test]
async fn duplicate_registration_is_rejected_case_insensitively() {
    let app = spawn_service();
    app.register().await;

    let err = app
        .service
        .register("ANA@Example.com", PASSWORD, "Someone Else")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Database(account_tokens::error::DatabaseError::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
async fn register_verify_reset_login_end_to_end() {
    let app = spawn_service();

    app.register().await;
    let t1 = app.verification_token();
    assert_eq!(t1.len(), 64);
    assert!(t1.chars().all(|c| c.is_ascii_hexdigit()));

    app.service.verify_email(&t1).await.unwrap();
    let account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    assert!(account.email_verified);
    assert!(account.active);
    assert!(account.email_token.is_none());
    assert!(account.email_token_expires.is_none());
    assert!(app.notifier.last(TemplateKind::Welcome, EMAIL).is_some());

    app.service.forgot_password(EMAIL).await.unwrap();
    let t2 = app.reset_token();
    let link = app.notifier.last(TemplateKind::PasswordReset, EMAIL).unwrap().payload.url.unwrap();
    assert_eq!(link, format!("http://localhost:8000/reset-password?token={}", t2));

    let new_password = "Brand-New-Pass-2";
    app.service.reset_password(&t2, new_password).await.unwrap();
    let account = app.store.get_account_by_email(EMAIL).await.unwrap().unwrap();
    assert!(account.password_reset_token.is_none());
    assert!(account.password_reset_expires.is_none());
    assert_eq!(account.last_password_change, Some(app.clock.now()));
    assert!(app.notifier.last(TemplateKind::PasswordChanged, EMAIL).is_some());

    assert!(app.service.login(EMAIL, new_password).await.is_ok());
    assert_auth_err(app.service.login(EMAIL, PASSWORD).await, AuthError::InvalidCredentials);

    assert_auth_err(
        app.service.reset_password(&t2, "Another-Pass-3").await,
        AuthError::InvalidOrExpiredToken,
    );
}
