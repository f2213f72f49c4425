/// Account Authentication Service
///
/// The operations exposed to callers (HTTP handlers, tests). Each one
/// validates input, drives the token lifecycle or the session issuer, and
/// hands freshly issued tokens to the notifier.

use std::sync::Arc;
use uuid::Uuid;

use crate::account::{Account, NewAccount};
use crate::auth::lifecycle::TokenLifecycleManager;
use crate::auth::password::PasswordHasher;
use crate::auth::session::{SessionIssuer, SessionTokenPair};
use crate::auth::token_generator::{is_well_formed_token, TokenGenerator};
use crate::clock::Clock;
use crate::configuration::{JwtSettings, TokenSettings};
use crate::error::{AppError, AuthError};
use crate::notifier::{NotificationPayload, Notifier, TemplateKind};
use crate::store::CredentialStore;
use crate::validators::{normalize_email, validate_full_name};

/// The pluggable capabilities an `AuthService` is assembled from
#[derive(Clone)]
pub struct AuthDependencies {
    pub store: Arc<dyn CredentialStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub generator: Arc<dyn TokenGenerator>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    lifecycle: TokenLifecycleManager,
    sessions: SessionIssuer,
    base_url: String,
}

impl AuthService {
    pub fn new(
        deps: AuthDependencies,
        base_url: &str,
        tokens: TokenSettings,
        jwt: JwtSettings,
    ) -> Result<Self, AppError> {
        let lifecycle = TokenLifecycleManager::new(
            deps.store.clone(),
            deps.generator,
            deps.clock.clone(),
            tokens,
        );
        let sessions = SessionIssuer::new(
            deps.store.clone(),
            deps.hasher.clone(),
            deps.clock.clone(),
            jwt,
        )?;

        Ok(Self {
            store: deps.store,
            hasher: deps.hasher,
            clock: deps.clock,
            notifier: deps.notifier,
            lifecycle,
            sessions,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Creates an unverified account and emails it a verification link.
    ///
    /// A duplicate email surfaces as `DatabaseError::UniqueConstraintViolation`,
    /// which renders as a generic conflict.
    #[tracing::instrument(name = "Register account", skip_all)]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email)?;
        let full_name = validate_full_name(full_name)?;
        let password_hash = self.hasher.hash(password)?;

        let account = self
            .store
            .create_account(
                NewAccount {
                    email,
                    full_name,
                    password_hash,
                },
                self.clock.now(),
            )
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");

        let issued = self.lifecycle.issue_verification_token(account.id).await?;
        let link = self.link("verify-email", &issued.token);
        self.notify(TemplateKind::EmailVerification, &issued.account, Some(link))
            .await;

        Ok(account)
    }

    /// Consumes a verification token. Returns the now verified account.
    pub async fn verify_email(&self, token: &str) -> Result<Account, AppError> {
        let account_id = self.lifecycle.consume_verification_token(token).await?;
        let account = self.load(account_id).await?;

        self.notify(TemplateKind::Welcome, &account, None).await;
        Ok(account)
    }

    /// Issues a fresh verification token, killing the previous one.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;
        let account = self
            .store
            .get_account_by_email(&email)
            .await?
            .ok_or(AppError::Auth(AuthError::AccountNotFound))?;

        let issued = self.lifecycle.issue_verification_token(account.id).await?;
        let link = self.link("verify-email", &issued.token);
        self.notify(TemplateKind::EmailVerification, &issued.account, Some(link))
            .await;

        Ok(())
    }

    /// Starts a password reset. An unknown email succeeds silently.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;

        if let Some(issued) = self.lifecycle.issue_reset_token(&email).await? {
            let link = self.link("reset-password", &issued.token);
            self.notify(TemplateKind::PasswordReset, &issued.account, Some(link))
                .await;
        }

        Ok(())
    }

    /// Consumes a reset token and installs the new password in the same write.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        // Cheap rejection before paying for a hash
        if !is_well_formed_token(token) {
            return Err(AppError::Auth(AuthError::InvalidTokenFormat));
        }
        let password_hash = self.hasher.hash(new_password)?;

        let account_id = self
            .lifecycle
            .consume_reset_token(token, &password_hash)
            .await?;

        let account = self.load(account_id).await?;
        self.notify(TemplateKind::PasswordChanged, &account, None).await;

        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokenPair, AppError> {
        let (_, pair) = self.sessions.authenticate(email, password).await?;
        Ok(pair)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokenPair, AppError> {
        self.sessions.refresh(refresh_token).await
    }

    pub async fn current_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.load(account_id).await
    }

    async fn load(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.store
            .get_account_by_id(account_id)
            .await?
            .ok_or(AppError::Auth(AuthError::AccountNotFound))
    }

    fn link(&self, path: &str, token: &str) -> String {
        format!("{}/{}?token={}", self.base_url, path, token)
    }

    async fn notify(&self, kind: TemplateKind, account: &Account, url: Option<String>) {
        let payload = NotificationPayload {
            full_name: account.full_name.clone(),
            email: account.email.clone(),
            url,
        };

        match self.notifier.send(kind, &account.email, &payload).await {
            Ok(()) => {
                tracing::info!(account_id = %account.id, template = ?kind, "Notification sent")
            }
            Err(e) => tracing::warn!(
                account_id = %account.id,
                template = ?kind,
                error = %e,
                "Notification delivery failed"
            ),
        }
    }
}
