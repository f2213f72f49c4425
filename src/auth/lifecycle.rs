/// Token Lifecycle
///
/// Issues and consumes the two single-use email tokens. Per account each
/// token slot moves through
///
/// ```text
/// None --issue--> Live --consume (before expiry)--> None
///                  |  \--issue (verification only)--> Live'   (old value dead)
///                  \--clock passes expires_at--> Expired --issue--> Live'
/// ```
///
/// Consumption is delegated to one atomic conditional write in the
/// credential store; nothing here reads a token and then writes it back.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::account::{Account, TokenKind};
use crate::auth::token_generator::{is_well_formed_token, TokenGenerator};
use crate::clock::Clock;
use crate::configuration::TokenSettings;
use crate::error::{AppError, AuthError};
use crate::store::{Consumption, CredentialStore};

/// A freshly stored token, ready to be handed to the notifier
pub struct IssuedToken {
    pub account: Account,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("account_id", &self.account.id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    settings: TokenSettings,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
            settings,
        }
    }

    /// Issues a verification token, superseding any previous one.
    ///
    /// # Errors
    /// - `AccountNotFound` if the account does not exist
    /// - `AlreadyVerified` if the email is verified, including when
    ///   verification lands between the read and the write
    /// - `EntropyUnavailable` if no token could be generated; nothing is stored
    #[tracing::instrument(name = "Issue verification token", skip(self))]
    pub async fn issue_verification_token(
        &self,
        account_id: Uuid,
    ) -> Result<IssuedToken, AppError> {
        let account = self
            .store
            .get_account_by_id(account_id)
            .await?
            .ok_or(AppError::Auth(AuthError::AccountNotFound))?;

        if account.email_verified {
            return Err(AppError::Auth(AuthError::AlreadyVerified));
        }

        let token = self.generator.generate()?;
        let now = self.clock.now();
        let expires_at = now + self.settings.verification_ttl();

        let written = self
            .store
            .issue_token(account_id, TokenKind::Verification, &token, expires_at, now)
            .await?;
        if !written {
            return Err(AppError::Auth(AuthError::AlreadyVerified));
        }

        tracing::info!(
            account_id = %account_id,
            expires_at = %expires_at,
            "Verification token issued"
        );

        Ok(IssuedToken {
            account,
            token,
            expires_at,
        })
    }

    /// Consumes a verification token and marks the owning account verified.
    pub async fn consume_verification_token(&self, presented: &str) -> Result<Uuid, AppError> {
        self.consume(Consumption::VerifyEmail, presented).await
    }

    /// Issues a password reset token for the account registered under `email`.
    ///
    /// `Ok(None)` for an unknown email, so the caller can answer generically.
    ///
    /// # Errors
    /// - `AccountNotEligible` if the email is not verified
    /// - `TokenAlreadyActive` if a live reset token exists (also when a
    ///   concurrent request stored one first)
    #[tracing::instrument(name = "Issue reset token", skip_all)]
    pub async fn issue_reset_token(&self, email: &str) -> Result<Option<IssuedToken>, AppError> {
        let Some(account) = self.store.get_account_by_email(email).await? else {
            tracing::info!("Reset requested for unknown email");
            return Ok(None);
        };

        if !account.email_verified {
            return Err(AppError::Auth(AuthError::AccountNotEligible));
        }

        let now = self.clock.now();
        if account.has_live_reset_token(now) {
            return Err(AppError::Auth(AuthError::TokenAlreadyActive));
        }

        let token = self.generator.generate()?;
        let expires_at = now + self.settings.reset_ttl();

        let written = self
            .store
            .issue_token(account.id, TokenKind::Reset, &token, expires_at, now)
            .await?;
        if !written {
            return Err(AppError::Auth(AuthError::TokenAlreadyActive));
        }

        tracing::info!(account_id = %account.id, expires_at = %expires_at, "Reset token issued");

        Ok(Some(IssuedToken {
            account,
            token,
            expires_at,
        }))
    }

    /// Consumes a reset token and stores `new_password_hash` in the same write.
    pub async fn consume_reset_token(
        &self,
        presented: &str,
        new_password_hash: &str,
    ) -> Result<Uuid, AppError> {
        self.consume(Consumption::ResetPassword { new_password_hash }, presented)
            .await
    }

    async fn consume(
        &self,
        consumption: Consumption<'_>,
        presented: &str,
    ) -> Result<Uuid, AppError> {
        if !is_well_formed_token(presented) {
            return Err(AppError::Auth(AuthError::InvalidTokenFormat));
        }
        let presented = presented.to_ascii_lowercase();
        let now = self.clock.now();

        match self.store.consume_token(consumption, &presented, now).await? {
            Some(account_id) => {
                tracing::info!(
                    account_id = %account_id,
                    kind = %consumption.kind(),
                    "Token consumed"
                );
                Ok(account_id)
            }
            None => {
                tracing::warn!(kind = %consumption.kind(), "Token rejected");
                Err(AppError::Auth(AuthError::InvalidOrExpiredToken))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use crate::clock::ManualClock;
    use crate::store::InMemoryCredentialStore;
    use chrono::Duration;

    struct FailingGenerator;

    impl TokenGenerator for FailingGenerator {
        fn generate(&self) -> Result<String, AppError> {
            Err(AppError::Auth(AuthError::EntropyUnavailable))
        }
    }

    async fn setup(
        generator: Arc<dyn TokenGenerator>,
    ) -> (TokenLifecycleManager, Arc<InMemoryCredentialStore>, Arc<ManualClock>, Account) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::default());
        let account = store
            .create_account(
                NewAccount {
                    email: "ana@example.com".to_string(),
                    full_name: "Ana Perez".to_string(),
                    password_hash: "hash".to_string(),
                },
                clock.now(),
            )
            .await
            .unwrap();
        let manager = TokenLifecycleManager::new(
            store.clone(),
            generator,
            clock.clone(),
            TokenSettings::default(),
        );
        (manager, store, clock, account)
    }

    #[tokio::test]
    async fn verification_token_expires_after_a_day() {
        let (manager, _, clock, account) =
            setup(Arc::new(crate::auth::SecureTokenGenerator)).await;

        let issued = manager.issue_verification_token(account.id).await.unwrap();
        assert_eq!(issued.expires_at, clock.now() + Duration::hours(24));
        assert_eq!(issued.token.len(), 64);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (manager, ..) = setup(Arc::new(crate::auth::SecureTokenGenerator)).await;

        let err = manager.issue_verification_token(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::AccountNotFound));
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_lookup() {
        let (manager, ..) = setup(Arc::new(crate::auth::SecureTokenGenerator)).await;

        let not_hex = "z".repeat(64);
        for bad in ["", "abc", not_hex.as_str()] {
            let err = manager.consume_verification_token(bad).await.unwrap_err();
            assert_eq!(err.auth_kind(), Some(AuthError::InvalidTokenFormat));
        }
    }

    #[tokio::test]
    async fn uppercase_presentation_matches() {
        let (manager, _, _, account) = setup(Arc::new(crate::auth::SecureTokenGenerator)).await;
        let issued = manager.issue_verification_token(account.id).await.unwrap();

        let consumed = manager
            .consume_verification_token(&issued.token.to_ascii_uppercase())
            .await
            .unwrap();
        assert_eq!(consumed, account.id);
    }

    #[tokio::test]
    async fn entropy_failure_stores_nothing() {
        let (manager, store, clock, account) = setup(Arc::new(FailingGenerator)).await;

        let err = manager.issue_verification_token(account.id).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::EntropyUnavailable));

        let stored = store.get_account_by_id(account.id).await.unwrap().unwrap();
        assert!(!stored.has_live_verification_token(clock.now()));
    }

    #[tokio::test]
    async fn reset_requires_verified_email() {
        let (manager, ..) = setup(Arc::new(crate::auth::SecureTokenGenerator)).await;

        let err = manager.issue_reset_token("ana@example.com").await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthError::AccountNotEligible));
        assert!(manager.issue_reset_token("nobody@example.com").await.unwrap().is_none());
    }
}
