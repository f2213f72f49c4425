/// Session Issuer
///
/// Turns a correct password into a signed access/refresh JWT pair. Only
/// verified, active accounts get a session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::account::Account;
use crate::auth::claims::TokenUse;
use crate::auth::jwt::{sign_token, validate_token};
use crate::auth::password::PasswordHasher;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::CredentialStore;

/// Verified against when the email is unknown, so a miss costs as much as a hit
const DUMMY_PASSWORD: &str = "Timing-Equaliser-0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    jwt: JwtSettings,
    dummy_hash: String,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        jwt: JwtSettings,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            clock,
            jwt,
            dummy_hash,
        })
    }

    /// # Errors
    /// - `InvalidCredentials` for an unknown email or a wrong password
    /// - `EmailNotVerified` when the password is right but the email is not verified
    /// - `AccountInactive` when the account has been deactivated
    #[tracing::instrument(name = "Authenticate", skip_all)]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, SessionTokenPair), AppError> {
        let email = email.trim().to_lowercase();

        let Some(account) = self.store.get_account_by_email(&email).await? else {
            let _ = self.hasher.verify(password, &self.dummy_hash);
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        };

        if !self.hasher.verify(password, &account.password_hash)? {
            tracing::warn!(account_id = %account.id, "Wrong password");
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }

        ensure_may_hold_session(&account)?;

        let now = self.clock.now();
        self.store.update_last_login(account.id, now).await?;
        let pair = self.mint(&account, now)?;

        tracing::info!(account_id = %account.id, "Session issued");

        let mut account = account;
        account.last_login = Some(now);
        Ok((account, pair))
    }

    /// Exchanges a refresh token for a fresh pair. The account must still be
    /// verified and active.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokenPair, AppError> {
        let claims = validate_token(refresh_token, TokenUse::Refresh, &self.jwt)?;
        let account = self
            .store
            .get_account_by_id(claims.account_id()?)
            .await?
            .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

        ensure_may_hold_session(&account)?;

        tracing::info!(account_id = %account.id, "Session refreshed");
        self.mint(&account, self.clock.now())
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    fn mint(
        &self,
        account: &Account,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<SessionTokenPair, AppError> {
        let sign = |token_use| sign_token(account.id, &account.email, token_use, now, &self.jwt);
        let access_token = sign(TokenUse::Access)?;
        let refresh_token = sign(TokenUse::Refresh)?;

        Ok(SessionTokenPair {
            access_token,
            refresh_token,
            expires_in: self.jwt.access_token_expiry,
            token_type: "Bearer".to_string(),
        })
    }
}

fn ensure_may_hold_session(account: &Account) -> Result<(), AppError> {
    if !account.email_verified {
        return Err(AppError::Auth(AuthError::EmailNotVerified));
    }
    if !account.active {
        return Err(AppError::Auth(AuthError::AccountInactive));
    }
    Ok(())
}
