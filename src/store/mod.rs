//! Credential store contract.
//!
//! All token state lives in the store, which is the only place shared
//! account state is mutated. Every mutating operation here is a single
//! atomic conditional write: the store, not the caller, decides whether the
//! precondition still holds at the moment of the write. A read followed by a
//! separate write would let two callers consume the same token.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::account::{Account, NewAccount, TokenKind};
use crate::error::AppError;

/// What a successful consumption does to the account, besides clearing the token
#[derive(Debug, Clone, Copy)]
pub enum Consumption<'a> {
    /// Clears the verification token and marks the email verified (and the account active)
    VerifyEmail,
    /// Clears the reset token and replaces the password credential in the same write
    ResetPassword { new_password_hash: &'a str },
}

impl Consumption<'_> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Consumption::VerifyEmail => TokenKind::Verification,
            Consumption::ResetPassword { .. } => TokenKind::Reset,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts an unverified, inactive account without tokens.
    ///
    /// A duplicate email fails with `DatabaseError::UniqueConstraintViolation`.
    async fn create_account(
        &self,
        new_account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, AppError>;

    /// Lookup by normalized (lowercased) email
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError>;

    /// Writes a token value and expiry for an account.
    ///
    /// - `Verification`: overwrites whatever was there, but only while the
    ///   email is unverified.
    /// - `Reset`: writes only if the account has no live reset token at `now`.
    ///
    /// Returns `false` when the condition did not hold or the account does not exist.
    async fn issue_token(
        &self,
        account_id: Uuid,
        kind: TokenKind,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Consumes a live token of the consumption's kind whose value equals `presented`.
    ///
    /// Succeeds for exactly one caller per issued token: the winner gets the
    /// account id, everyone else gets `None` and nothing is mutated. Expired
    /// tokens are left in place.
    async fn consume_token(
        &self,
        consumption: Consumption<'_>,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError>;

    async fn update_last_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
}
