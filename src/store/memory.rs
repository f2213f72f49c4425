//! In-process credential store.
//!
//! Every operation runs start to finish under one mutex acquisition, which
//! gives the same first-writer-wins behaviour as a conditional `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Consumption, CredentialStore};
use crate::account::{Account, NewAccount, TokenKind};
use crate::error::{AppError, DatabaseError};

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a stored account wholesale. Lets tests stage states such as
    /// an already-expired token or a deactivated account.
    pub fn put_account(&self, account: Account) -> Result<(), AppError> {
        self.lock()?.insert(account.id, account);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Account>>, AppError> {
        self.accounts.lock().map_err(|_| {
            AppError::Database(DatabaseError::UnexpectedError(
                "account map poisoned".to_string(),
            ))
        })
    }
}

fn matches_live(
    value: &Option<String>,
    expires_at: &Option<DateTime<Utc>>,
    presented: &str,
    now: DateTime<Utc>,
) -> bool {
    match (value, expires_at) {
        (Some(value), Some(expires_at)) => {
            constant_time_eq::constant_time_eq(value.as_bytes(), presented.as_bytes())
                && *expires_at > now
        }
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_account(
        &self,
        new_account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, AppError> {
        let mut accounts = self.lock()?;

        if accounts.values().any(|a| a.email == new_account.email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "accounts_email_key".to_string(),
            )));
        }

        let account = Account::new(new_account, now);
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(self.lock()?.values().find(|a| a.email == email).cloned())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.lock()?.get(&account_id).cloned())
    }

    async fn issue_token(
        &self,
        account_id: Uuid,
        kind: TokenKind,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut accounts = self.lock()?;
        let Some(account) = accounts.get_mut(&account_id) else {
            return Ok(false);
        };

        match kind {
            TokenKind::Verification => {
                if account.email_verified {
                    return Ok(false);
                }
                account.email_token = Some(token.to_string());
                account.email_token_expires = Some(expires_at);
            }
            TokenKind::Reset => {
                if account.has_live_reset_token(now) {
                    return Ok(false);
                }
                account.password_reset_token = Some(token.to_string());
                account.password_reset_expires = Some(expires_at);
            }
        }
        account.updated_at = now;
        Ok(true)
    }

    async fn consume_token(
        &self,
        consumption: Consumption<'_>,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let mut accounts = self.lock()?;

        let matched = accounts.values_mut().find(|a| match consumption {
            Consumption::VerifyEmail => {
                matches_live(&a.email_token, &a.email_token_expires, presented, now)
            }
            Consumption::ResetPassword { .. } => {
                matches_live(&a.password_reset_token, &a.password_reset_expires, presented, now)
            }
        });
        let Some(account) = matched else {
            return Ok(None);
        };

        match consumption {
            Consumption::VerifyEmail => {
                account.email_token = None;
                account.email_token_expires = None;
                account.email_verified = true;
                account.active = true;
            }
            Consumption::ResetPassword { new_password_hash } => {
                account.password_hash = new_password_hash.to_string();
                account.password_reset_token = None;
                account.password_reset_expires = None;
                account.last_password_change = Some(now);
            }
        }
        account.updated_at = now;
        Ok(Some(account.id))
    }

    async fn update_last_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut accounts = self.lock()?;
        let account = accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound("account".to_string())))?;

        account.last_login = Some(at);
        account.updated_at = at;
        Ok(())
    }
}
