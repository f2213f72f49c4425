//! PostgreSQL credential store.
//!
//! Each trait method is exactly one SQL statement. Preconditions live in the
//! `WHERE` clause, so Postgres row locking decides who wins a race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Consumption, CredentialStore};
use crate::account::{Account, NewAccount, TokenKind};
use crate::error::{AppError, DatabaseError};

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    #[tracing::instrument(name = "Insert account", skip_all)]
    async fn create_account(
        &self,
        new_account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (
                id, email, full_name, password_hash,
                email_verified, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, FALSE, FALSE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_account.email)
        .bind(&new_account.full_name)
        .bind(&new_account.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    #[tracing::instrument(name = "Store token", skip(self, token, expires_at, now))]
    async fn issue_token(
        &self,
        account_id: Uuid,
        kind: TokenKind,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let sql = match kind {
            TokenKind::Verification => {
                r#"
                UPDATE accounts
                SET email_token = $2, email_token_expires = $3, updated_at = $4
                WHERE id = $1 AND email_verified = FALSE
                "#
            }
            TokenKind::Reset => {
                r#"
                UPDATE accounts
                SET password_reset_token = $2, password_reset_expires = $3, updated_at = $4
                WHERE id = $1
                  AND (password_reset_token IS NULL
                       OR password_reset_expires IS NULL
                       OR password_reset_expires <= $4)
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(account_id)
            .bind(token)
            .bind(expires_at)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(
        name = "Consume token",
        skip(self, consumption, presented, now),
        fields(kind = %consumption.kind())
    )]
    async fn consume_token(
        &self,
        consumption: Consumption<'_>,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let query = match consumption {
            Consumption::VerifyEmail => sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE accounts
                SET email_verified = TRUE,
                    active = TRUE,
                    email_token = NULL,
                    email_token_expires = NULL,
                    updated_at = $2
                WHERE email_token = $1 AND email_token_expires > $2
                RETURNING id
                "#,
            )
            .bind(presented)
            .bind(now),
            Consumption::ResetPassword { new_password_hash } => sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE accounts
                SET password_hash = $3,
                    password_reset_token = NULL,
                    password_reset_expires = NULL,
                    last_password_change = $2,
                    updated_at = $2
                WHERE password_reset_token = $1 AND password_reset_expires > $2
                RETURNING id
                "#,
            )
            .bind(presented)
            .bind(now)
            .bind(new_password_hash),
        };

        Ok(query.fetch_optional(&self.pool).await?)
    }

    async fn update_last_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE accounts SET last_login = $2, updated_at = $2 WHERE id = $1")
                .bind(account_id)
                .bind(at)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound("account".to_string())));
        }
        Ok(())
    }
}
