/// Account Data Model
///
/// An account embeds at most one verification token and at most one reset
/// token, each as a nullable (value, expires_at) pair. Issuing a new value
/// overwrites the old one, so there is never a history of tokens to revoke.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Identity record as persisted by the credential store
#[derive(Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    /// Lowercased, unique
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub active: bool,
    pub email_token: Option<String>,
    pub email_token_expires: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Builds the record a freshly registered account starts with:
    /// unverified, inactive, no tokens.
    pub fn new(new_account: NewAccount, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: new_account.email,
            full_name: new_account.full_name,
            password_hash: new_account.password_hash,
            email_verified: false,
            active: false,
            email_token: None,
            email_token_expires: None,
            password_reset_token: None,
            password_reset_expires: None,
            last_login: None,
            last_password_change: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_live_verification_token(&self, now: DateTime<Utc>) -> bool {
        is_live(&self.email_token, &self.email_token_expires, now)
    }

    pub fn has_live_reset_token(&self, now: DateTime<Utc>) -> bool {
        is_live(&self.password_reset_token, &self.password_reset_expires, now)
    }
}

fn is_live(value: &Option<String>, expires_at: &Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match (value, expires_at) {
        (Some(_), Some(expires_at)) => *expires_at > now,
        _ => false,
    }
}

// Token values and the password hash stay out of logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email_verified", &self.email_verified)
            .field("active", &self.active)
            .field("has_email_token", &self.email_token.is_some())
            .field("email_token_expires", &self.email_token_expires)
            .field("has_password_reset_token", &self.password_reset_token.is_some())
            .field("password_reset_expires", &self.password_reset_expires)
            .field("last_login", &self.last_login)
            .finish_non_exhaustive()
    }
}

/// Registration input, already validated and hashed
#[derive(Clone)]
pub struct NewAccount {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

/// The two single-use token kinds embedded in an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Verification,
    Reset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Verification => "verification",
            TokenKind::Reset => "reset",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account() -> Account {
        Account::new(
            NewAccount {
                email: "ana@example.com".to_string(),
                full_name: "Ana Perez".to_string(),
                password_hash: "$2b$04$hash".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_account_starts_unverified_without_tokens() {
        let account = account();
        let now = Utc::now();

        assert!(!account.email_verified);
        assert!(!account.active);
        assert!(!account.has_live_verification_token(now));
        assert!(!account.has_live_reset_token(now));
    }

    #[test]
    fn token_is_live_only_before_expiry() {
        let now = Utc::now();
        let mut account = account();
        account.password_reset_token = Some("ab".repeat(32));
        account.password_reset_expires = Some(now + Duration::minutes(1));

        assert!(account.has_live_reset_token(now));
        assert!(!account.has_live_reset_token(now + Duration::minutes(1)));
        assert!(!account.has_live_reset_token(now + Duration::minutes(2)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut account = account();
        let token = "cd".repeat(32);
        account.email_token = Some(token.clone());

        let rendered = format!("{:?}", account);
        assert!(!rendered.contains(&token));
        assert!(!rendered.contains("$2b$04$hash"));
        assert!(rendered.contains("has_email_token: true"));
    }
}
