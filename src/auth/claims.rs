/// JWT Claims structure
///
/// Payload of the session tokens minted after login. Both halves of a
/// session pair share this shape and are told apart by `token_use`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Which half of a session pair a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique per token, so an access and refresh token minted in the same
    /// second never collide
    pub jti: String,
    pub token_use: TokenUse,
}

impl Claims {
    pub fn new(
        account_id: Uuid,
        email: String,
        token_use: TokenUse,
        issued_at: DateTime<Utc>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: account_id.to_string(),
            email,
            exp: iat + expiry_seconds,
            iat,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
            token_use,
        }
    }

    /// Extract account ID from claims
    pub fn account_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let account_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = Claims::new(
            account_id,
            "ana@example.com".to_string(),
            TokenUse::Access,
            now,
            3600,
            "test".to_string(),
        );

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.token_use, TokenUse::Access);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn test_account_id_extraction() {
        let account_id = Uuid::new_v4();
        let mut claims = Claims::new(
            account_id,
            "ana@example.com".to_string(),
            TokenUse::Refresh,
            Utc::now(),
            60,
            "test".to_string(),
        );

        assert_eq!(claims.account_id().unwrap(), account_id);

        claims.sub = "invalid-uuid".to_string();
        assert!(claims.account_id().is_err());
    }

    #[test]
    fn test_token_use_serializes_snake_case() {
        let json = serde_json::to_string(&TokenUse::Refresh).unwrap();
        assert_eq!(json, "\"refresh\"");
    }
}
