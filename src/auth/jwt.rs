/// JWT Signing and Validation
///
/// HS256 tokens for the session pair. The signing key and lifetimes come
/// from `JwtSettings`; the issuer claim is checked on the way back in.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenUse};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Sign a token of the given use for an account
pub fn sign_token(
    account_id: Uuid,
    email: &str,
    token_use: TokenUse,
    issued_at: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let expiry_seconds = match token_use {
        TokenUse::Access => config.access_token_expiry,
        TokenUse::Refresh => config.refresh_token_expiry,
    };
    let claims = Claims::new(
        account_id,
        email.to_string(),
        token_use,
        issued_at,
        expiry_seconds,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate signature, issuer, expiry and intended use
pub fn validate_token(
    token: &str,
    expected_use: TokenUse,
    config: &JwtSettings,
) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!(error = %e, "JWT validation error");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
            _ => AppError::Auth(AuthError::TokenInvalid),
        }
    })?;

    if claims.token_use != expected_use {
        tracing::warn!(
            expected = ?expected_use,
            actual = ?claims.token_use,
            "JWT presented for the wrong purpose"
        );
        return Err(AppError::Auth(AuthError::TokenInvalid));
    }

    Ok(claims)
}

pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    validate_token(token, TokenUse::Access, config)
}
