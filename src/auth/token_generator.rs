/// Secure Token Generation
///
/// Verification and reset tokens are 32 bytes from the operating system's
/// CSPRNG, hex-encoded to 64 lowercase characters. If the OS source fails the
/// issuing operation fails with it; there is no weaker fallback.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{AppError, AuthError};

/// Bytes of entropy per token
pub const TOKEN_BYTES: usize = 32;
/// Length of the hex-encoded token
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecureTokenGenerator;

impl TokenGenerator for SecureTokenGenerator {
    fn generate(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            tracing::error!(error = %e, "OS random source failed");
            AppError::Auth(AuthError::EntropyUnavailable)
        })?;

        Ok(hex::encode(bytes))
    }
}

/// Exactly 64 ASCII hex digits
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}
