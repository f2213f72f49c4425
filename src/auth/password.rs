/// Password Hashing and Verification
///
/// The token lifecycle treats password hashing as an opaque capability
/// (`PasswordHasher`). The shipped implementation is bcrypt with a strength
/// check applied before hashing.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt only reads the first 72 bytes
const MAX_PASSWORD_LENGTH: usize = 72;

pub trait PasswordHasher: Send + Sync {
    /// Validates strength and returns an opaque credential
    fn hash(&self, password: &str) -> Result<String, AppError>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, password: &str) -> Result<String, AppError> {
        validate_password_strength(password)?;

        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        verify(password, password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}

/// Validate password strength requirements
///
/// - 8 to 72 bytes
/// - At least one digit, one lowercase letter and one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password must mix digits with lowercase and uppercase letters".to_string(),
        )));
    }

    Ok(())
}
