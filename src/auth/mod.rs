/// Authentication module
///
/// Single-use email tokens (verification, password reset), password hashing,
/// and the JWT session pair handed out after login.

mod claims;
mod jwt;
mod lifecycle;
mod password;
mod service;
mod session;
mod token_generator;

pub use claims::{Claims, TokenUse};
pub use jwt::{sign_token, validate_access_token, validate_token};
pub use lifecycle::{IssuedToken, TokenLifecycleManager};
pub use password::{validate_password_strength, BcryptPasswordHasher, PasswordHasher};
pub use service::{AuthDependencies, AuthService};
pub use session::{SessionIssuer, SessionTokenPair};
pub use token_generator::{
    is_well_formed_token, SecureTokenGenerator, TokenGenerator, TOKEN_BYTES, TOKEN_LENGTH,
};
