mod auth;
mod health_check;
mod password_reset;
mod verification;

pub use auth::{get_current_account, login, refresh, register};
pub use health_check::health_check;
pub use password_reset::{forgot_password, reset_password};
pub use verification::{resend_verification, verify_email, verify_email_link};

use actix_web::{HttpMessage, HttpRequest};
use serde::Serialize;

use crate::error::ErrorContext;
use crate::middleware::RequestId;

/// Body of the plain acknowledgement responses
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error context carrying the id assigned by `RequestTracing`
pub(crate) fn request_context(req: &HttpRequest, operation: &str) -> ErrorContext {
    let context = ErrorContext::new(operation);
    match req.extensions().get::<RequestId>() {
        Some(RequestId(id)) => context.with_request_id(id.clone()),
        None => context,
    }
}
