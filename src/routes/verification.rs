use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{request_context, MessageResponse};
use crate::auth::AuthService;
use crate::error::{AppError, AuthError};

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

const VERIFIED: &str = "Email verified successfully. You can now log in.";
const RESEND_ACK: &str =
    "If an unverified account exists for that email, a new verification link has been sent.";

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    req: HttpRequest,
    form: web::Json<VerifyEmailRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    confirm(&req, &form.token, &service).await
}

/// GET /api/v1/auth/verify-email/{token}
///
/// Target of the emailed link.
pub async fn verify_email_link(
    req: HttpRequest,
    token: web::Path<String>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    confirm(&req, &token, &service).await
}

async fn confirm(
    req: &HttpRequest,
    token: &str,
    service: &AuthService,
) -> Result<HttpResponse, AppError> {
    let context = request_context(req, "verify_email");

    let account = service.verify_email(token).await?;

    tracing::info!(
        request_id = %context.request_id,
        account_id = %account.id,
        "Email verified"
    );
    Ok(HttpResponse::Ok().json(MessageResponse::new(VERIFIED)))
}

/// POST /api/v1/auth/resend-verification
///
/// Answers the same way whether or not the email belongs to an unverified
/// account.
pub async fn resend_verification(
    req: HttpRequest,
    form: web::Json<ResendVerificationRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = request_context(&req, "resend_verification");

    match service.resend_verification(&form.email).await {
        Ok(()) => {}
        // Logged, but answered like a success
        Err(e @ AppError::Auth(AuthError::AccountNotFound | AuthError::AlreadyVerified)) => {
            context.log_error(&e);
        }
        Err(e) => return Err(e),
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new(RESEND_ACK)))
}
