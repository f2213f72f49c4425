use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{request_context, MessageResponse};
use crate::auth::AuthService;
use crate::error::AppError;

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// POST /api/v1/auth/forgot-password
///
/// Unknown emails get the same 200 as known ones.
///
/// # Errors
/// - 403: email not verified yet
/// - 429: a reset link was already sent and has not expired
pub async fn forgot_password(
    req: HttpRequest,
    form: web::Json<ForgotPasswordRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = request_context(&req, "forgot_password");

    service.forgot_password(&form.email).await?;

    tracing::info!(request_id = %context.request_id, "Password reset request handled");
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "If an account exists for that email, a password reset link has been sent.",
    )))
}

/// POST /api/v1/auth/reset-password
///
/// # Errors
/// - 400: malformed, unknown, used or expired token; weak password
pub async fn reset_password(
    req: HttpRequest,
    form: web::Json<ResetPasswordRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = request_context(&req, "reset_password");

    service.reset_password(&form.token, &form.new_password).await?;

    tracing::info!(request_id = %context.request_id, "Password reset completed");
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password has been reset. You can now log in with your new password.",
    )))
}
