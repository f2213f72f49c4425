/// Authentication Routes
///
/// Registration, login, session refresh and the current account.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request_context;
use crate::account::Account;
use crate::auth::{AuthService, Claims};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub requires_email_verification: bool,
    pub message: String,
}

/// Account summary; never includes tokens or the password hash
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email,
            full_name: account.full_name,
            email_verified: account.email_verified,
            active: account.active,
            last_login: account.last_login,
            created_at: account.created_at,
        }
    }
}

/// POST /api/v1/auth/register
///
/// Creates an unverified account and emails a verification link. No session
/// is issued until the email is verified.
///
/// # Errors
/// - 400: invalid email, name or weak password
/// - 409: registration rejected (the wording does not reveal why)
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = request_context(&req, "register");

    let account = service
        .register(&form.email, &form.password, &form.full_name)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        account_id = %account.id,
        "Registration accepted"
    );

    Ok(HttpResponse::Created().json(RegisterResponse {
        id: account.id.to_string(),
        email: account.email,
        full_name: account.full_name,
        requires_email_verification: true,
        message: "Registration successful. Check your email to verify your account.".to_string(),
    }))
}

/// POST /api/v1/auth/login
///
/// # Errors
/// - 401: unknown email or wrong password (same response for both)
/// - 403: email not verified, or account inactive
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = request_context(&req, "login");

    let pair = service.login(&form.email, &form.password).await?;

    tracing::info!(request_id = %context.request_id, "Login succeeded");
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let pair = service.refresh(&form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// GET /api/v1/auth/me
///
/// Claims are injected by `JwtMiddleware`.
pub async fn get_current_account(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let account = service.current_account(claims.account_id()?).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}
