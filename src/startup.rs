use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::middleware::{JwtMiddleware, RequestTracing};
use crate::routes::{
    forgot_password, get_current_account, health_check, login, refresh, register,
    resend_verification, reset_password, verify_email, verify_email_link,
};

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let jwt_config = service.sessions().jwt_settings().clone();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestTracing)
            .app_data(service.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/auth")
                    .route("/register", web::post().to(register))
                    .route("/verify-email", web::post().to(verify_email))
                    .route("/verify-email/{token}", web::get().to(verify_email_link))
                    .route("/resend-verification", web::post().to(resend_verification))
                    .route("/forgot-password", web::post().to(forgot_password))
                    .route("/reset-password", web::post().to(reset_password))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Requires a valid access token
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(get_current_account)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
