use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use account_tokens::auth::{
    AuthDependencies, AuthService, BcryptPasswordHasher, SecureTokenGenerator,
};
use account_tokens::clock::SystemClock;
use account_tokens::configuration::get_configuration;
use account_tokens::email_client::{EmailClient, SenderAddress};
use account_tokens::startup::run;
use account_tokens::store::PgCredentialStore;
use account_tokens::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, what: &str) -> std::io::Error {
    std::io::Error::new(kind, what.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_telemetry("info") {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!(error = %e, "Failed to read configuration");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    configuration.validate().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create connection pool");
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to run migrations");
        startup_error(std::io::ErrorKind::Other, "Migration error")
    })?;

    tracing::info!("Database ready");

    let sender = SenderAddress::parse(&configuration.email.sender).map_err(|e| {
        tracing::error!(error = %e, "Invalid sender address");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    let email_client = EmailClient::new(
        configuration.email.base_url.clone(),
        sender,
        configuration.email.timeout(),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to build email client");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let deps = AuthDependencies {
        store: Arc::new(PgCredentialStore::new(pool)),
        hasher: Arc::new(BcryptPasswordHasher::new(configuration.password.bcrypt_cost)),
        generator: Arc::new(SecureTokenGenerator),
        clock: Arc::new(SystemClock),
        notifier: Arc::new(email_client),
    };
    let service = AuthService::new(
        deps,
        &configuration.application.base_url,
        configuration.tokens.clone(),
        configuration.jwt.clone(),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to assemble auth service");
        startup_error(std::io::ErrorKind::Other, "Startup error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, service)?.await
}
