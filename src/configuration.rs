use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub tokens: TokenSettings,
    pub email: EmailSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Public origin the verification and reset links point at
    pub base_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,   // seconds
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,  // seconds
    pub issuer: String,
}

fn default_access_token_expiry() -> i64 {
    86_400
}

fn default_refresh_token_expiry() -> i64 {
    30 * 86_400
}

/// Lifetimes of the single-use email tokens
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TokenSettings {
    #[serde(default = "default_verification_ttl_hours")]
    pub verification_ttl_hours: i64,
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_ttl_minutes: i64,
}

fn default_verification_ttl_hours() -> i64 {
    24
}

fn default_reset_ttl_minutes() -> i64 {
    60
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            verification_ttl_hours: default_verification_ttl_hours(),
            reset_ttl_minutes: default_reset_ttl_minutes(),
        }
    }
}

impl TokenSettings {
    pub fn verification_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.verification_ttl_hours)
    }

    pub fn reset_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reset_ttl_minutes)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailSettings {
    pub base_url: String,
    pub sender: String,
    #[serde(default = "default_email_timeout")]
    pub timeout_milliseconds: u64,
}

fn default_email_timeout() -> u64 {
    10_000
}

impl EmailSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// HS256 keys shorter than this are rejected at startup
const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Checks the values serde cannot: key strength and sane lifetimes.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError as Invalid;

        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(Invalid::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_JWT_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(Invalid::InvalidValue("jwt token lifetimes must be positive".to_string()));
        }
        if self.tokens.verification_ttl_hours <= 0 || self.tokens.reset_ttl_minutes <= 0 {
            return Err(Invalid::InvalidValue("token lifetimes must be positive".to_string()));
        }
        if self.application.base_url.trim().is_empty() {
            return Err(Invalid::MissingRequired("application.base_url".to_string()));
        }
        Ok(())
    }
}

/// Reads `configuration.{yaml,json,toml}` from the working directory when
/// present, then overlays `APP__SECTION__KEY` environment variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
