use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEV_JWT_SECRET: &str = "jwt-secret-string";
const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let cors_allow_origin = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if secret == DEV_JWT_SECRET && environment == AppEnvironment::Production => {
                return Err(ConfigError::InsecureJwtSecret)
            }
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingJwtSecret)
            }
            _ => DEV_JWT_SECRET.to_string(),
        };
        let token_ttl_days = match env::var("JWT_TTL_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or(ConfigError::InvalidTokenTtl)?,
            Err(_) => DEFAULT_TOKEN_TTL_DAYS,
        };

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() => Some(AdminBootstrap {
                email,
                password,
                first_name: env::var("ADMIN_FIRST_NAME").unwrap_or_else(|_| "Admin".to_string()),
                last_name: env::var("ADMIN_LAST_NAME").unwrap_or_else(|_| "User".to_string()),
            }),
            _ => None,
        };

        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ConfigError::InvalidPoolSize)?,
            Err(_) => DEFAULT_DATABASE_MAX_CONNECTIONS,
        };

        let from_email =
            env::var("NOTIFY_FROM_EMAIL").unwrap_or_else(|_| "noreply@jobboard.local".to_string());
        let product_name =
            env::var("NOTIFY_PRODUCT_NAME").unwrap_or_else(|_| "Job Board".to_string());

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                cors_allow_origin,
            },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_days,
                admin,
            },
            storage: StorageConfig {
                database_url,
                max_connections,
            },
            notifications: NotificationConfig {
                from_email,
                product_name,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == AppEnvironment::Production
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` or a comma separated list of origins.
    pub cors_allow_origin: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Token signing and the optional administrator seeded at startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub admin: Option<AdminBootstrap>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_days", &self.token_ttl_days)
            .field("admin", &self.admin)
            .finish()
    }
}

#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the board keeps its rows. Without `DATABASE_URL` the process runs on the
/// in-memory store and loses everything on restart.
#[derive(Clone)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Branding for outbound e-mail.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub from_email: String,
    pub product_name: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTokenTtl,
    InvalidPoolSize,
    MissingJwtSecret,
    InsecureJwtSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must be an IP address or 'localhost'")
            }
            ConfigError::InvalidTokenTtl => {
                write!(f, "JWT_TTL_DAYS must be a positive number of days")
            }
            ConfigError::InvalidPoolSize => {
                write!(f, "DATABASE_MAX_CONNECTIONS must be a positive number")
            }
            ConfigError::MissingJwtSecret => {
                write!(f, "JWT_SECRET must be set when APP_ENV=production")
            }
            ConfigError::InsecureJwtSecret => {
                write!(f, "JWT_SECRET must not be the development default when APP_ENV=production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTokenTtl
            | ConfigError::InvalidPoolSize
            | ConfigError::MissingJwtSecret
            | ConfigError::InsecureJwtSecret => None,
        }
    }
}
