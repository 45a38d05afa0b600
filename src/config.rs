/// Configuration management for NewsHub
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub content: ContentConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used in outgoing links (password reset mails)
    pub public_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database: PathBuf,
    /// Maximum accepted image upload in bytes
    pub image_upload_limit: usize,
}

/// Session cookie and token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub jwt_secret: String,
    /// Shared by registration and login
    pub ttl_hours: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

/// Content rules and listing sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub comment_min_length: usize,
    pub page_size: i64,
    pub admin_page_size: i64,
    pub moderation_page_size: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("NEWSHUB_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("NEWSHUB_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("NEWSHUB_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env!("CARGO_PKG_VERSION").to_string();

        let database = env::var("NEWSHUB_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/newshub.sqlite"));
        let image_upload_limit = env_or("NEWSHUB_IMAGE_UPLOAD_LIMIT", 5 * 1024 * 1024);

        let jwt_secret = env::var("NEWSHUB_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let ttl_hours = env_or("NEWSHUB_SESSION_TTL_HOURS", 24);
        let cookie_name = env::var("NEWSHUB_COOKIE_NAME").unwrap_or_else(|_| "jwt".to_string());
        let cookie_secure = env_or("NEWSHUB_COOKIE_SECURE", false);

        let email = if let Ok(smtp_url) = env::var("NEWSHUB_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("NEWSHUB_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                database,
                image_upload_limit,
            },
            session: SessionConfig {
                jwt_secret,
                ttl_hours,
                cookie_name,
                cookie_secure,
            },
            content: ContentConfig {
                comment_min_length: env_or("NEWSHUB_COMMENT_MIN_LENGTH", 2),
                page_size: env_or("NEWSHUB_PAGE_SIZE", 10),
                admin_page_size: env_or("NEWSHUB_ADMIN_PAGE_SIZE", 15),
                moderation_page_size: env_or("NEWSHUB_MODERATION_PAGE_SIZE", 20),
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.session.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.session.ttl_hours <= 0 {
            return Err(AppError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if self.content.page_size <= 0
            || self.content.admin_page_size <= 0
            || self.content.moderation_page_size <= 0
        {
            return Err(AppError::Validation("Page sizes must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
impl ServerConfig {
    /// Configuration used by unit tests
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                database: PathBuf::from(":memory:"),
                image_upload_limit: 5 * 1024 * 1024,
            },
            session: SessionConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                ttl_hours: 24,
                cookie_name: "jwt".to_string(),
                cookie_secure: false,
            },
            content: ContentConfig {
                comment_min_length: 2,
                page_size: 10,
                admin_page_size: 15,
                moderation_page_size: 20,
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(ServerConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_tests();
        config.session.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let mut config = ServerConfig::for_tests();
        config.service.hostname = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = ServerConfig::for_tests();
        config.content.page_size = 0;
        assert!(config.validate().is_err());
    }
}
