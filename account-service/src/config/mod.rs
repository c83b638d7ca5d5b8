use app_core::config as core_config;
use app_core::error::AppError;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub two_factor: TwoFactorConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub session_cookie_name: String,
    pub challenge_cookie_name: String,
    pub session_expiry_hours: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwoFactorConfig {
    /// Issuer name embedded in provisioning URIs.
    pub issuer: String,
    /// Deployment-wide mandatory 2FA policy.
    pub mandatory: bool,
    /// TTL for the awaiting-challenge sub-state.
    pub challenge_expiry_minutes: i64,
    /// TTL for an unconfirmed enrollment secret.
    pub enrollment_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub challenge_attempts: u32,
    pub challenge_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl AccountConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccountConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("account-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env(
                    "DATABASE_URL",
                    Some("postgres://localhost/account_service"),
                    is_prod,
                )?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                session_cookie_name: get_env("SESSION_COOKIE_NAME", Some("app_session"), is_prod)?,
                challenge_cookie_name: get_env(
                    "CHALLENGE_COOKIE_NAME",
                    Some("app_challenge"),
                    is_prod,
                )?,
                session_expiry_hours: get_env("SESSION_EXPIRY_HOURS", Some("72"), is_prod)?
                    .parse()
                    .unwrap_or(72),
                cookie_secure: get_env("COOKIE_SECURE", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(is_prod),
            },
            two_factor: TwoFactorConfig {
                issuer: get_env("TWO_FACTOR_ISSUER", Some("account-service"), is_prod)?,
                mandatory: get_env("TWO_FACTOR_MANDATORY", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
                challenge_expiry_minutes: get_env(
                    "TWO_FACTOR_CHALLENGE_EXPIRY_MINUTES",
                    Some("10"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(10),
                enrollment_expiry_minutes: get_env(
                    "TWO_FACTOR_ENROLLMENT_EXPIRY_MINUTES",
                    Some("30"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(30),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(900),
                challenge_attempts: get_env("RATE_LIMIT_CHALLENGE_ATTEMPTS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                challenge_window_seconds: get_env(
                    "RATE_LIMIT_CHALLENGE_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(900),
                global_ip_limit: get_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(60),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.security.session_expiry_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_EXPIRY_HOURS must be positive"
            )));
        }

        if self.two_factor.challenge_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TWO_FACTOR_CHALLENGE_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.security.cookie_secure {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "COOKIE_SECURE must be true in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
