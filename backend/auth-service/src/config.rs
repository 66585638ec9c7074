//! Configuration management for the auth service
//!
//! Settings come from environment variables, with a `.env` file loaded in
//! debug builds for local development.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub auth: AuthSettings,
    pub oauth: OAuthSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            auth: AuthSettings::from_env()?,
            oauth: OAuthSettings::from_env(),
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// Token signing and lifetime settings
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared HMAC signing secret. Must be at least 32 bytes; the codec
    /// refuses to start with anything shorter.
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            // 15 minutes
            access_ttl_secs: env::var("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid ACCESS_TOKEN_TTL_SECS")?,
            // 30 days
            refresh_ttl_secs: env::var("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "2592000".to_string())
                .parse()
                .context("Invalid REFRESH_TOKEN_TTL_SECS")?,
        })
    }
}

/// Request-authentication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Path prefixes the request authenticator skips entirely. Login and
    /// federated entry points must never require a pre-existing token.
    pub public_prefixes: Vec<String>,
    /// Revocation-store sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl AuthSettings {
    fn from_env() -> Result<Self> {
        let public_prefixes = env::var("AUTH_PUBLIC_PREFIXES")
            .map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| Self::default_public_prefixes());

        Ok(Self {
            public_prefixes,
            sweep_interval_secs: env::var("REVOCATION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid REVOCATION_SWEEP_INTERVAL_SECS")?,
        })
    }

    pub fn default_public_prefixes() -> Vec<String> {
        [
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/auth/logout",
            "/api/v1/oauth",
            "/health",
            "/metrics",
            "/docs",
            "/api-docs",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect()
    }
}

/// OAuth provider credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthSettings {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub facebook_app_id: Option<String>,
    pub facebook_app_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl OAuthSettings {
    fn from_env() -> Self {
        Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            facebook_app_id: env::var("FACEBOOK_APP_ID").ok(),
            facebook_app_secret: env::var("FACEBOOK_APP_SECRET").ok(),
            redirect_uri: env::var("OAUTH_REDIRECT_URI").ok(),
        }
    }
}
