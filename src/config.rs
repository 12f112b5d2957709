use std::{env, path::PathBuf};

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Process-wide settings, read once at start-up and shared read-only through
/// [`crate::state::AppState`]. Every value has a default that is only suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PgConnectOptions,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url
                .parse::<PgConnectOptions>()
                .context("DATABASE_URL is not a valid Postgres URL")?,
            _ => database_options_from_parts(
                &var_or("DB_HOST", "127.0.0.1"),
                &var_or("DB_PORT", "5432"),
                &var_or("DB_USER", "postgres"),
                &var_or("DB_PASSWORD", ""),
                &var_or("DB_NAME", "storefront"),
            )?,
        };
        let host = var_or("APP_HOST", "127.0.0.1");
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);
        let jwt_secret = var_or("JWT_SECRET", DEFAULT_JWT_SECRET);
        if jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!("JWT_SECRET is not set, using the development default");
        }
        let upload_dir = PathBuf::from(var_or("UPLOAD_DIR", "uploads"));

        Ok(Self {
            database,
            host,
            port,
            jwt_secret,
            upload_dir,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Credentials are passed as options, never spliced into a URL, so they may
/// contain any character.
fn database_options_from_parts(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<PgConnectOptions> {
    let port = port
        .parse::<u16>()
        .with_context(|| format!("DB_PORT must be a port number, got {port:?}"))?;
    let options = PgConnectOptions::new_without_pgpass()
        .host(host)
        .port(port)
        .username(user)
        .database(name);
    Ok(if password.is_empty() {
        options
    } else {
        options.password(password)
    })
}
