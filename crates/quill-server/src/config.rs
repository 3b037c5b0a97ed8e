use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::warn;

/// Placeholder session secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("QUILL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "QUILL_PORT", 3000)?;
        let db_path: PathBuf = lookup("QUILL_DB_PATH").unwrap_or_else(|| "quill.db".into()).into();
        let session_ttl_hours: i64 = parse_or(&lookup, "QUILL_SESSION_TTL_HOURS", 168)?;
        let cookie_secure: bool = parse_or(&lookup, "QUILL_COOKIE_SECURE", false)?;

        if session_ttl_hours <= 0 {
            bail!("QUILL_SESSION_TTL_HOURS must be positive, got {}", session_ttl_hours);
        }

        let session_secret = match lookup("QUILL_SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
                bail!("QUILL_SESSION_SECRET is still a placeholder; set it to a random string")
            }
            Some(secret) => secret,
            None => {
                warn!("QUILL_SESSION_SECRET is unset; using a random secret, sessions will not survive a restart");
                URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
            }
        };

        Ok(Self {
            host,
            port,
            db_path,
            session_secret,
            session_ttl_hours,
            cookie_secure,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
