use crate::error::{AppError, AppResult};
use dotenvy::dotenv;
use std::env;

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Interval between client channel-membership refreshes, in seconds.
    pub client_refresh_secs: u64,
    /// Maximum characters of message text surfaced in a notification preview.
    pub preview_max_chars: usize,
    /// Usernames accepted by the identity collaborator. Empty means the
    /// directory accepts any non-empty username (no external identity source).
    pub known_users: Vec<String>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();

        let port = parse_var("PORT", 8080)?;
        let client_refresh_secs = parse_var("CLIENT_REFRESH_SECS", 30)?;
        let preview_max_chars = parse_var("PREVIEW_MAX_CHARS", 50)?;

        let known_users = env::var("KNOWN_USERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if preview_max_chars == 0 {
            return Err(AppError::Config(
                "PREVIEW_MAX_CHARS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            port,
            client_refresh_secs,
            preview_max_chars,
            known_users,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("invalid {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}
