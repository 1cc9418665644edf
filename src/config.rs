//! Runtime configuration for the club statistics server.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    /// PostgreSQL connection string; in-memory storage when absent.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Upper bound on any single storage interaction.
    pub query_timeout: Duration,
    pub feed_page_size: u32,
    /// Leaderboard length when the caller gives none.
    pub leaderboard_limit: u32,
    pub leaderboard_max: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            database_max_connections: 5,
            query_timeout: Duration::from_millis(5000),
            feed_page_size: 25,
            leaderboard_limit: 10,
            leaderboard_max: 100,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset or unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: lookup("BIND_ADDR")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parsed(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            query_timeout: Duration::from_millis(parsed(
                &lookup,
                "QUERY_TIMEOUT_MS",
                defaults.query_timeout.as_millis() as u64,
            )),
            feed_page_size: parsed(&lookup, "FEED_PAGE_SIZE", defaults.feed_page_size).max(1),
            leaderboard_limit: parsed(&lookup, "LEADERBOARD_LIMIT", defaults.leaderboard_limit)
                .max(1),
            leaderboard_max: parsed(&lookup, "LEADERBOARD_MAX", defaults.leaderboard_max).max(1),
        }
    }
}

fn parsed<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparseable setting, using default");
            default
        }),
    }
}
