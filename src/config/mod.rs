// src/config/mod.rs
// Loads every setting from the environment (.env first), falling back to defaults

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::weighting::WeightParams;

#[derive(Debug, Clone, Deserialize)]
pub struct ValqualConfig {
    // ── Database Configuration
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Moderation
    pub admin_email: String,

    // ── Weighting Engine
    pub vote_factor: f64,
    pub date_factor: f64,
    pub half_life_days: f64,
    pub recency_floor: f64,

    // ── Upvote Cache
    pub reconcile_interval_secs: u64,

    // ── Logging Configuration
    pub log_level: String,
}

/// Parses `key` from `lookup`, trimming whitespace and trailing `# comments`.
/// Missing or unparsable values fall back to `default`.
fn env_var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        None => default,
    }
}

impl ValqualConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_fallback = env_var_or(&lookup, "ADMIN_EMAIL", "admin@example.com".to_string());

        Self {
            database_url: env_var_or(
                &lookup,
                "DATABASE_URL",
                "sqlite:./submissions.db".to_string(),
            ),
            sqlite_max_connections: env_var_or(&lookup, "SQLITE_MAX_CONNECTIONS", 5),
            admin_email: env_var_or(&lookup, "VALQUAL_ADMIN_EMAIL", admin_fallback),
            vote_factor: env_var_or(&lookup, "VALQUAL_VOTE_FACTOR", 1.0),
            date_factor: env_var_or(&lookup, "VALQUAL_DATE_FACTOR", 0.3),
            half_life_days: env_var_or(&lookup, "VALQUAL_HALF_LIFE_DAYS", 90.0),
            recency_floor: env_var_or(&lookup, "VALQUAL_RECENCY_FLOOR", 0.25),
            reconcile_interval_secs: env_var_or(&lookup, "VALQUAL_RECONCILE_INTERVAL", 30),
            log_level: env_var_or(&lookup, "VALQUAL_LOG_LEVEL", "info".to_string()),
        }
    }

    // --- Convenience Methods ---

    pub fn weight_params(&self) -> WeightParams {
        WeightParams {
            vote_factor: self.vote_factor,
            date_factor: self.date_factor,
            half_life_days: self.half_life_days,
            recency_floor: self.recency_floor,
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    /// Max tracing level; unknown strings fall back to INFO
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

pub static CONFIG: Lazy<ValqualConfig> = Lazy::new(ValqualConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ValqualConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ValqualConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.database_url, "sqlite:./submissions.db");
        assert_eq!(config.admin_email, "admin@example.com");
        assert_eq!(config.vote_factor, 1.0);
        assert_eq!(config.date_factor, 0.3);
        assert_eq!(config.half_life_days, 90.0);
        assert_eq!(config.recency_floor, 0.25);
        assert_eq!(config.reconcile_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_comments_and_bad_values() {
        let config = config_from(&[
            ("VALQUAL_DATE_FACTOR", "0.5   # tuned for small groups"),
            ("SQLITE_MAX_CONNECTIONS", "lots"),
        ]);

        assert_eq!(config.date_factor, 0.5);
        assert_eq!(config.sqlite_max_connections, 5);
    }

    #[test]
    fn test_admin_fallback() {
        let config = config_from(&[("ADMIN_EMAIL", "boss@example.com")]);
        assert_eq!(config.admin_email, "boss@example.com");

        let config = config_from(&[
            ("ADMIN_EMAIL", "boss@example.com"),
            ("VALQUAL_ADMIN_EMAIL", "root@example.com"),
        ]);
        assert_eq!(config.admin_email, "root@example.com");
    }

    #[test]
    fn test_tracing_level() {
        let debug = config_from(&[("VALQUAL_LOG_LEVEL", "debug")]);
        assert_eq!(debug.tracing_level(), tracing::Level::DEBUG);
        let unknown = config_from(&[("VALQUAL_LOG_LEVEL", "chatty")]);
        assert_eq!(unknown.tracing_level(), tracing::Level::INFO);
    }
}
