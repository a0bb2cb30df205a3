use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment: {0}")]
    Env(#[from] envy::Error),
}

/// Runtime configuration, read from the environment (a `.env` file is
/// honored in development). Everything except `DATABASE_URL` has a default.
#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Pause between round-robin offers.
    #[serde(default = "default_dispatch_delay_ms")]
    pub dispatch_delay_ms: u64,

    /// How often the scheduler refetches its endpoint snapshot.
    #[serde(default = "default_endpoint_refresh_ms")]
    pub endpoint_refresh_ms: u64,

    /// Checks allowed in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Probe timeout for endpoints that do not set their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Delivery attempts per notification channel.
    #[serde(default = "default_alert_retry_count")]
    pub alert_retry_count: u32,

    /// Base of the linear retry backoff.
    #[serde(default = "default_alert_retry_base_ms")]
    pub alert_retry_base_ms: u64,

    /// Minimum gap between repeated alerts for one incident.
    #[serde(default = "default_alert_cooldown_ms")]
    pub alert_cooldown_ms: u64,

    /// Check rows older than this many days are pruned daily.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_port() -> u16 {
    3000
}

fn default_dispatch_delay_ms() -> u64 {
    1500
}

fn default_endpoint_refresh_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_alert_retry_count() -> u32 {
    3
}

fn default_alert_retry_base_ms() -> u64 {
    1_000
}

fn default_alert_cooldown_ms() -> u64 {
    300_000
}

fn default_retention_days() -> u32 {
    30
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Ok(envy::from_env::<AppConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(String, String)> {
        vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/pulsewatch".to_string(),
        )]
    }

    #[test]
    fn defaults_fill_everything_but_the_database_url() {
        let config: AppConfig = envy::from_iter(base_env()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.dispatch_delay_ms, 1500);
        assert_eq!(config.endpoint_refresh_ms, 30_000);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.default_timeout_ms, 30_000);
        assert_eq!(config.alert_retry_count, 3);
        assert_eq!(config.alert_retry_base_ms, 1_000);
        assert_eq!(config.alert_cooldown_ms, 300_000);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn environment_overrides_win() {
        let mut env = base_env();
        env.push(("MAX_CONCURRENCY".to_string(), "8".to_string()));
        env.push(("ALERT_COOLDOWN_MS".to_string(), "60000".to_string()));
        let config: AppConfig = envy::from_iter(env).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.alert_cooldown_ms, 60_000);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let result: Result<AppConfig, _> = envy::from_iter(Vec::<(String, String)>::new());
        assert!(result.is_err());
    }
}
