use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_bind_address: String,
    pub db_max_connections: u32,
    pub max_body_bytes: usize,
    pub max_concurrent_requests: usize,
    pub worker_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://notifications.db".to_string(),
            api_bind_address: "0.0.0.0:8080".to_string(),
            db_max_connections: 5,
            max_body_bytes: 64 * 1024,
            max_concurrent_requests: 256,
            worker_threads: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            api_bind_address: env::var("API_BIND_ADDRESS").unwrap_or(defaults.api_bind_address),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            max_concurrent_requests: parse_var(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )?,
            worker_threads: parse_var("TOKIO_WORKER_THREADS", defaults.worker_threads)?,
        };

        if config.worker_threads == 0 {
            bail!("TOKIO_WORKER_THREADS must be at least 1");
        }
        Ok(config)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_uses_default_when_unset() {
        let value: u32 = parse_var("NOTIFICATION_ARCHIVE_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn defaults_size_runtime_to_cpus() {
        let config = Config::default();
        assert_eq!(config.worker_threads, num_cpus::get());
        assert!(config.worker_threads >= 1);
        assert_eq!(config.max_concurrent_requests, 256);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("NOTIFICATION_ARCHIVE_TEST_BAD_VAR", "lots");
        let result: Result<u32> = parse_var("NOTIFICATION_ARCHIVE_TEST_BAD_VAR", 7);
        assert!(result.is_err());
    }
}
