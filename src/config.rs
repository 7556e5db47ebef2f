use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL of the personnel store. `None` runs against an
    /// in-process store whose contents are lost on restart.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    /// Upper bound on every occupant lookup and presence-log write.
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process
    /// environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            store_timeout: optional("STORE_TIMEOUT_MS", "2000")
                .parse()
                .map(Duration::from_millis)
                .context("STORE_TIMEOUT_MS must be a positive integer")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.database_url, None);
        assert_eq!(c.database_max_connections, 10);
        assert_eq!(c.server_host, "0.0.0.0");
        assert_eq!(c.server_port, 8080);
        assert_eq!(c.store_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let c = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/office"),
            ("SERVER_PORT", "3000"),
            ("STORE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/office"));
        assert_eq!(c.server_port, 3000);
        assert_eq!(c.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let c = Config::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(c.database_url, None);
    }

    #[test]
    fn invalid_port_errors() {
        let err = Config::from_lookup(lookup(&[("SERVER_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn invalid_timeout_errors() {
        let err = Config::from_lookup(lookup(&[("STORE_TIMEOUT_MS", "-5")])).unwrap_err();
        assert!(err.to_string().contains("STORE_TIMEOUT_MS"));
    }
}
