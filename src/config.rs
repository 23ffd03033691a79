use std::{env, net::SocketAddr};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// In-flight request cap applied by the tower concurrency layer.
    pub concurrency_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = get("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parsed(&get, "APP_PORT", 3000);
        let max_connections = parsed(&get, "DATABASE_MAX_CONNECTIONS", 10);
        let concurrency_limit = parsed(&get, "APP_CONCURRENCY_LIMIT", 100);
        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            concurrency_limit,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip = self
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}

// Unparseable values fall back to the default rather than aborting startup.
fn parsed<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
