use std::net::SocketAddr;

use anyhow::Context;
use courier_api::{PushAddressing, Tables};

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Selects the in-memory store instead of a SQLite file.
pub const MEMORY_DB: &str = ":memory:";

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub users_table: String,
    pub messages_table: String,
    pub notifications_table: String,
    pub connections_table: String,
    pub notifications_topic: String,
    pub push_addressing: PushAddressing,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let port: u16 = var("COURIER_PORT", "3000")
            .parse()
            .context("COURIER_PORT must be a port number")?;
        let push_addressing: PushAddressing = var("COURIER_PUSH_ADDRESSING", "connection")
            .parse()
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            host: var("COURIER_HOST", "0.0.0.0"),
            port,
            db_path: var("COURIER_DB_PATH", "courier.db"),
            jwt_secret: var("COURIER_JWT_SECRET", DEFAULT_JWT_SECRET),
            users_table: var("USERS_TABLE_NAME", "users"),
            messages_table: var("MESSAGES_TABLE_NAME", "messages"),
            notifications_table: var("NOTIFICATIONS_TABLE_NAME", "notifications"),
            connections_table: var("CONNECTIONS_TABLE_NAME", "connections"),
            notifications_topic: var("NOTIFICATIONS_TOPIC", "notifications"),
            push_addressing,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn tables(&self) -> Tables {
        Tables::new(
            &self.users_table,
            &self.messages_table,
            &self.notifications_table,
            &self.connections_table,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_path, "courier.db");
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(config.notifications_topic, "notifications");
        assert_eq!(config.push_addressing, PushAddressing::ConnectionLookup);

        let tables = config.tables();
        assert_eq!(tables.users.name, "users");
        assert_eq!(tables.connections.name, "connections");
        assert_eq!(tables.connections.key, "connectionId");
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("COURIER_PORT", "8080"),
            ("USERS_TABLE_NAME", "prod-users"),
            ("NOTIFICATIONS_TOPIC", "prod-notifications"),
            ("COURIER_PUSH_ADDRESSING", "user-id"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.tables().users.name, "prod-users");
        assert_eq!(config.notifications_topic, "prod-notifications");
        assert_eq!(config.push_addressing, PushAddressing::UserId);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(config(&[("COURIER_PORT", "eighty")]).is_err());
        assert!(config(&[("COURIER_PUSH_ADDRESSING", "broadcast")]).is_err());
    }
}
