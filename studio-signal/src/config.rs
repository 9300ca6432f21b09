//! Gateway configuration.
//!
//! Layers, lowest to highest priority:
//!
//!   1. [`ServerConfig::default()`]
//!   2. `STUDIO_SIGNAL_*` env vars (`STUDIO_SIGNAL_PORT=9000`,
//!      `STUDIO_SIGNAL_OUTBOUND_CAPACITY=512`, ...)
//!   3. a bare `PORT` env var, as set by most container platforms

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,
    /// TCP port for WebSocket upgrades
    pub port: u16,
    /// Frames buffered per client before new messages to it are dropped
    pub outbound_capacity: usize,
    /// Largest accepted inbound message, in bytes
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            outbound_capacity: 256,
            max_message_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// The layered figment described in the module docs.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("STUDIO_SIGNAL_"))
            .merge(Env::raw().only(&["PORT"]))
    }

    /// Load from the environment.
    pub fn load() -> Result<Self, ServerError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ServerError> {
        let config: Self = figment.extract()?;
        Ok(config.sanitized())
    }

    /// A zero-capacity mpsc channel panics, so clamp to at least one slot.
    fn sanitized(mut self) -> Self {
        self.outbound_capacity = self.outbound_capacity.max(1);
        self
    }

    /// `host:port` for [`tokio::net::TcpListener::bind`].
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.max_message_bytes, 65536);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_defaults_without_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = ServerConfig::load().unwrap();
            assert_eq!(config, ServerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("STUDIO_SIGNAL_HOST", "127.0.0.1");
            jail.set_env("STUDIO_SIGNAL_PORT", "9001");
            jail.set_env("STUDIO_SIGNAL_OUTBOUND_CAPACITY", "8");
            let config = ServerConfig::load().unwrap();
            assert_eq!(config.bind_addr(), "127.0.0.1:9001");
            assert_eq!(config.outbound_capacity, 8);
            assert_eq!(config.max_message_bytes, 65536);
            Ok(())
        });
    }

    #[test]
    fn test_bare_port_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("STUDIO_SIGNAL_PORT", "9001");
            jail.set_env("PORT", "7000");
            let config = ServerConfig::load().unwrap();
            assert_eq!(config.port, 7000);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        Jail::expect_with(|jail| {
            jail.set_env("PORT", "not-a-port");
            assert!(matches!(ServerConfig::load(), Err(ServerError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let figment = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(("outbound_capacity", 0));
        let config = ServerConfig::from_figment(&figment).unwrap();
        assert_eq!(config.outbound_capacity, 1);
    }
}
