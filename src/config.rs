//! Startup configuration from the environment.
//!
//! Everything is optional with working defaults; a `.env` file is honored
//! when present. `WEBHOOK_SECRET`, if set, must accompany every POST
//! request in the `x-webhook-secret` header.

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;

/// Service configuration.
#[derive(Debug)]
pub struct Config {
    /// Address to bind the HTTP listener to.
    pub host: IpAddr,
    pub port: u16,
    /// Shared secret for the POST endpoints; `None` disables the check.
    pub webhook_secret: Option<SecretString>,
}

impl Config {
    /// Read configuration from the environment (`HOST`, `PORT`,
    /// `WEBHOOK_SECRET`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = match std::env::var("HOST") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "HOST",
                reason: format!("not an IP address: {raw}"),
            })?,
            Err(_) => DEFAULT_HOST.parse().expect("default host"),
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("not a port number: {raw}"),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        Ok(Self {
            host,
            port,
            webhook_secret,
        })
    }

    /// The socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.parse().expect("default host"),
            port: DEFAULT_PORT,
            webhook_secret: None,
        }
    }
}
