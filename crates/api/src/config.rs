//! Environment-driven configuration.

use std::net::SocketAddr;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A variable was present but unparseable.
    #[error("invalid value for {var}: {detail}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// What went wrong.
        detail: String,
    },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HMAC secret for JWT verification.
    pub jwt_secret: String,
    /// Key material for the credential encryption key.
    pub credential_key: String,
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl ApiConfig {
    /// Read configuration from the environment:
    /// `SKEIN_JWT_SECRET` (required), `SKEIN_CREDENTIAL_KEY` (required),
    /// `SKEIN_BIND_ADDR` (default `0.0.0.0:8000`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("SKEIN_JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("SKEIN_JWT_SECRET"))?;
        let credential_key = std::env::var("SKEIN_CREDENTIAL_KEY")
            .map_err(|_| ConfigError::MissingVar("SKEIN_CREDENTIAL_KEY"))?;
        let bind_addr = std::env::var("SKEIN_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_owned())
            .parse()
            .map_err(|err| ConfigError::InvalidVar {
                var: "SKEIN_BIND_ADDR",
                detail: format!("{err}"),
            })?;
        Ok(Self {
            jwt_secret,
            credential_key,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_addr_parses() {
        let addr: SocketAddr = "0.0.0.0:8000".parse().unwrap();
        assert_eq!(addr.port(), 8000);
    }
}
