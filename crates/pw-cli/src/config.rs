//! Environment configuration for the Path Warden server.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default data directory for persisted state.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Whether to generate the simulated IAM estate (`USE_MOCK_DATA`).
    pub use_mock_data: bool,
    /// Token-signing secret (`JWT_SECRET`). Required outside mock mode; in
    /// mock mode a random ephemeral secret is generated when absent.
    pub jwt_secret: Option<String>,
    /// Directory holding the persisted state files (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Bootstrap admin credentials
    /// (`BOOTSTRAP_ADMIN_USERNAME` / `BOOTSTRAP_ADMIN_PASSWORD`).
    pub bootstrap_admin: Option<(String, String)>,
}

impl ServerConfig {
    /// Resolves the configuration from the process environment.
    ///
    /// A missing `JWT_SECRET` outside mock mode is an unrecoverable
    /// startup failure (the process exits with code 1).
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("PORT must be a port number, got {value:?}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let use_mock_data = env_flag("USE_MOCK_DATA");
        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        if !use_mock_data && jwt_secret.is_none() {
            bail!("JWT_SECRET is required when USE_MOCK_DATA=false");
        }

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        };

        Ok(Self {
            port,
            use_mock_data,
            jwt_secret,
            data_dir,
            bootstrap_admin,
        })
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them serialized by testing
    // the pure pieces only.

    #[test]
    fn test_env_flag_parsing() {
        std::env::remove_var("PW_TEST_FLAG");
        assert!(!env_flag("PW_TEST_FLAG"));
        std::env::set_var("PW_TEST_FLAG", "true");
        assert!(env_flag("PW_TEST_FLAG"));
        std::env::set_var("PW_TEST_FLAG", "0");
        assert!(!env_flag("PW_TEST_FLAG"));
        std::env::remove_var("PW_TEST_FLAG");
    }
}
