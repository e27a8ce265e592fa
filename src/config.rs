use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const SHARE_DIR: &str = "SHARE_DIR";
pub const SHARE_ADDR: &str = "SHARE_ADDR";

const DEFAULT_SHARE_DIR: &str = "/data";
const DEFAULT_SHARE_ADDR: &str = "0.0.0.0:8000";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory tree to serve.
    pub share_dir: PathBuf,
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
}

impl Config {
    /// Reads `SHARE_DIR` and `SHARE_ADDR`, falling back to `/data` and
    /// `0.0.0.0:8000`. Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let share_dir = var(SHARE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHARE_DIR));

        let addr = var(SHARE_ADDR).unwrap_or_else(|| DEFAULT_SHARE_ADDR.to_string());
        let listen_addr = addr.parse().map_err(|source| ConfigError::InvalidAddr {
            key: SHARE_ADDR,
            value: addr.clone(),
            source,
        })?;

        Ok(Config { share_dir, listen_addr })
    }
}
