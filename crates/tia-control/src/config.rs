use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tia_ipc::{DEFAULT_ADDR, RemoteHandleConfig};

const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CALIB_DIR: &str = ".";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid server address '{0}': expected host:port")]
    InvalidAddr(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Process configuration, read from `TIA_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub addr: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub calib_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_secs(var: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl ControlConfig {
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            addr: env::var("TIA_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            read_timeout: env_secs("TIA_READ_TIMEOUT", DEFAULT_READ_TIMEOUT_SECS),
            write_timeout: env_secs("TIA_WRITE_TIMEOUT", DEFAULT_WRITE_TIMEOUT_SECS),
            calib_dir: env::var("TIA_CALIB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CALIB_DIR)),
            log_file: env::var("TIA_LOG").ok().map(PathBuf::from),
        }
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_calib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.calib_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let port_ok = self
            .addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !port_ok {
            return Err(ConfigError::InvalidAddr(self.addr.clone()));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("TIA_READ_TIMEOUT"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("TIA_WRITE_TIMEOUT"));
        }
        Ok(())
    }

    pub fn remote(&self) -> RemoteHandleConfig {
        RemoteHandleConfig::new()
            .with_addr(self.addr.clone())
            .with_read_timeout(self.read_timeout)
            .with_write_timeout(self.write_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let config = ControlConfig::default()
            .with_addr("10.0.0.2:9000")
            .with_read_timeout(Duration::from_secs(5))
            .with_write_timeout(Duration::from_secs(2))
            .with_calib_dir("/data/calib");

        assert_eq!(config.addr, "10.0.0.2:9000");
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.calib_dir, PathBuf::from("/data/calib"));

        let remote = config.remote();
        assert_eq!(remote.addr, "10.0.0.2:9000");
        assert_eq!(remote.write_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_bad_addr() {
        let config = ControlConfig::default().with_addr("localhost");
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAddr("localhost".to_string()))
        );
        assert!(ControlConfig::default().with_addr("tem:70000").validate().is_err());
        assert!(ControlConfig::default().with_addr("tem-pc:8088").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ControlConfig::default()
            .with_addr("127.0.0.1:8088")
            .with_read_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTimeout("TIA_READ_TIMEOUT"))
        );
    }
}
