use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use spider_auth::config::AuthConfig;
use tracing::level_filters::LevelFilter;

/// Root of `spider.toml`. Every section may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), LoadConfigError> {
        if self.server.port == 0 {
            return Err(LoadConfigError::Zero("port"));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(LoadConfigError::Zero("body_limit_bytes"));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(LoadConfigError::LogLevel(self.logging.level.clone()));
        }
        self.auth.validate()?;
        Ok(())
    }

    /// Listen address. An unparsable host binds all interfaces.
    pub fn addr(&self) -> SocketAddr {
        let host = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            body_limit_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Ignored when `RUST_LOG` is set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("server.{0} must be > 0")]
    Zero(&'static str),

    #[error("logging.level '{0}' is not a tracing level")]
    LogLevel(String),

    #[error("auth config error: {0}")]
    Auth(#[from] spider_auth::ConfigError),
}

pub mod loader {
    use std::path::Path;

    use config::{Config, Environment, File};

    use super::{AppConfig, LoadConfigError};

    /// Relative to the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "spider.toml";

    /// Reads the TOML file when it exists, layers `SPIDER__SECTION__KEY`
    /// environment variables on top and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, LoadConfigError> {
        let path = Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let cfg: AppConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SPIDER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.signing.secret = Some("secret".into());
        cfg
    }

    #[test]
    fn test_defaults_need_signing_secret() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(matches!(err, LoadConfigError::Auth(_)));
        assert!(err.to_string().starts_with("auth config error"));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let mut cfg = valid();
        cfg.logging.level = "loud".into();
        assert!(matches!(cfg.validate(), Err(LoadConfigError::LogLevel(level)) if level == "loud"));

        cfg.logging.level = "DEBUG".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut cfg = valid();
        cfg.server.port = 0;
        assert_eq!(cfg.validate().unwrap_err().to_string(), "server.port must be > 0");
    }

    #[test]
    fn test_addr_falls_back_to_unspecified() {
        let mut cfg = valid();
        cfg.server.host = "not-an-ip".into();
        cfg.server.port = 9000;
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:9000");
    }
}
