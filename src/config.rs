//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ingestion::IngestionLimits;

/// Errors produced while reading [`ServerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration of the HTTP server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub limits: IngestionLimits,
    /// Executable used by the SAS bridge (an `Rscript` with `haven` and `jsonlite` installed).
    pub sas_bridge_program: String,
    /// Interval between sensor stream events.
    pub sensor_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            limits: IngestionLimits::default(),
            sas_bridge_program: "Rscript".to_string(),
            sensor_interval: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `HOST`: bind host (default: 0.0.0.0)
    /// - `PORT`: bind port (default: 8000)
    /// - `MAX_UPLOAD_BYTES`: largest accepted upload (default: 52428800)
    /// - `DECODE_TIMEOUT_SECS`: bound on one decode (default: 120)
    /// - `MAX_CONCURRENT_DECODES`: decode permits (default: available parallelism)
    /// - `SAS_BRIDGE_PROGRAM`: `Rscript` executable (default: Rscript)
    /// - `SENSOR_INTERVAL_SECS`: sensor stream interval (default: 2)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let max_upload_bytes = positive(&lookup, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.limits.max_upload_bytes);
        let decode_timeout = positive::<u64>(&lookup, "DECODE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.limits.decode_timeout);
        let max_concurrent_decodes =
            positive(&lookup, "MAX_CONCURRENT_DECODES")?.unwrap_or(defaults.limits.max_concurrent_decodes);
        let sas_bridge_program = lookup("SAS_BRIDGE_PROGRAM")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.sas_bridge_program);
        let sensor_interval = positive::<u64>(&lookup, "SENSOR_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sensor_interval);

        let config = Self {
            host,
            port,
            limits: IngestionLimits {
                max_upload_bytes,
                decode_timeout,
                max_concurrent_decodes,
            },
            sas_bridge_program,
            sensor_interval,
        };
        config.bind_addr()?;
        Ok(config)
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                value: self.host.clone(),
                reason: e.to_string(),
            })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    match parse_var::<T>(lookup, name)? {
        Some(v) if v <= T::default() => Err(ConfigError::Invalid {
            name,
            value: lookup(name).unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other),
    }
}
