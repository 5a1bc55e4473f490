use std::env;
use thiserror::Error;
use tokio::time::Duration;

use crate::client::ClientConfig;
use crate::scheduler::{ScheduleConfig, MAX_PERIOD};
use crate::utils::{parse_duration_string, parse_headers_with_escapes};

pub const DEFAULT_SERVER_URL: &str = "http://nodejs-server:3000";
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 3;
pub const DEFAULT_STARTUP_DELAY: &str = "5s";
pub const DEFAULT_STATS_INTERVAL: &str = "10s";
pub const DEFAULT_TIMEOUT: &str = "10s";
pub const DEFAULT_METRIC_NAMESPACE: &str = "rust_loadgen";

pub const MAX_CONCURRENT_REQUESTS: usize = 10_000;
/// Upper bound on runtime worker threads, whatever the concurrency.
pub const MAX_WORKER_THREADS: usize = 256;

/// Startup configuration errors. All of them are fatal.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a valid number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    MustBePositive { var: &'static str },

    #[error("Invalid {var} format: '{value}'. {reason}")]
    InvalidDuration {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be at most {max}, got '{value}'")]
    TooLarge {
        var: &'static str,
        value: String,
        max: String,
    },

    #[error("SERVER_URL must start with http:// or https://, got '{0}'")]
    InvalidUrl(String),

    #[error("Invalid header in CUSTOM_HEADERS: '{0}'. Expected 'Name:Value'.")]
    InvalidHeader(String),
}

/// Immutable generator configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    pub request_interval: Duration,
    pub concurrent_requests: usize,
    pub startup_delay: Duration,
    pub stats_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub custom_headers: Vec<(String, String)>,
    pub metrics_port: Option<u16>,
    pub metric_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_interval: Duration::from_millis(DEFAULT_REQUEST_INTERVAL_MS),
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            startup_delay: Duration::from_secs(5),
            stats_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            custom_headers: Vec::new(),
            metrics_port: None,
            metric_namespace: DEFAULT_METRIC_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of a
    /// variable or `None` when it is unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let server_url = server_url.trim();
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(server_url.to_string()));
        }
        let server_url = server_url
            .strip_suffix('/')
            .unwrap_or(server_url)
            .to_string();

        let interval_ms: u64 = parse_positive(&lookup, "REQUEST_INTERVAL", DEFAULT_REQUEST_INTERVAL_MS)?;
        let request_interval = Duration::from_millis(interval_ms);
        if request_interval > MAX_PERIOD {
            return Err(ConfigError::TooLarge {
                var: "REQUEST_INTERVAL",
                value: interval_ms.to_string(),
                max: MAX_PERIOD.as_millis().to_string(),
            });
        }
        let concurrent_requests: usize =
            parse_positive(&lookup, "CONCURRENT_REQUESTS", DEFAULT_CONCURRENT_REQUESTS)?;
        if concurrent_requests > MAX_CONCURRENT_REQUESTS {
            return Err(ConfigError::TooLarge {
                var: "CONCURRENT_REQUESTS",
                value: concurrent_requests.to_string(),
                max: MAX_CONCURRENT_REQUESTS.to_string(),
            });
        }

        let startup_delay = parse_duration_var(&lookup, "STARTUP_DELAY", DEFAULT_STARTUP_DELAY)?;
        let stats_interval = parse_duration_var(&lookup, "STATS_INTERVAL", DEFAULT_STATS_INTERVAL)?;
        if stats_interval.is_zero() {
            return Err(ConfigError::MustBePositive {
                var: "STATS_INTERVAL",
            });
        }
        let connect_timeout = parse_duration_var(&lookup, "CONNECT_TIMEOUT", DEFAULT_TIMEOUT)?;
        let request_timeout = parse_duration_var(&lookup, "REQUEST_TIMEOUT", DEFAULT_TIMEOUT)?;

        let custom_headers = match lookup("CUSTOM_HEADERS") {
            Some(raw) => parse_custom_headers(&raw)?,
            None => Vec::new(),
        };

        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidNumber {
                    var: "METRICS_PORT",
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        let metric_namespace = lookup("METRIC_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METRIC_NAMESPACE.to_string());

        Ok(Config {
            server_url,
            request_interval,
            concurrent_requests,
            startup_delay,
            stats_interval,
            connect_timeout,
            request_timeout,
            custom_headers,
            metrics_port,
            metric_namespace,
        })
    }

    /// Creates a ClientConfig from this Config.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            custom_headers: self.custom_headers.clone(),
            ..ClientConfig::default()
        }
    }

    pub fn to_schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            startup_delay: self.startup_delay,
            tick_interval: self.request_interval,
            stats_interval: self.stats_interval,
        }
    }

    /// Worker threads for the runtime: one per concurrent request plus one for
    /// timers, capped at [`MAX_WORKER_THREADS`].
    pub fn worker_threads(&self) -> usize {
        self.concurrent_requests
            .saturating_add(1)
            .min(MAX_WORKER_THREADS)
    }

    /// Prints the configuration summary.
    pub fn print_summary(&self) {
        println!("Starting load generator:");
        println!("  Target server: {}", self.server_url);
        println!("  Request interval: {}ms", self.request_interval.as_millis());
        println!("  Concurrent requests: {}", self.concurrent_requests);
        println!("  Startup delay: {:?}", self.startup_delay);
        println!("  Statistics interval: {:?}", self.stats_interval);
        println!(
            "  Timeouts: connect={:?} request={:?}",
            self.connect_timeout, self.request_timeout
        );
        if self.custom_headers.is_empty() {
            println!("  Custom Headers Enabled: No");
        } else {
            println!("  Custom Headers Enabled: Yes");
            for (name, value) in &self.custom_headers {
                println!("    {}: {}", name, value);
            }
        }
        match self.metrics_port {
            Some(port) => println!("  Metrics endpoint: 0.0.0.0:{}/metrics", port),
            None => println!("  Metrics endpoint: disabled (METRICS_PORT not set)"),
        }
    }
}

fn parse_positive<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw })?,
        None => default,
    };
    if value <= T::default() {
        return Err(ConfigError::MustBePositive { var });
    }
    Ok(value)
}

fn parse_duration_var<F>(lookup: &F, var: &'static str, default: &str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var).unwrap_or_else(|| default.to_string());
    let duration = match parse_duration_string(&raw) {
        Ok(d) => d,
        Err(reason) => {
            return Err(ConfigError::InvalidDuration {
                var,
                value: raw,
                reason,
            })
        }
    };
    if duration > MAX_PERIOD {
        return Err(ConfigError::TooLarge {
            var,
            value: raw,
            max: "365d".to_string(),
        });
    }
    Ok(duration)
}

fn parse_custom_headers(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    parse_headers_with_escapes(raw)
        .into_iter()
        .map(|pair| {
            let pair = pair.trim();
            match pair.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    Ok((name.trim().to_string(), value.trim().to_string()))
                }
                _ => Err(ConfigError::InvalidHeader(pair.to_string())),
            }
        })
        .collect()
}
