use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Identifies generated traffic to the target and to tracing backends.
pub const GENERATOR_USER_AGENT: &str = "RustLoadGenerator/1.0";
pub const TRACE_SOURCE_HEADER: &str = "X-Trace-Source";
pub const TRACE_SOURCE_VALUE: &str = "rust-load-generator";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: reqwest::header::InvalidHeaderName,
    },

    #[error("Invalid header value for '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Configuration for building the shared HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Whole-request deadline. reqwest has no separate write timeout, so this
    /// bounds sending the request and reading the response together.
    pub request_timeout: Duration,
    pub custom_headers: Vec<(String, String)>,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            custom_headers: Vec::new(),
            max_idle_per_host: 32,
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Builds the reqwest client shared by every attempt.
///
/// The synthetic-traffic headers are installed as defaults; custom headers are
/// applied afterwards and may override them.
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    let headers = default_headers(&config.custom_headers)?;

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout);

    if let Some(keepalive) = config.tcp_keepalive {
        builder = builder.tcp_keepalive(keepalive);
    }

    Ok(builder.build()?)
}

/// Default header set: generator identification plus any custom headers.
pub fn default_headers(custom: &[(String, String)]) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(GENERATOR_USER_AGENT));
    headers.insert(
        HeaderName::from_static("x-trace-source"),
        HeaderValue::from_static(TRACE_SOURCE_VALUE),
    );

    for (name, value) in custom {
        let header_name =
            HeaderName::from_str(name).map_err(|source| ClientError::InvalidHeaderName {
                name: name.clone(),
                source,
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|source| ClientError::InvalidHeaderValue {
                name: name.clone(),
                source,
            })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}
