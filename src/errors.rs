//! Error categorization for request outcomes.
//!
//! Failed attempts are never retried or propagated, but each one is tagged with
//! a category so logs and the `errors_by_category` counter show whether the
//! target is rejecting requests, failing internally, or unreachable.

use std::fmt;

/// Categories of failures that can occur for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP 4xx responses
    ClientError,

    /// HTTP 5xx responses
    ServerError,

    /// Network connectivity errors (DNS, connection refused, reset)
    NetworkError,

    /// Connect or request timeout
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// Anything else, including 1xx/3xx responses that reach the caller
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code.
    ///
    /// Returns `None` for 2xx, which is the only range counted as success.
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            200..=299 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::OtherError),
        }
    }

    /// Categorize a transport-level reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return ErrorCategory::TimeoutError;
        }
        if error.is_connect() || error.is_request() || error.is_body() {
            // A connect error wrapping a handshake failure still reads as TLS.
            let msg = error_chain_text(error);
            if msg.contains("certificate") || msg.contains("tls") || msg.contains("ssl") {
                return ErrorCategory::TlsError;
            }
            return ErrorCategory::NetworkError;
        }

        let msg = error_chain_text(error);
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("ssl") {
            ErrorCategory::TlsError
        } else if msg.contains("timed out") || msg.contains("timeout") {
            ErrorCategory::TimeoutError
        } else if msg.contains("dns") || msg.contains("connect") || msg.contains("connection") {
            ErrorCategory::NetworkError
        } else {
            ErrorCategory::OtherError
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::OtherError => "other_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flattens an error and its sources into one lowercase string.
///
/// reqwest's top-level message is usually just "error sending request"; the
/// useful part (refused, timed out, certificate) lives in the source chain.
pub fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes_are_not_errors() {
        assert_eq!(ErrorCategory::from_status_code(200), None);
        assert_eq!(ErrorCategory::from_status_code(201), None);
        assert_eq!(ErrorCategory::from_status_code(204), None);
    }

    #[test]
    fn test_redirect_and_informational_are_other() {
        assert_eq!(
            ErrorCategory::from_status_code(304),
            Some(ErrorCategory::OtherError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(101),
            Some(ErrorCategory::OtherError)
        );
    }

    #[test]
    fn test_categorize_4xx_and_5xx() {
        assert_eq!(
            ErrorCategory::from_status_code(404),
            Some(ErrorCategory::ClientError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(429),
            Some(ErrorCategory::ClientError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(500),
            Some(ErrorCategory::ServerError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(503),
            Some(ErrorCategory::ServerError)
        );
    }

    #[test]
    fn test_labels_are_unique() {
        let labels: std::collections::HashSet<_> = [
            ErrorCategory::ClientError,
            ErrorCategory::ServerError,
            ErrorCategory::NetworkError,
            ErrorCategory::TimeoutError,
            ErrorCategory::TlsError,
            ErrorCategory::OtherError,
        ]
        .iter()
        .map(|c| c.label())
        .collect();
        assert_eq!(labels.len(), 6);
        assert_eq!(ErrorCategory::TimeoutError.to_string(), "timeout_error");
    }

    #[test]
    fn test_error_chain_text_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "Connection Refused");
        let text = error_chain_text(&inner);
        assert_eq!(text, "connection refused");
    }
}
