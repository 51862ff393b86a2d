//! LLM error types with retry classification.

use std::time::Duration;

/// Classification of LLM failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429, retry with backoff
    RateLimited,
    /// 5xx, retry
    ServerError,
    /// Other 4xx, permanent
    ClientError,
    /// Connection failure or timeout, retry
    NetworkError,
    /// Unparseable response body, permanent
    ParseError,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Error from a model provider call.
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}: {message}", .status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    /// From a Retry-After header, when present.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn from_status(status_code: u16, message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message,
            retry_after,
        }
    }

    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Delay before retry `attempt` (0-based): Retry-After if given, else exponential
    /// backoff from a per-kind base, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs: u64 = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };
        let delay_secs = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay_secs.min(60))
    }
}

/// Retry behavior for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on total time spent retrying.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.kind.is_transient() && attempt < self.max_retries
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(502), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert!(!classify_http_status(400).is_transient());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let error = LlmError::from_status(503, "unavailable".to_string(), None);
        assert!(error.suggested_delay(1) > error.suggested_delay(0));
        assert_eq!(error.suggested_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_respected() {
        let error =
            LlmError::from_status(429, "slow down".to_string(), Some(Duration::from_secs(30)));
        assert_eq!(error.suggested_delay(4), Duration::from_secs(30));
    }

    #[test]
    fn test_display_includes_status() {
        let error = LlmError::from_status(500, "boom".to_string(), None);
        assert_eq!(error.to_string(), "Server error (HTTP 500): boom");
        let error = LlmError::network_error("refused".to_string());
        assert_eq!(error.to_string(), "Network error: refused");
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let config = RetryConfig::default();
        let error = LlmError::parse_error("bad json".to_string());
        assert!(!config.should_retry(&error, 0));
        let error = LlmError::network_error("reset".to_string());
        assert!(config.should_retry(&error, 0));
        assert!(!config.should_retry(&error, 3));
    }
}
