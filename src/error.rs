use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Input data failed validation (series too short, misaligned timeframes,
    /// non-monotonic timestamps)
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Rate limit exceeded upstream
    #[error("Rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds until retry is allowed
        retry_after: Option<u64>,
    },

    /// Request exceeded its per-call timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Upstream returned a response we could not interpret
    #[error("Malformed response from '{source_name}': {context}")]
    UpstreamMalformed {
        /// Upstream host or endpoint name
        source_name: String,
        /// What was wrong with the payload
        context: String,
    },

    /// The requested symbol is not known upstream
    #[error("Unknown symbol: {symbol}")]
    SymbolUnknown {
        /// The symbol that was rejected
        symbol: String,
    },

    /// Server error (5xx status codes)
    #[error("Server error {status} from '{source_name}'")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Upstream host or endpoint name
        source_name: String,
    },

    /// Not enough free cash to open the requested position
    #[error("Insufficient capital: need {required:.2}, have {available:.2}")]
    InsufficientCapital {
        /// Required cash including fees
        required: f64,
        /// Available cash
        available: f64,
    },

    /// Position caps reached; no capacity for another trade
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// A live signal was declined (risk limits, failed re-validation)
    #[error("Signal declined: {0}")]
    Declined(String),

    /// The ML predictor could not be reached; callers approve by default
    #[error("Predictor unavailable: {0}")]
    PredictorUnavailable(String),

    /// A portfolio risk limit latched trading off
    #[error("Risk limit breached: {0}")]
    RiskLimitBreached(String),

    /// The evaluation was cancelled via its cancellation token
    #[error("Cancelled")]
    Cancelled,

    /// The pipeline exceeded its total wall-clock budget
    #[error("Deadline exceeded after {budget_ms}ms")]
    Deadline {
        /// Wall-clock budget in milliseconds
        budget_ms: u64,
    },

    /// Indicator calculation error
    #[error("Indicator error: {0}")]
    Indicator(#[from] crate::indicators::IndicatorError),

    /// Failed to parse JSON response
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Filesystem error while persisting artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create an `InputInvalid` error
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    /// Create an `UpstreamMalformed` error
    pub fn malformed(source_name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UpstreamMalformed {
            source_name: source_name.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retriable (one retry with backoff is reasonable)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ServerError { .. }
        )
    }

    /// Get retry delay in seconds for retriable errors
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => retry_after.or(Some(60)),
            Self::Timeout { .. } => Some(2),
            Self::ServerError { status, .. } if *status >= 500 => Some(5),
            Self::Network(_) => Some(1),
            _ => None,
        }
    }

    /// Errors that should surface to the caller on the live signal path.
    ///
    /// Everything else resolves internally and shows up as signal diagnostics.
    pub fn is_surfaced_live(&self) -> bool {
        matches!(
            self,
            Self::InputInvalid(_) | Self::Network(_) | Self::Deadline { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(EngineError::Timeout { timeout_ms: 5000 }.is_retriable());
        assert!(EngineError::RateLimited { retry_after: None }.is_retriable());
        assert!(
            EngineError::ServerError {
                status: 503,
                source_name: "klines".to_string()
            }
            .is_retriable()
        );
        assert!(!EngineError::input("empty series").is_retriable());
        assert!(
            !EngineError::SymbolUnknown {
                symbol: "NOPE".to_string()
            }
            .is_retriable()
        );
        assert!(!EngineError::Cancelled.is_retriable());
    }

    #[test]
    fn test_retry_after_secs() {
        assert_eq!(
            EngineError::RateLimited {
                retry_after: Some(10)
            }
            .retry_after_secs(),
            Some(10)
        );
        assert_eq!(
            EngineError::RateLimited { retry_after: None }.retry_after_secs(),
            Some(60)
        );
        assert_eq!(
            EngineError::Timeout { timeout_ms: 5000 }.retry_after_secs(),
            Some(2)
        );
        assert_eq!(EngineError::Cancelled.retry_after_secs(), None);
    }

    #[test]
    fn test_surfaced_live() {
        assert!(EngineError::input("bad").is_surfaced_live());
        assert!(EngineError::Deadline { budget_ms: 30_000 }.is_surfaced_live());
        assert!(!EngineError::Declined("risk".to_string()).is_surfaced_live());
        assert!(!EngineError::PredictorUnavailable("down".to_string()).is_surfaced_live());
    }
}
