//! Engine error taxonomy.
//!
//! Empty lottery windows and balances below the auto-buy threshold are not
//! errors; those paths return `None`.

/// Errors surfaced by the reward engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or missing hash / transaction fields. Never retried.
    InvalidInput(String),
    /// Raised by the chain lookup or transfer execution collaborators and
    /// passed through unchanged.
    Network(String),
    /// Configuration rejected at startup.
    InvalidConfig(String),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::Network(msg) => write!(f, "network error: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
