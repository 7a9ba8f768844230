//! Orchestrator configuration loaded from environment variables.

use std::time::Duration;

/// Orchestrator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SAGA_PENDING_TIMEOUT_SECS` — how long a saga may sit in a pending
///   state before the deadline sweep forces compensation (default: `300`)
/// - `SAGA_CONFIRMATION_PREFIX` — confirmation number prefix (default: `"BK"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub pending_timeout: Duration,
    pub confirmation_prefix: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            pending_timeout: std::env::var("SAGA_PENDING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(300)),
            confirmation_prefix: std::env::var("SAGA_CONFIRMATION_PREFIX")
                .unwrap_or_else(|_| "BK".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pending_timeout: Duration::from_secs(300),
            confirmation_prefix: "BK".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.pending_timeout, Duration::from_secs(300));
        assert_eq!(config.confirmation_prefix, "BK");
    }
}
