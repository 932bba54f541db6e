//! Configuration types for the SearchBackendGateway.

use std::time::Duration;

/// Default bound on a single backend call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the SearchBackendGateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upper bound on every backend call, including instance construction.
    /// A call that exceeds it fails with `SearchError::Timeout`.
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Create a config with a custom call timeout.
    pub fn with_call_timeout(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}
