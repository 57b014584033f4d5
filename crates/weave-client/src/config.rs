//! Client configuration.

use std::time::Duration;

/// Configuration for an outbound connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whether to schedule a new attempt after the connection closes.
    ///
    /// Default: `true`. Reconnection is never attempted after a failure
    /// the status lookup could explain (rejected credentials, server
    /// fault).
    pub reconnect: bool,

    /// Delay before a scheduled reconnection attempt.
    ///
    /// Default: 1 second. Exactly one attempt is pending at a time.
    pub reconnect_interval: Duration,

    /// Gates per-frame diagnostic output only, never behavior.
    ///
    /// Default: `false`.
    pub logs: bool,

    /// Credential appended to the target as the `token` query parameter.
    ///
    /// Default: none.
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval: Duration::from_millis(1000),
            logs: false,
            token: None,
        }
    }
}
