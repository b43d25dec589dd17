//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use worldlink_dispatch::DrainLimits;
use worldlink_transport::TcpConfig;

use crate::WorldlinkError;

/// Settings for a [`WorldClient`](crate::WorldClient).
///
/// Every field has a default, so a JSON document only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long `connect_world_tcp` waits for the TCP handshake.
    pub connect_timeout_ms: u64,
    /// Largest encoded world message sent unfragmented. Also the chunk
    /// size of the fragments.
    pub max_fragment_size: usize,
    /// Byte budget of one aggregate envelope in `send_world_batch`.
    pub aggregate_budget: usize,
    /// Messages handled per dispatcher per tick. 0 = unbounded.
    pub drain_max_messages: usize,
    /// Time spent per dispatcher per tick. 0 = unbounded.
    pub drain_max_time_ms: u64,
    pub tcp: TcpConfig,
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            max_fragment_size: 1400,
            aggregate_budget: 1400,
            drain_max_messages: 0,
            drain_max_time_ms: 0,
            tcp: TcpConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Smallest fragment chunk accepted.
    pub const MIN_FRAGMENT_SIZE: usize = 64;

    /// Parses a JSON document and clamps the result.
    pub fn from_json_str(json: &str) -> Result<Self, WorldlinkError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_fragment_size` raised to [`Self::MIN_FRAGMENT_SIZE`].
    /// - `aggregate_budget` raised to `max_fragment_size` when smaller
    ///   than a fragment chunk.
    /// - `connect_timeout_ms` of 0 replaced by the default.
    /// - `tcp` clamped by [`TcpConfig::validated`].
    pub fn validated(mut self) -> Self {
        if self.max_fragment_size < Self::MIN_FRAGMENT_SIZE {
            tracing::warn!(
                size = self.max_fragment_size,
                min = Self::MIN_FRAGMENT_SIZE,
                "max_fragment_size too small, clamping"
            );
            self.max_fragment_size = Self::MIN_FRAGMENT_SIZE;
        }
        if self.aggregate_budget < Self::MIN_FRAGMENT_SIZE {
            tracing::warn!(
                budget = self.aggregate_budget,
                using = self.max_fragment_size,
                "aggregate_budget too small, using max_fragment_size"
            );
            self.aggregate_budget = self.max_fragment_size;
        }
        if self.connect_timeout_ms == 0 {
            tracing::warn!("connect_timeout_ms is 0, using default");
            self.connect_timeout_ms = Self::default().connect_timeout_ms;
        }
        self.tcp = self.tcp.validated();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn drain_limits(&self) -> DrainLimits {
        DrainLimits::new(
            self.drain_max_messages,
            Duration::from_millis(self.drain_max_time_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_fragment_size, 1400);
        assert_eq!(config.aggregate_budget, 1400);
        assert!(config.drain_limits().is_unbounded());
        assert_eq!(config.tcp, TcpConfig::default());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ClientConfig::from_json_str(
            r#"{"max_fragment_size": 512, "tcp": {"read_buffer_size": 1024}}"#,
        )
        .unwrap();
        assert_eq!(config.max_fragment_size, 512);
        assert_eq!(config.tcp.read_buffer_size, 1024);
        assert_eq!(config.tcp.max_frame_len, TcpConfig::default().max_frame_len);
        assert_eq!(config.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_validated_clamps() {
        let config = ClientConfig {
            connect_timeout_ms: 0,
            max_fragment_size: 8,
            aggregate_budget: 0,
            tcp: TcpConfig {
                read_buffer_size: 0,
                ..TcpConfig::default()
            },
            ..ClientConfig::default()
        }
        .validated();
        assert_eq!(config.max_fragment_size, ClientConfig::MIN_FRAGMENT_SIZE);
        assert_eq!(config.aggregate_budget, ClientConfig::MIN_FRAGMENT_SIZE);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.tcp.read_buffer_size, TcpConfig::MIN_READ_BUFFER);
    }

    #[test]
    fn test_drain_limits_from_config() {
        let config = ClientConfig {
            drain_max_messages: 50,
            drain_max_time_ms: 8,
            ..ClientConfig::default()
        };
        assert_eq!(
            config.drain_limits(),
            DrainLimits::new(50, Duration::from_millis(8))
        );
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"max_fragment_size": "big"}"#),
            Err(WorldlinkError::Config(_))
        ));
    }
}
