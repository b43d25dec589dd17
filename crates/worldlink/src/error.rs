//! Unified error type for the Worldlink client.

use worldlink_protocol::ProtocolError;
use worldlink_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WorldlinkError {
    /// Connect, send, receive or framing failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Client configuration could not be parsed.
    #[error("invalid client configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wrapped: WorldlinkError = err.into();
        assert!(matches!(wrapped, WorldlinkError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let wrapped: WorldlinkError = err.into();
        assert!(matches!(wrapped, WorldlinkError::Protocol(_)));
        assert_eq!(wrapped.to_string(), "invalid message: bad");
    }

    #[test]
    fn test_from_config_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let wrapped: WorldlinkError = err.into();
        assert!(wrapped.to_string().starts_with("invalid client configuration"));
    }
}
