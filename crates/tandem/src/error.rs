//! Unified error type for the Tandem framework.

use tandem_protocol::ProtocolError;
use tandem_registry::RegistryError;
use tandem_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tandem` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// A transport-level error (bind, accept, connect, handshake).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-level error (dead connection, framing, size limit).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A per-client error (unknown or departed client).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An accept-bridge operation was called in the wrong state.
    #[error("invalid accept state: {0}")]
    InvalidState(String),

    /// The configured bind address is not an IPv4 `host:port`.
    #[error("invalid bind address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Querying the bound socket failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_transport::{ClientId, ConnectionError};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Handshake("no reply".into());
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Transport(_)));
        assert!(tandem_err.to_string().contains("no reply"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::Connection(ConnectionError::Dead);
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Protocol(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::UnknownClient(ClientId::new(9));
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Registry(_)));
        assert!(tandem_err.to_string().contains("client-9"));
    }

    #[test]
    fn test_invalid_address_display() {
        let err = TandemError::InvalidAddress {
            addr: "nowhere".into(),
            reason: "invalid socket address syntax".into(),
        };
        assert!(err.to_string().contains("\"nowhere\""));
    }
}
