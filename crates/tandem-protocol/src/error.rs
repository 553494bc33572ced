//! Error types for the protocol layer.
//!
//! A `ProtocolError` either wraps the connection failure that interrupted a
//! value, or reports a value that was framed correctly but is not
//! acceptable.

use tandem_transport::ConnectionError;

/// Errors that can occur while sending or receiving a typed value.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A raw send or receive failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The announced or requested length exceeds the connection's limit.
    ///
    /// On receive the connection is marked dead, since the unread payload
    /// cannot be skipped reliably. On send nothing was written.
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    /// A string payload was not valid UTF-8. The connection stays usable.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

impl ProtocolError {
    /// Returns `true` if the failure left the connection usable and the
    /// call may simply be repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_connection_error() {
        let err: ProtocolError = ConnectionError::Dead.into();
        assert!(matches!(err, ProtocolError::Connection(ConnectionError::Dead)));
        assert_eq!(err.to_string(), "connection is dead");
    }

    #[test]
    fn test_is_transient_follows_connection_error() {
        let transient: ProtocolError =
            ConnectionError::Transient(std::io::ErrorKind::WouldBlock.into()).into();
        assert!(transient.is_transient());
        assert!(!ProtocolError::InvalidUtf8.is_transient());
    }

    #[test]
    fn test_message_too_large_display() {
        let err = ProtocolError::MessageTooLarge { len: 10, max: 4 };
        assert_eq!(err.to_string(), "message of 10 bytes exceeds the 4 byte limit");
    }
}
