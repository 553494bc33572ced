//! Error types for the registry layer.

use tandem_protocol::ProtocolError;
use tandem_transport::ClientId;

/// Errors that can occur during per-client operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No client with this id is registered. It may never have existed,
    /// or it was already removed.
    #[error("no client registered as {0}")]
    UnknownClient(ClientId),

    /// The client's connection was found dead. It has been removed and its
    /// disconnect event has fired.
    #[error("{0} has disconnected")]
    ClientGone(ClientId),

    /// Sending or receiving the value failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
