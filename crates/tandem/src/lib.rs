//! # Tandem
//!
//! Client/server connections that behave the same over TCP and UDP.
//!
//! A server is generic over its [`Transport`](tandem_transport::Transport):
//! [`Stream`](tandem_transport::Stream) for reliable byte streams or
//! [`Datagram`](tandem_transport::Datagram) for UDP, where every client
//! gets its own port through a small handshake. Either way, application
//! code sends and receives typed values by [`ClientId`](tandem_transport::ClientId)
//! and never sees the difference.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::prelude::*;
//!
//! # async fn run() -> Result<(), TandemError> {
//! let mut server = Server::<Datagram>::builder()
//!     .bind("0.0.0.0:5555")
//!     .build()
//!     .await?;
//! server.start_accepting()?;
//!
//! loop {
//!     server.check_new_connections();
//!     for id in server.client_ids() {
//!         server.send_to(id, &"hello".to_string()).await?;
//!     }
//!     server.remove_dead();
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

mod bridge;
mod error;
mod server;

pub use bridge::BridgeState;
pub use error::TandemError;
pub use server::{Server, ServerBuilder, ServerConfig};

pub use tandem_protocol as protocol;
pub use tandem_registry as registry;
pub use tandem_transport as transport;

/// Everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{BridgeState, Server, ServerBuilder, ServerConfig, TandemError};
    pub use tandem_protocol::{ConnectionExt, ProtocolError, Wire};
    pub use tandem_registry::{ClientEvents, Registry, RegistryError};
    pub use tandem_transport::{
        Client, ClientConfig, ClientId, Connection, ConnectionError, Datagram, Stream, Transport,
        TransportError, TransportKind, DEFAULT_PORT,
    };
}
