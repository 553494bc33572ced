//! Connection lifecycle hooks.
//!
//! The registry does not know what a connect or disconnect means to the
//! application. Instead it calls a [`ClientEvents`] value supplied when
//! the server is built, so a game can greet new players or drop them from
//! a turn order without subclassing anything.

use std::net::SocketAddrV4;

use tandem_transport::ClientId;

/// Receives connect and disconnect notifications from a
/// [`Registry`](crate::Registry).
///
/// Both methods default to no-ops, and `()` implements the trait for
/// servers that do not care.
///
/// # Example
///
/// ```rust
/// use std::net::SocketAddrV4;
/// use tandem_registry::ClientEvents;
/// use tandem_transport::ClientId;
///
/// /// Keeps the lobby in connection order.
/// #[derive(Default)]
/// struct Lobby {
///     players: Vec<ClientId>,
/// }
///
/// impl ClientEvents for Lobby {
///     fn on_connect(&mut self, id: ClientId, _peer: SocketAddrV4) {
///         self.players.push(id);
///     }
///
///     fn on_disconnect(&mut self, id: ClientId) {
///         self.players.retain(|p| *p != id);
///     }
/// }
/// ```
pub trait ClientEvents: Send + 'static {
    /// Called once a new client is registered and ready for I/O.
    fn on_connect(&mut self, _id: ClientId, _peer: SocketAddrV4) {}

    /// Called exactly once when a client leaves the registry, whether it
    /// was pruned as dead or removed explicitly.
    fn on_disconnect(&mut self, _id: ClientId) {}
}

impl ClientEvents for () {}
