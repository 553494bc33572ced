//! `Server` builder and accept control.
//!
//! This is the entry point for running a Tandem server. It ties the layers
//! together: a listener from the transport, an [`AcceptBridge`] feeding
//! accepted peers over a channel, and a [`Registry`] that owns every
//! client connection.
//!
//! The server never blocks its owner. Accepting happens in the background,
//! and the owner decides when new clients join via
//! [`check_new_connections`](Server::check_new_connections).

use std::marker::PhantomData;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_protocol::Wire;
use tandem_registry::{ClientEvents, Registry, RegistryError};
use tandem_transport::{
    ClientId, Connection, ListenerConfig, Transport, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PORT,
};

use crate::bridge::{AcceptBridge, BridgeState};
use crate::TandemError;

/// Server settings that can be loaded from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IPv4 `host:port` the listener binds to. Port 0 picks a free port.
    pub bind_addr: String,

    /// How many accepted peers may wait for
    /// [`check_new_connections`](Server::check_new_connections).
    pub channel_capacity: usize,

    /// How long a datagram peer's port assignment is remembered.
    pub handshake_window: Duration,

    /// Largest variable-length message a client connection accepts.
    pub max_message_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            channel_capacity: 64,
            handshake_window: Duration::from_secs(5),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

/// Builder for configuring and binding a server.
///
/// # Example
///
/// ```rust,no_run
/// use tandem::prelude::*;
///
/// # async fn run() -> Result<(), TandemError> {
/// let mut server = Server::<Stream>::builder()
///     .bind("0.0.0.0:5555")
///     .channel_capacity(16)
///     .build()
///     .await?;
/// server.start_accepting()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder<T: Transport, E: ClientEvents = ()> {
    config: ServerConfig,
    events: E,
    _transport: PhantomData<T>,
}

impl<T: Transport> ServerBuilder<T, ()> {
    /// Creates a new builder with default settings and no event hooks.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            events: (),
            _transport: PhantomData,
        }
    }
}

impl<T: Transport> Default for ServerBuilder<T, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport, E: ClientEvents> ServerBuilder<T, E> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how many accepted peers may be queued.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets how long datagram port assignments are remembered.
    pub fn handshake_window(mut self, window: Duration) -> Self {
        self.config.handshake_window = window;
        self
    }

    /// Sets the largest variable-length message clients may send.
    pub fn max_message_len(mut self, max: usize) -> Self {
        self.config.max_message_len = max;
        self
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the connect/disconnect hooks.
    pub fn events<F: ClientEvents>(self, events: F) -> ServerBuilder<T, F> {
        ServerBuilder {
            config: self.config,
            events,
            _transport: PhantomData,
        }
    }

    /// Binds the listener. The server starts [`BridgeState::Idle`].
    pub async fn build(self) -> Result<Server<T, E>, TandemError> {
        let bind_addr: SocketAddrV4 =
            self.config
                .bind_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| TandemError::InvalidAddress {
                    addr: self.config.bind_addr.clone(),
                    reason: e.to_string(),
                })?;

        let listener_config = ListenerConfig {
            handshake_window: self.config.handshake_window,
        };
        let listener = T::bind(bind_addr, &listener_config).await?;
        let local_addr = match T::listener_addr(&listener)? {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(v6) => {
                return Err(TandemError::InvalidAddress {
                    addr: v6.to_string(),
                    reason: "listener is not IPv4".to_string(),
                });
            }
        };

        let mut registry = Registry::new(self.events);
        registry.set_max_message_len(self.config.max_message_len);

        Ok(Server {
            registry,
            listener: Some(listener),
            bridge: None,
            state: BridgeState::Idle,
            local_addr,
            channel_capacity: self.config.channel_capacity,
        })
    }
}

/// A bound Tandem server over transport `T`.
///
/// Dropping the server stops the accept task, closes the listener, and
/// closes every client connection.
pub struct Server<T: Transport, E: ClientEvents = ()> {
    registry: Registry<T, E>,
    /// Held here until accepting starts, then owned by the bridge task.
    listener: Option<T::Listener>,
    bridge: Option<AcceptBridge<T>>,
    state: BridgeState,
    local_addr: SocketAddrV4,
    channel_capacity: usize,
}

impl<T: Transport> Server<T, ()> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder<T, ()> {
        ServerBuilder::new()
    }
}

impl<T: Transport, E: ClientEvents> Server<T, E> {
    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// Returns the accept bridge's lifecycle state.
    pub fn bridge_state(&self) -> BridgeState {
        self.state
    }

    /// Starts accepting in the background.
    ///
    /// # Errors
    ///
    /// [`TandemError::InvalidState`] unless the server is still
    /// [`BridgeState::Idle`].
    pub fn start_accepting(&mut self) -> Result<(), TandemError> {
        self.transition(BridgeState::Accepting)?;
        let listener = self.listener.take().ok_or_else(|| {
            TandemError::InvalidState("listener already handed off".to_string())
        })?;

        self.bridge = Some(AcceptBridge::spawn(listener, self.channel_capacity));
        self.state = BridgeState::Accepting;
        tracing::info!(addr = %self.local_addr, transport = %T::KIND, "server accepting");
        Ok(())
    }

    /// Registers every client accepted since the last call, in accept
    /// order, and returns how many joined. Never blocks.
    ///
    /// Each new client fires the `on_connect` hook before this returns.
    pub fn check_new_connections(&mut self) -> usize {
        let Some(bridge) = self.bridge.as_mut() else {
            return 0;
        };

        let mut joined = 0;
        while let Some(pending) = bridge.try_next() {
            self.registry.insert(pending);
            joined += 1;
        }
        joined
    }

    /// Stops accepting and closes the listener.
    ///
    /// Clients that were accepted but not yet picked up by
    /// [`check_new_connections`](Self::check_new_connections) are dropped.
    /// Registered clients are unaffected.
    ///
    /// # Errors
    ///
    /// [`TandemError::InvalidState`] unless the server is
    /// [`BridgeState::Accepting`].
    pub fn stop_accepting(&mut self) -> Result<(), TandemError> {
        self.transition(BridgeState::Stopped)?;
        if let Some(bridge) = self.bridge.take() {
            // The task winds down on its own; nothing to wait for here.
            drop(bridge.shutdown());
        }
        self.state = BridgeState::Stopped;
        tracing::info!(addr = %self.local_addr, "server stopped accepting");
        Ok(())
    }

    fn transition(&self, target: BridgeState) -> Result<(), TandemError> {
        if self.state.can_transition_to(target) {
            Ok(())
        } else {
            Err(TandemError::InvalidState(format!(
                "cannot go from {} to {target}",
                self.state
            )))
        }
    }

    // -- Per-client operations, delegated to the registry ------------------

    /// Sends a value to one client. See [`Registry::send_to`].
    pub async fn send_to<W: Wire>(&mut self, id: ClientId, value: &W) -> Result<(), RegistryError> {
        self.registry.send_to(id, value).await
    }

    /// Receives a value from one client. See [`Registry::receive_from`].
    pub async fn receive_from<W: Wire>(&mut self, id: ClientId) -> Result<W, RegistryError> {
        self.registry.receive_from(id).await
    }

    /// Returns `true` if `id` is registered and its connection is alive.
    pub fn is_alive(&self, id: ClientId) -> bool {
        self.registry.is_alive(id)
    }

    /// Removes every dead client and returns their ids.
    pub fn remove_dead(&mut self) -> Vec<ClientId> {
        self.registry.remove_dead()
    }

    /// Removes one client, returning its connection.
    pub fn remove(&mut self, id: ClientId) -> Option<Connection<T>> {
        self.registry.remove(id)
    }

    /// Returns the registered client ids in connection order.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.registry.ids()
    }

    /// Returns the number of registered clients.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the registry holding every client connection.
    pub fn registry(&self) -> &Registry<T, E> {
        &self.registry
    }

    /// Returns the registry mutably, for direct access to connections.
    pub fn registry_mut(&mut self) -> &mut Registry<T, E> {
        &mut self.registry
    }
}
