//! The registry: every client connection a server currently holds.
//!
//! # Concurrency note
//!
//! `Registry` is NOT thread-safe by itself; it uses a plain `HashMap`.
//! It is owned by the task that owns the server, and new clients reach it
//! through the accept bridge's channel rather than through shared state.

use std::collections::HashMap;

use tandem_protocol::{ConnectionExt, Wire};
use tandem_transport::{ClientId, Connection, PendingClient, Transport, DEFAULT_MAX_MESSAGE_LEN};

use crate::{ClientEvents, RegistryError};

/// Maps [`ClientId`]s to the connections the server owns.
///
/// ## Lifecycle
///
/// ```text
/// insert() ──→ [alive] ──(I/O fails terminally)──→ [dead]
///                 │                                   │
///                 │                    next send_to / receive_from,
///                 │                    or remove_dead()
///                 ▼                                   ▼
///             remove() ─────────────────────→ [removed, on_disconnect]
/// ```
///
/// Ids come from a per-registry counter, so they are unique, stable, and
/// increase in the order clients were inserted.
pub struct Registry<T: Transport, E: ClientEvents = ()> {
    clients: HashMap<ClientId, Connection<T>>,
    next_id: u64,
    max_message_len: usize,
    events: E,
}

impl<T: Transport, E: ClientEvents> Registry<T, E> {
    /// Creates an empty registry that reports to `events`.
    pub fn new(events: E) -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 1,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            events,
        }
    }

    /// Sets the message size limit applied to every connection inserted
    /// from now on.
    pub fn set_max_message_len(&mut self, max: usize) {
        self.max_message_len = max;
    }

    /// Registers an accepted peer and fires `on_connect`.
    pub fn insert(&mut self, pending: PendingClient<T::Socket>) -> ClientId {
        let id = ClientId::new(self.next_id);
        self.next_id += 1;

        let peer = pending.peer();
        let mut conn = pending.into_connection::<T>();
        conn.set_max_message_len(self.max_message_len);
        self.clients.insert(id, conn);

        tracing::info!(%id, %peer, transport = %T::KIND, "client connected");
        self.events.on_connect(id, peer);
        id
    }

    /// Sends one value to a client.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownClient`]: no such client
    /// - [`RegistryError::ClientGone`]: the client was dead and has been
    ///   removed
    /// - [`RegistryError::Protocol`]: the send itself failed
    pub async fn send_to<W: Wire>(&mut self, id: ClientId, value: &W) -> Result<(), RegistryError> {
        let conn = self.live_connection(id)?;
        conn.send(value).await?;
        Ok(())
    }

    /// Receives one value from a client.
    ///
    /// # Errors
    /// Same as [`Registry::send_to`].
    pub async fn receive_from<W: Wire>(&mut self, id: ClientId) -> Result<W, RegistryError> {
        let conn = self.live_connection(id)?;
        Ok(conn.receive().await?)
    }

    /// Returns `true` if the client is registered and its connection is
    /// alive. Never removes anything.
    pub fn is_alive(&self, id: ClientId) -> bool {
        self.clients.get(&id).is_some_and(|conn| !conn.is_dead())
    }

    /// Removes every dead client, firing `on_disconnect` for each.
    ///
    /// Returns the removed ids in ascending order.
    pub fn remove_dead(&mut self) -> Vec<ClientId> {
        let mut dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, conn)| conn.is_dead())
            .map(|(id, _)| *id)
            .collect();
        dead.sort_unstable();

        for id in &dead {
            self.evict(*id);
        }
        dead
    }

    /// Removes a client regardless of its state and fires
    /// `on_disconnect`. Dropping the returned connection closes its socket.
    ///
    /// Returns `None` if the client was not registered.
    pub fn remove(&mut self, id: ClientId) -> Option<Connection<T>> {
        self.evict(id)
    }

    /// Looks up a client's connection.
    pub fn get(&self, id: ClientId) -> Option<&Connection<T>> {
        self.clients.get(&id)
    }

    /// Looks up a client's connection mutably, e.g. to drive raw I/O.
    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Connection<T>> {
        self.clients.get_mut(&id)
    }

    /// All registered ids (alive or not) in ascending order, which is
    /// also connection order.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered clients (alive or not).
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// The event hook.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// The event hook, mutably.
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Membership first, then liveness. A dead client is evicted here so
    /// the caller sees `ClientGone` exactly once.
    fn live_connection(&mut self, id: ClientId) -> Result<&mut Connection<T>, RegistryError> {
        let dead = match self.clients.get(&id) {
            None => return Err(RegistryError::UnknownClient(id)),
            Some(conn) => conn.is_dead(),
        };
        if dead {
            self.evict(id);
            return Err(RegistryError::ClientGone(id));
        }
        self.clients
            .get_mut(&id)
            .ok_or(RegistryError::UnknownClient(id))
    }

    fn evict(&mut self, id: ClientId) -> Option<Connection<T>> {
        let conn = self.clients.remove(&id)?;
        tracing::info!(%id, peer = %conn.peer_addr(), "client disconnected");
        self.events.on_disconnect(id);
        Some(conn)
    }
}

impl<T: Transport, E: ClientEvents + Default> Default for Registry<T, E> {
    fn default() -> Self {
        Self::new(E::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
