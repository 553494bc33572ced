//! Background accept loop feeding the server's registry.
//!
//! Accepting blocks, but the server's owner drives everything else from
//! its own loop. The bridge runs `Transport::accept` in a Tokio task and
//! hands each accepted peer over an `mpsc` channel. The owner drains that
//! channel without blocking via [`AcceptBridge::try_next`].
//!
//! The task owns the listener. Stopping the bridge (or dropping it) fires
//! a `oneshot` that the loop selects on, so a pending accept is abandoned
//! and the listener closes with the task.

use std::fmt;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use tandem_transport::{is_transient, PendingClient, Transport, TransportError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// BridgeState
// ---------------------------------------------------------------------------

/// Lifecycle of a server's accept bridge.
///
/// Transitions are strictly ordered:
///
/// ```text
/// Idle → Accepting → Stopped
/// ```
///
/// - **Idle**: the listener is bound but nobody is accepting yet. Peers
///   that connect now wait in the OS backlog (or, for datagrams, keep
///   re-sending their probe).
/// - **Accepting**: the background task is accepting and queueing peers.
/// - **Stopped**: the task is gone and the listener is closed. Accepting
///   cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    Idle,
    Accepting,
    Stopped,
}

impl BridgeState {
    /// Returns the state this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Accepting),
            Self::Accepting => Some(Self::Stopped),
            Self::Stopped => None,
        }
    }

    /// Returns `true` if moving to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Accepting => write!(f, "Accepting"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// AcceptBridge
// ---------------------------------------------------------------------------

/// Handle to a running accept task.
pub(crate) struct AcceptBridge<T: Transport> {
    incoming: mpsc::Receiver<PendingClient<T::Socket>>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl<T: Transport> AcceptBridge<T> {
    /// Moves `listener` into a new accept task.
    ///
    /// At most `capacity` accepted peers wait in the channel. Beyond that
    /// the task stops accepting until the owner drains some.
    pub(crate) fn spawn(listener: T::Listener, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(accept_loop::<T>(listener, tx, stop_rx));

        Self {
            incoming: rx,
            stop: stop_tx,
            task,
        }
    }

    /// Takes the next queued peer, if one is waiting.
    pub(crate) fn try_next(&mut self) -> Option<PendingClient<T::Socket>> {
        self.incoming.try_recv().ok()
    }

    /// Signals the task to stop. Peers still queued are dropped.
    ///
    /// Returns the task handle so callers can wait for the listener to
    /// actually close.
    pub(crate) fn shutdown(self) -> JoinHandle<()> {
        let _ = self.stop.send(());
        drop(self.incoming);
        self.task
    }
}

/// Accepts until told to stop, the owner goes away, or the listener
/// fails for good.
async fn accept_loop<T: Transport>(
    mut listener: T::Listener,
    tx: mpsc::Sender<PendingClient<T::Socket>>,
    mut stop: oneshot::Receiver<()>,
) {
    tracing::info!(transport = %T::KIND, "accept bridge started");

    loop {
        // A dropped sender resolves `stop` too, so dropping the bridge
        // handle is enough to end the loop.
        let accepted = tokio::select! {
            _ = &mut stop => break,
            accepted = T::accept(&mut listener) => accepted,
        };

        match accepted {
            Ok(pending) => {
                let peer = pending.peer();
                if tx.send(pending).await.is_err() {
                    tracing::debug!(%peer, "bridge owner gone, dropping accepted peer");
                    break;
                }
                tracing::trace!(%peer, "queued accepted peer");
            }
            Err(e) if keep_accepting(&e) => {
                tracing::debug!(error = %e, "skipping failed accept");
            }
            Err(e) => {
                tracing::warn!(error = %e, "listener failed, accept bridge exiting");
                break;
            }
        }
    }

    tracing::info!(transport = %T::KIND, "accept bridge stopped");
}

/// Whether an accept failure only affects the one peer.
fn keep_accepting(err: &TransportError) -> bool {
    match err {
        TransportError::AcceptFailed(io) => {
            is_transient(io)
                || matches!(
                    io.kind(),
                    ErrorKind::ConnectionAborted
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionRefused
                )
        }
        TransportError::Handshake(_) | TransportError::UnsupportedAddress(_) => true,
        TransportError::BindFailed { .. } | TransportError::ConnectFailed { .. } => false,
    }
}
